//! Client side of the protocol
//!
//! The sender tool turns typed lines into commands and reports what the
//! server says; the receiver tool joins one room and prints deliveries.
//! Both are written against generic readers/writers so they can run on a
//! terminal or inside a test.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::connection::Connection;
use crate::error::{ClientError, CommandError, ConnectionError};
use crate::message::{Delivery, Message, Tag};

/// A line typed into the sender tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/join ROOM`
    Join(String),
    /// `/leave`
    Leave,
    /// `/quit`
    Quit,
    /// Anything not starting with `/`
    Send(String),
}

impl Command {
    /// Parse one input line
    ///
    /// Blank lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(Command::Send(line.to_string())));
        }

        let mut words = line.split_whitespace();
        let command = match words.next().unwrap_or_default() {
            "/join" => Command::Join(
                words
                    .next()
                    .ok_or(CommandError::MissingRoom)?
                    .to_string(),
            ),
            "/leave" => Command::Leave,
            "/quit" => Command::Quit,
            other => return Err(CommandError::Unrecognized(other.to_string())),
        };
        Ok(Some(command))
    }

    pub fn into_message(self) -> Message {
        match self {
            Command::Join(room) => Message::new(Tag::Join, room),
            Command::Leave => Message::new(Tag::Leave, ""),
            Command::Quit => Message::new(Tag::Quit, ""),
            Command::Send(text) => Message::new(Tag::SendAll, text),
        }
    }
}

/// Send a request and wait for its `ok`
///
/// An `err` answer becomes [`ClientError::Rejected`] carrying the server's
/// reason.
pub async fn request(conn: &mut Connection, msg: Message) -> Result<(), ClientError> {
    conn.send(&msg).await?;
    let reply = conn.receive().await?;
    match reply.tag {
        Tag::Ok => Ok(()),
        Tag::Err => Err(ClientError::Rejected(reply.payload)),
        _ => Err(ClientError::UnexpectedResponse(msg.tag.to_string())),
    }
}

async fn report<E>(errors: &mut E, text: &str) -> Result<(), ClientError>
where
    E: AsyncWrite + Unpin,
{
    errors.write_all(format!("{}\n", text).as_bytes()).await?;
    errors.flush().await?;
    Ok(())
}

/// Log in as a sender and run typed commands until `/quit` or end of input
///
/// Server errors and bad input are written to `errors` and the loop goes on.
/// A failed login or a broken connection ends it with an error.
pub async fn run_sender<I, E>(
    conn: &mut Connection,
    username: &str,
    input: I,
    errors: &mut E,
) -> Result<(), ClientError>
where
    I: AsyncBufRead + Unpin,
    E: AsyncWrite + Unpin,
{
    request(conn, Message::new(Tag::SenderLogin, username)).await?;
    debug!("Logged in as sender {}", username);

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                report(errors, &e.to_string()).await?;
                continue;
            }
        };

        let quit = command == Command::Quit;
        match request(conn, command.into_message()).await {
            Ok(()) => {}
            Err(ClientError::Rejected(reason)) => report(errors, &reason).await?,
            Err(ClientError::Connection(e)) if e.is_recoverable() => {
                report(errors, &e.to_string()).await?
            }
            Err(e @ ClientError::UnexpectedResponse(_)) => report(errors, &e.to_string()).await?,
            Err(e) => return Err(e),
        }
        if quit {
            break;
        }
    }
    Ok(())
}

/// Log in as a receiver, join `room` and print deliveries until the server
/// hangs up
///
/// Each delivery is written to `out` as `sender: text`. An `err` from the
/// server ends the session with [`ClientError::Rejected`].
pub async fn run_receiver<O, E>(
    conn: &mut Connection,
    username: &str,
    room: &str,
    out: &mut O,
    errors: &mut E,
) -> Result<(), ClientError>
where
    O: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    request(conn, Message::new(Tag::ReceiverLogin, username)).await?;
    request(conn, Message::new(Tag::Join, room)).await?;
    debug!("Receiving in room {} as {}", room, username);

    loop {
        let msg = match conn.receive().await {
            Ok(msg) => msg,
            Err(ConnectionError::Eof) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                report(errors, &e.to_string()).await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match msg.tag {
            Tag::Delivery => match Delivery::parse(&msg.payload) {
                Some(delivery) => {
                    let line = format!("{}: {}\n", delivery.sender, delivery.text);
                    out.write_all(line.as_bytes()).await?;
                    out.flush().await?;
                }
                None => report(errors, "invalid delivery message format").await?,
            },
            Tag::Err => return Err(ClientError::Rejected(msg.payload)),
            other => debug!("Ignoring {} from server", other),
        }
    }
}
