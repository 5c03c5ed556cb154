//! Per-connection protocol worker
//!
//! Drives one client through login, then either the sender command loop or
//! the receiver delivery loop. Every error stays inside the connection:
//! protocol mistakes are answered with `err` and the worker keeps going,
//! transport failures end the worker.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::{ChatError, ConnectionError};
use crate::message::{Delivery, Message, Tag};
use crate::registry::RoomRegistry;
use crate::room::{Membership, Room};
use crate::types::{ClientId, RoomName, Username};
use crate::user::User;

/// Serve one client until it quits or disconnects
///
/// The connection is closed on return, whichever way the worker ends.
pub async fn handle_connection(
    mut conn: Connection,
    client_id: ClientId,
    registry: Arc<RoomRegistry>,
) -> Result<(), ConnectionError> {
    let result = serve(&mut conn, client_id, &registry).await;
    conn.close().await;
    debug!("Client {} finished", client_id);
    result
}

async fn serve(
    conn: &mut Connection,
    client_id: ClientId,
    registry: &RoomRegistry,
) -> Result<(), ConnectionError> {
    let Some(login) = next_message(conn).await? else {
        debug!("Client {} left before logging in", client_id);
        return Ok(());
    };

    match login.tag {
        Tag::SenderLogin => match Username::parse(&login.payload) {
            Ok(username) => {
                conn.send(&Message::ok("logged in as sender")).await?;
                info!("Client {} logged in as sender {}", client_id, username);
                chat_with_sender(conn, username, registry).await
            }
            Err(e) => reject(conn, e).await,
        },
        Tag::ReceiverLogin => match Username::parse(&login.payload) {
            Ok(username) => {
                conn.send(&Message::ok("logged in as receiver")).await?;
                info!("Client {} logged in as receiver {}", client_id, username);
                chat_with_receiver(conn, client_id, username, registry).await
            }
            Err(e) => reject(conn, e).await,
        },
        _ => reject(conn, ChatError::InvalidLogin).await,
    }
}

/// Answer with an error and end the worker
async fn reject(conn: &mut Connection, err: ChatError) -> Result<(), ConnectionError> {
    debug!("Rejecting client: {}", err);
    conn.send(&err.into()).await
}

/// Read the next well-formed message
///
/// Malformed frames are answered with an error and skipped. Returns `None`
/// once the peer has closed the stream.
async fn next_message(conn: &mut Connection) -> Result<Option<Message>, ConnectionError> {
    loop {
        match conn.receive().await {
            Ok(msg) => return Ok(Some(msg)),
            Err(ConnectionError::Malformed(reason)) => {
                debug!("Malformed frame: {}", reason);
                conn.send(&ChatError::MalformedFrame.into()).await?;
            }
            Err(ConnectionError::Eof) => return Ok(None),
            Err(e) => return Err(e),
        }
    }
}

/// What the sender loop does after replying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Command state of a logged-in sender
///
/// Senders are never room members; the current room is only where their
/// `sendall` commands go.
#[derive(Debug)]
pub struct SenderSession {
    username: Username,
    current_room: Option<Arc<Room>>,
}

impl SenderSession {
    pub fn new(username: Username) -> Self {
        Self {
            username,
            current_room: None,
        }
    }

    pub fn current_room(&self) -> Option<&Arc<Room>> {
        self.current_room.as_ref()
    }

    /// Apply one command, producing the reply to send back
    pub fn handle(&mut self, msg: &Message, registry: &RoomRegistry) -> (Message, Flow) {
        match self.apply(msg, registry) {
            Ok(reply) => reply,
            Err(e) => (e.into(), Flow::Continue),
        }
    }

    fn apply(
        &mut self,
        msg: &Message,
        registry: &RoomRegistry,
    ) -> Result<(Message, Flow), ChatError> {
        match msg.tag {
            Tag::Join => {
                let name = RoomName::parse(&msg.payload)?;
                let room = registry.find_or_create_room(&name);
                debug!("Sender {} now in room {}", self.username, name);
                self.current_room = Some(room);
                Ok((Message::ok("joined room"), Flow::Continue))
            }
            Tag::SendAll => {
                let room = self.current_room.as_ref().ok_or(ChatError::NotInRoom)?;
                let delivery = Delivery::new(
                    room.name.as_str(),
                    self.username.as_str(),
                    msg.payload.as_str(),
                );
                if delivery.into_message().encode().is_err() {
                    return Err(ChatError::MessageTooLong);
                }
                room.broadcast_message(&self.username, &msg.payload);
                Ok((Message::ok("message sent"), Flow::Continue))
            }
            Tag::Leave => {
                let room = self.current_room.take().ok_or(ChatError::NotInRoom)?;
                debug!("Sender {} left room {}", self.username, room.name);
                Ok((Message::ok("left room"), Flow::Continue))
            }
            Tag::Quit => Ok((Message::ok("bye"), Flow::Quit)),
            _ => Err(ChatError::InvalidCommand),
        }
    }
}

async fn chat_with_sender(
    conn: &mut Connection,
    username: Username,
    registry: &RoomRegistry,
) -> Result<(), ConnectionError> {
    let mut session = SenderSession::new(username);

    while let Some(msg) = next_message(conn).await? {
        let (reply, flow) = session.handle(&msg, registry);
        conn.send(&reply).await?;
        if flow == Flow::Quit {
            info!("Sender {} quit", session.username);
            break;
        }
    }
    Ok(())
}

async fn chat_with_receiver(
    conn: &mut Connection,
    client_id: ClientId,
    username: Username,
    registry: &RoomRegistry,
) -> Result<(), ConnectionError> {
    let Some(msg) = next_message(conn).await? else {
        return Ok(());
    };
    if msg.tag != Tag::Join {
        return reject(conn, ChatError::ExpectedJoin).await;
    }
    let room_name = match RoomName::parse(&msg.payload) {
        Ok(name) => name,
        Err(e) => return reject(conn, e).await,
    };

    let room = registry.find_or_create_room(&room_name);
    // Dropping the membership on any return below takes the user out again.
    let membership = room.join(Arc::new(User::new(client_id, username)));
    conn.send(&Message::ok("joined room")).await?;
    info!(
        "Receiver {} joined room {} ({} member(s))",
        membership.user().username,
        room_name,
        room.member_count()
    );

    let result = deliver(conn, &membership).await;
    info!(
        "Receiver {} leaving room {}",
        membership.user().username,
        room_name
    );
    result
}

/// Forward mailbox deliveries until the client goes away
///
/// The connection is watched at the same time, so a closed client is noticed
/// right away instead of on the next failed write. Malformed frames get the
/// usual error reply; other well-formed frames besides `quit` are ignored.
async fn deliver(conn: &mut Connection, membership: &Membership) -> Result<(), ConnectionError> {
    let user = membership.user();

    loop {
        tokio::select! {
            delivery = user.mailbox().dequeue() => {
                let Some(msg) = delivery else {
                    debug!("Mailbox of {} closed", user.username);
                    return Ok(());
                };
                match conn.send(&msg).await {
                    Ok(()) => {}
                    Err(e) if e.is_recoverable() => {
                        warn!("Dropping delivery for {}: {}", user.username, e);
                    }
                    Err(e) => return Err(e),
                }
            }
            incoming = conn.receive() => match incoming {
                Ok(msg) if msg.tag == Tag::Quit => {
                    conn.send(&Message::ok("bye")).await?;
                    return Ok(());
                }
                Ok(msg) => debug!("Ignoring {} from receiver {}", msg.tag, user.username),
                Err(ConnectionError::Malformed(reason)) => {
                    debug!("Malformed frame from receiver {}: {}", user.username, reason);
                    conn.send(&ChatError::MalformedFrame.into()).await?;
                }
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e) => return Err(e),
            },
        }
    }
}
