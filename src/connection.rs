//! Framed message transport
//!
//! A `Connection` owns one byte stream and moves whole [`Message`]s over it,
//! one newline-terminated frame at a time. It remembers the outcome of the
//! last operation so callers can tell protocol noise from a dead peer.

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::ConnectionError;
use crate::message::{Message, MAX_FRAME_LEN};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Outcome of the most recent send or receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastResult {
    Success,
    /// A frame could not be parsed or produced; the stream is still usable
    InvalidMsg,
    /// The peer went away or the transport failed
    EofOrError,
}

struct Transport {
    reader: BufReader<BoxedReader>,
    writer: BoxedWriter,
}

/// One framed connection to a peer
pub struct Connection {
    transport: Option<Transport>,
    /// Bytes of the line currently being read
    line: Vec<u8>,
    /// Set once the current line has grown past the frame limit
    overflow: bool,
    last_result: LastResult,
}

impl Connection {
    /// Wrap any bidirectional byte stream
    pub fn new<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            transport: Some(Transport {
                reader: BufReader::new(Box::new(reader) as BoxedReader),
                writer: Box::new(writer),
            }),
            line: Vec::new(),
            overflow: false,
            last_result: LastResult::Success,
        }
    }

    /// Open a client connection over TCP
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ConnectionError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn last_result(&self) -> LastResult {
        self.last_result
    }

    /// Write one message as a complete frame
    pub async fn send(&mut self, msg: &Message) -> Result<(), ConnectionError> {
        let result = self.write_frame(msg).await;
        self.record(&result);
        result
    }

    /// Read the next complete frame
    ///
    /// Cancellation safe: a partially read line is kept and the next call
    /// picks up where this one stopped.
    pub async fn receive(&mut self) -> Result<Message, ConnectionError> {
        let result = self.read_frame().await;
        self.record(&result);
        result
    }

    /// Shut down the write side and release the stream. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.writer.shutdown().await {
                debug!("Error shutting down connection: {}", e);
            }
        }
        self.line.clear();
        self.overflow = false;
    }

    fn record<T>(&mut self, result: &Result<T, ConnectionError>) {
        self.last_result = match result {
            Ok(_) => LastResult::Success,
            Err(e) if e.is_recoverable() => LastResult::InvalidMsg,
            Err(_) => LastResult::EofOrError,
        };
    }

    async fn write_frame(&mut self, msg: &Message) -> Result<(), ConnectionError> {
        let transport = self.transport.as_mut().ok_or(ConnectionError::Closed)?;
        let frame = msg.encode().map_err(ConnectionError::Invalid)?;
        transport.writer.write_all(frame.as_bytes()).await?;
        transport.writer.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Message, ConnectionError> {
        let transport = self.transport.as_mut().ok_or(ConnectionError::Closed)?;

        loop {
            let available = transport.reader.fill_buf().await?;
            if available.is_empty() {
                // An unterminated trailing line is dropped with the stream.
                self.line.clear();
                self.overflow = false;
                return Err(ConnectionError::Eof);
            }

            let (chunk, used, complete) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (&available[..i], i + 1, true),
                None => (available, available.len(), false),
            };

            // One extra byte leaves room for a trailing '\r'.
            if self.overflow || self.line.len() + chunk.len() > MAX_FRAME_LEN + 1 {
                self.overflow = true;
            } else {
                self.line.extend_from_slice(chunk);
            }
            transport.reader.consume(used);

            if complete {
                let mut line = std::mem::take(&mut self.line);
                let overflow = std::mem::replace(&mut self.overflow, false);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if overflow || line.len() > MAX_FRAME_LEN {
                    return Err(ConnectionError::Malformed(format!(
                        "frame longer than {} bytes",
                        MAX_FRAME_LEN
                    )));
                }
                let text = String::from_utf8(line).map_err(|_| {
                    ConnectionError::Malformed("frame is not valid UTF-8".to_string())
                })?;
                return Message::decode(&text).map_err(ConnectionError::Malformed);
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &self.is_open())
            .field("last_result", &self.last_result)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, DuplexStream};

    use super::*;
    use crate::message::Tag;

    fn pair() -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(4096);
        (Connection::new(a), Connection::new(b))
    }

    /// A connection on one end, the raw stream on the other
    fn raw_pair() -> (Connection, DuplexStream) {
        let (a, b) = tokio::io::duplex(4096);
        (Connection::new(a), b)
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (mut client, mut server) = pair();

        client.send(&Message::new(Tag::SenderLogin, "alice")).await.unwrap();
        assert_eq!(client.last_result(), LastResult::Success);

        let msg = server.receive().await.unwrap();
        assert_eq!(msg, Message::new(Tag::SenderLogin, "alice"));
        assert_eq!(server.last_result(), LastResult::Success);
    }

    #[tokio::test]
    async fn test_wire_format() {
        let (mut conn, mut raw) = raw_pair();
        conn.send(&Message::new(Tag::Join, "lounge")).await.unwrap();
        conn.close().await;

        let mut out = String::new();
        raw.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "join:lounge\n");
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection_open() {
        let (mut conn, mut raw) = raw_pair();
        raw.write_all(b"no separator here\nquit:\n").await.unwrap();

        let err = conn.receive().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(_)));
        assert_eq!(conn.last_result(), LastResult::InvalidMsg);
        assert!(conn.is_open());

        let msg = conn.receive().await.unwrap();
        assert_eq!(msg.tag, Tag::Quit);
        assert_eq!(conn.last_result(), LastResult::Success);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_malformed() {
        let (mut conn, mut raw) = raw_pair();
        raw.write_all(b"shout:hey\n").await.unwrap();
        assert!(matches!(
            conn.receive().await,
            Err(ConnectionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_crlf_is_accepted() {
        let (mut conn, mut raw) = raw_pair();
        raw.write_all(b"sendall:hi\r\n").await.unwrap();
        assert_eq!(conn.receive().await.unwrap(), Message::new(Tag::SendAll, "hi"));
    }

    #[tokio::test]
    async fn test_overlong_frame_is_skipped_whole() {
        let (mut conn, mut raw) = raw_pair();
        let mut long = b"sendall:".to_vec();
        long.extend(std::iter::repeat(b'x').take(MAX_FRAME_LEN * 3));
        long.push(b'\n');
        raw.write_all(&long).await.unwrap();
        raw.write_all(b"leave:\n").await.unwrap();

        assert!(matches!(
            conn.receive().await,
            Err(ConnectionError::Malformed(_))
        ));
        assert_eq!(conn.receive().await.unwrap().tag, Tag::Leave);
    }

    #[tokio::test]
    async fn test_eof() {
        let (mut conn, raw) = raw_pair();
        drop(raw);

        assert!(matches!(conn.receive().await, Err(ConnectionError::Eof)));
        assert_eq!(conn.last_result(), LastResult::EofOrError);
    }

    #[tokio::test]
    async fn test_unframeable_message_is_refused() {
        let (mut conn, _raw) = raw_pair();
        let err = conn
            .send(&Message::new(Tag::SendAll, "a\nb"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Invalid(_)));
        assert_eq!(conn.last_result(), LastResult::InvalidMsg);
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn test_closed_connection_refuses_io() {
        let (mut conn, _raw) = raw_pair();
        conn.close().await;
        conn.close().await;

        assert!(!conn.is_open());
        assert!(matches!(
            conn.send(&Message::ok("x")).await,
            Err(ConnectionError::Closed)
        ));
        assert!(matches!(conn.receive().await, Err(ConnectionError::Closed)));
        assert_eq!(conn.last_result(), LastResult::EofOrError);
    }

    #[tokio::test]
    async fn test_receive_survives_cancellation() {
        let (mut conn, mut raw) = raw_pair();
        raw.write_all(b"sendall:hel").await.unwrap();

        // The read is abandoned halfway through the line.
        let timed_out = tokio::time::timeout(Duration::from_millis(50), conn.receive()).await;
        assert!(timed_out.is_err());

        raw.write_all(b"lo\n").await.unwrap();
        assert_eq!(
            conn.receive().await.unwrap(),
            Message::new(Tag::SendAll, "hello")
        );
    }
}
