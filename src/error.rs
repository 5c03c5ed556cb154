//! Error types for the chat server and clients
//!
//! Defines transport errors, recoverable protocol errors and client-side
//! errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Errors raised by a [`Connection`](crate::connection::Connection)
///
/// `Malformed` and `Invalid` leave the connection usable; the others mean the
/// peer is gone or the transport broke.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection was already closed locally
    #[error("connection closed")]
    Closed,

    /// The peer closed its end of the stream
    #[error("end of stream")]
    Eof,

    /// An incoming line could not be parsed into a message
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// An outgoing message cannot be framed
    #[error("unframeable message: {0}")]
    Invalid(String),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// True when the connection can keep being used after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Invalid(_))
    }
}

/// Recoverable protocol and validation errors
///
/// Each one is answered with an `err` response carrying its display text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The frame could not be parsed
    #[error("invalid message format")]
    MalformedFrame,

    /// First message was not a login
    #[error("invalid login")]
    InvalidLogin,

    /// Username is empty or not alphanumeric
    #[error("invalid username")]
    InvalidUsername,

    /// Room name is empty or not alphanumeric
    #[error("invalid room name")]
    InvalidRoomName,

    /// Sender tried to send or leave without a room
    #[error("not in a room")]
    NotInRoom,

    /// Tag not accepted in the current state
    #[error("invalid command")]
    InvalidCommand,

    /// Broadcast text would not fit in a delivery frame
    #[error("message too long")]
    MessageTooLong,

    /// Receiver sent something other than a join after login
    #[error("expected join")]
    ExpectedJoin,

    /// No worker could be started for the connection
    #[error("server busy")]
    ServerBusy,
}

/// Problems with a line typed into the sender tool
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("/join requires a room name")]
    MissingRoom,

    #[error("unrecognized command {0}")]
    Unrecognized(String),
}

/// Errors surfaced by the sender and receiver client tools
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure while talking to the server
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The server answered with an `err` response
    #[error("{0}")]
    Rejected(String),

    /// The server answered with something other than `ok` or `err`
    #[error("unexpected response to {0}")]
    UnexpectedResponse(String),

    /// Local terminal IO failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
