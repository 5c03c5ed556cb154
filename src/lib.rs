//! Multi-room Chat Server Library
//!
//! A line-protocol chat service built on tokio. Clients log in either as a
//! *sender*, which joins rooms and broadcasts text, or as a *receiver*, which
//! joins one room and is streamed every message broadcast there.
//!
//! # Features
//! - Newline-delimited `tag:payload` wire protocol
//! - Rooms created on first use, shared by every connection
//! - Per-receiver unbounded mailbox with awaiting dequeue
//! - Malformed input answered with an error, never fatal
//! - Connection limit and graceful shutdown
//!
//! # Architecture
//! One task per connection, shared state behind small locks:
//! - `RoomRegistry` maps names to rooms under a single lock
//! - each `Room` guards its member set with its own lock
//! - each `User` owns a `Mailbox` filled by rooms and drained by its worker
//! - no lock is ever held across an `.await`
//!
//! # Example
//! ```no_run
//! use roomchat::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(&ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod handler;
pub mod logging;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use client::{run_receiver, run_sender, Command};
pub use connection::{Connection, LastResult};
pub use error::{ChatError, ClientError, CommandError, ConnectionError};
pub use handler::handle_connection;
pub use mailbox::Mailbox;
pub use message::{Delivery, Message, Tag};
pub use registry::RoomRegistry;
pub use room::{Membership, Room};
pub use server::{Server, ServerConfig};
pub use types::{ClientId, RoomName, Username};
pub use user::User;
