//! User struct definition
//!
//! Represents a logged-in receiver and the mailbox its deliveries wait in.

use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::types::{ClientId, Username};

/// Logged-in receiver
///
/// Shared between the owning worker (which drains the mailbox) and the room
/// it belongs to (which fills it).
#[derive(Debug)]
pub struct User {
    /// Identifier of the connection that logged in
    pub id: ClientId,
    /// Validated login name
    pub username: Username,
    mailbox: Mailbox,
}

impl User {
    pub fn new(id: ClientId, username: Username) -> Self {
        Self {
            id,
            username,
            mailbox: Mailbox::new(),
        }
    }

    /// Queue a message for this user. Never waits.
    pub fn deliver(&self, msg: Message) {
        self.mailbox.enqueue(msg);
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tag;

    #[tokio::test]
    async fn test_user_creation() {
        let user = User::new(ClientId::new(), Username::parse("Alice").unwrap());

        assert_eq!(user.username.as_str(), "Alice");
        assert!(user.mailbox().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_goes_to_own_mailbox() {
        let user = User::new(ClientId::new(), Username::parse("bob").unwrap());
        let msg = Message::new(Tag::Delivery, "lounge:alice:hi");

        user.deliver(msg.clone());

        assert_eq!(user.mailbox().len(), 1);
        assert_eq!(user.mailbox().dequeue().await, Some(msg));
    }
}
