//! Room struct definition
//!
//! A named broadcast group of receivers. Membership lives behind a per-room
//! lock and is only reachable through add/remove/broadcast, so every access
//! follows the same locking discipline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::message::Delivery;
use crate::types::{ClientId, RoomName, Username};
use crate::user::User;

#[derive(Debug, Default)]
struct Members {
    users: HashMap<ClientId, Arc<User>>,
    /// Set once on shutdown; anyone added afterwards gets a closed mailbox
    closed: bool,
}

/// Chat room
#[derive(Debug)]
pub struct Room {
    /// Room name, unique within the registry
    pub name: RoomName,
    /// Current receivers, keyed by their connection id
    members: Mutex<Members>,
}

impl Room {
    /// Create an empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: Mutex::new(Members::default()),
        }
    }

    fn members(&self) -> MutexGuard<'_, Members> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a receiver
    ///
    /// Returns false if that user was already a member. A user added to a
    /// closed room has its mailbox closed straight away.
    pub fn add_member(&self, user: Arc<User>) -> bool {
        let mut members = self.members();
        if members.closed {
            user.mailbox().close();
        }
        members.users.insert(user.id, user).is_none()
    }

    /// Remove a receiver
    ///
    /// Returns false if the user was not a member; removing twice is harmless.
    pub fn remove_member(&self, id: ClientId) -> bool {
        self.members().users.remove(&id).is_some()
    }

    /// Check if a user is in this room
    pub fn contains(&self, id: ClientId) -> bool {
        self.members().users.contains_key(&id)
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members().users.len()
    }

    pub fn is_closed(&self) -> bool {
        self.members().closed
    }

    /// Queue a delivery for every current member
    ///
    /// Membership cannot change while the fan-out runs, so a concurrent
    /// joiner either gets the whole message or none of it. Returns the number
    /// of mailboxes written.
    pub fn broadcast_message(&self, sender: &Username, text: &str) -> usize {
        let members = self.members();
        for user in members.users.values() {
            let delivery = Delivery::new(self.name.as_str(), sender.as_str(), text);
            user.deliver(delivery.into_message());
        }
        debug!(
            "Room {}: {} broadcast to {} member(s)",
            self.name,
            sender,
            members.users.len()
        );
        members.users.len()
    }

    /// Close every member's mailbox, releasing their workers
    ///
    /// The room stays closed: later joiners are released as they arrive.
    pub fn close_mailboxes(&self) {
        let mut members = self.members();
        members.closed = true;
        for user in members.users.values() {
            user.mailbox().close();
        }
    }

    /// Add a user and get a guard that removes it again when dropped
    pub fn join(self: &Arc<Self>, user: Arc<User>) -> Membership {
        self.add_member(Arc::clone(&user));
        Membership {
            room: Arc::clone(self),
            user,
        }
    }
}

/// A user's place in a room
///
/// Dropping it removes the user, so every exit path of a receiver worker
/// leaves the room clean.
#[derive(Debug)]
pub struct Membership {
    room: Arc<Room>,
    user: Arc<User>,
}

impl Membership {
    pub fn room(&self) -> &Arc<Room> {
        &self.room
    }

    pub fn user(&self) -> &Arc<User> {
        &self.user
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if self.room.remove_member(self.user.id) {
            debug!("{} left room {}", self.user.username, self.room.name);
        }
    }
}
