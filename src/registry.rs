//! Server-wide room registry
//!
//! Maps room names to rooms. One lock covers lookup and creation together,
//! which is what keeps two first-joiners from creating the same room twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::room::Room;
use crate::types::RoomName;

#[derive(Debug, Default)]
struct Rooms {
    by_name: HashMap<RoomName, Arc<Room>>,
    closed: bool,
}

/// All rooms of one server
///
/// Rooms are created on first use and live as long as the registry, even
/// when empty.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: Mutex<Rooms>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, Rooms> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the room with this name, creating it if needed
    ///
    /// After [`close_all`](Self::close_all) new rooms are born closed.
    pub fn find_or_create_room(&self, name: &RoomName) -> Arc<Room> {
        let mut rooms = self.rooms();
        if let Some(room) = rooms.by_name.get(name) {
            return Arc::clone(room);
        }

        let room = Arc::new(Room::new(name.clone()));
        if rooms.closed {
            // Nobody else can see the room yet, so its lock is free.
            room.close_mailboxes();
        }
        rooms.by_name.insert(name.clone(), Arc::clone(&room));
        info!("Room {} created", name);
        debug!("Total rooms: {}", rooms.by_name.len());
        room
    }

    /// Look up a room without creating it
    pub fn get(&self, name: &RoomName) -> Option<Arc<Room>> {
        self.rooms().by_name.get(name).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms().by_name.len()
    }

    pub fn is_closed(&self) -> bool {
        self.rooms().closed
    }

    /// Release every receiver blocked on its mailbox, now and later
    ///
    /// Receivers that join any room after this call get a closed mailbox and
    /// are released at once.
    pub fn close_all(&self) {
        // Snapshot first so no room lock is taken under the registry lock.
        let rooms: Vec<_> = {
            let mut rooms = self.rooms();
            rooms.closed = true;
            rooms.by_name.values().cloned().collect()
        };
        info!("Closing {} room(s)", rooms.len());
        for room in rooms {
            room.close_mailboxes();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::types::{ClientId, Username};
    use crate::user::User;

    fn name(s: &str) -> RoomName {
        RoomName::parse(s).unwrap()
    }

    #[test]
    fn test_find_or_create_reuses_room() {
        let registry = RoomRegistry::new();
        let first = registry.find_or_create_room(&name("lounge"));
        let second = registry.find_or_create_room(&name("lounge"));
        let other = registry.find_or_create_room(&name("kitchen"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn test_concurrent_first_joiners_share_one_room() {
        let registry = Arc::new(RoomRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.find_or_create_room(&name("lounge")))
            })
            .collect();

        let rooms: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for room in &rooms {
            assert!(Arc::ptr_eq(room, &rooms[0]));
        }
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_empty_rooms_are_kept() {
        let registry = RoomRegistry::new();
        assert!(registry.get(&name("lounge")).is_none());

        let room = registry.find_or_create_room(&name("lounge"));
        let user = Arc::new(User::new(ClientId::new(), Username::parse("bob").unwrap()));
        drop(room.join(user));

        let again = registry.get(&name("lounge")).unwrap();
        assert!(Arc::ptr_eq(&room, &again));
        assert_eq!(again.member_count(), 0);
    }

    #[tokio::test]
    async fn test_close_all_releases_receivers() {
        let registry = RoomRegistry::new();
        let room = registry.find_or_create_room(&name("lounge"));
        let user = Arc::new(User::new(ClientId::new(), Username::parse("bob").unwrap()));
        let _membership = room.join(Arc::clone(&user));

        registry.close_all();
        assert_eq!(user.mailbox().dequeue().await, None);
    }

    #[tokio::test]
    async fn test_close_all_releases_late_joiners() {
        let registry = RoomRegistry::new();
        let existing = registry.find_or_create_room(&name("lounge"));
        registry.close_all();
        assert!(registry.is_closed());

        // Joining an existing room and creating a new one both come back closed.
        for room in [existing, registry.find_or_create_room(&name("kitchen"))] {
            assert!(room.is_closed());
            let user = Arc::new(User::new(ClientId::new(), Username::parse("late").unwrap()));
            let _membership = room.join(Arc::clone(&user));
            assert_eq!(user.mailbox().dequeue().await, None);
        }
    }
}
