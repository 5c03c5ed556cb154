//! Basic type definitions for the chat server
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique connection identifier
//! - `Username`: validated login name
//! - `RoomName`: validated room name

use uuid::Uuid;

use crate::error::ChatError;

/// Unique client identifier (newtype pattern)
///
/// Every accepted connection gets one. Room membership is keyed by it, so two
/// receivers logged in under the same username are still distinct members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Names are non-empty and made only of ASCII letters and digits.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Login name of a sender or receiver
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    /// Validate and wrap a username
    pub fn parse(name: &str) -> Result<Self, ChatError> {
        if is_valid_name(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ChatError::InvalidUsername)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room name, the registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomName(String);

impl RoomName {
    /// Validate and wrap a room name
    pub fn parse(name: &str) -> Result<Self, ChatError> {
        if is_valid_name(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(ChatError::InvalidRoomName)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_valid_names() {
        for name in ["alice", "Bob", "room42", "7", "ABCxyz019"] {
            assert!(is_valid_name(name), "{name} should be valid");
            assert!(Username::parse(name).is_ok());
            assert!(RoomName::parse(name).is_ok());
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "al ice", "bob!", "room:1", "caf\u{e9}", "tab\t", "under_score"] {
            assert!(!is_valid_name(name), "{name:?} should be invalid");
            assert!(matches!(
                Username::parse(name),
                Err(ChatError::InvalidUsername)
            ));
            assert!(matches!(
                RoomName::parse(name),
                Err(ChatError::InvalidRoomName)
            ));
        }
    }

    #[test]
    fn test_display_is_raw_name() {
        let room = RoomName::parse("lounge").unwrap();
        assert_eq!(room.to_string(), "lounge");
        assert_eq!(room.as_str(), "lounge");
    }
}
