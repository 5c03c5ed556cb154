//! Message protocol definitions
//!
//! Line-based protocol: every frame is `TAG:PAYLOAD\n`. Only the first `:`
//! separates the tag, so payloads may contain colons but never newlines.

use std::fmt;
use std::str::FromStr;

use crate::error::ChatError;

/// Separator between tag and payload
pub const SEPARATOR: char = ':';

/// Longest frame accepted or sent, in bytes, excluding the trailing newline
pub const MAX_FRAME_LEN: usize = 255;

/// Message kind
///
/// Closed set; anything else on the wire is a malformed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Log in as a sender
    SenderLogin,
    /// Log in as a receiver
    ReceiverLogin,
    /// Join a room
    Join,
    /// Broadcast text to the current room
    SendAll,
    /// Leave the current room
    Leave,
    /// End the session
    Quit,
    /// Success response
    Ok,
    /// Error response
    Err,
    /// Broadcast delivered to a receiver
    Delivery,
}

impl Tag {
    /// Wire spelling of the tag
    pub fn as_str(self) -> &'static str {
        match self {
            Tag::SenderLogin => "slogin",
            Tag::ReceiverLogin => "rlogin",
            Tag::Join => "join",
            Tag::SendAll => "sendall",
            Tag::Leave => "leave",
            Tag::Quit => "quit",
            Tag::Ok => "ok",
            Tag::Err => "err",
            Tag::Delivery => "delivery",
        }
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        Ok(match s {
            "slogin" => Tag::SenderLogin,
            "rlogin" => Tag::ReceiverLogin,
            "join" => Tag::Join,
            "sendall" => Tag::SendAll,
            "leave" => Tag::Leave,
            "quit" => Tag::Quit,
            "ok" => Tag::Ok,
            "err" => Tag::Err,
            "delivery" => Tag::Delivery,
            other => return Err(format!("unknown tag '{}'", other)),
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tag: Tag,
    pub payload: String,
}

impl Message {
    pub fn new(tag: Tag, payload: impl Into<String>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Success response with a short note
    pub fn ok(note: impl Into<String>) -> Self {
        Self::new(Tag::Ok, note)
    }

    /// Error response with a human-readable reason
    pub fn err(reason: impl Into<String>) -> Self {
        Self::new(Tag::Err, reason)
    }

    /// Serialize into a frame, including the trailing newline
    ///
    /// Fails if the payload contains a newline or the frame is too long.
    pub fn encode(&self) -> Result<String, String> {
        if self.payload.contains('\n') {
            return Err("payload contains a newline".to_string());
        }
        let frame = format!("{}{}{}", self.tag, SEPARATOR, self.payload);
        if frame.len() > MAX_FRAME_LEN {
            return Err(format!(
                "frame is {} bytes, limit is {}",
                frame.len(),
                MAX_FRAME_LEN
            ));
        }
        Ok(frame + "\n")
    }

    /// Parse one line, with its newline already stripped
    pub fn decode(line: &str) -> Result<Self, String> {
        let (tag, payload) = line
            .split_once(SEPARATOR)
            .ok_or_else(|| "missing separator".to_string())?;
        Ok(Self::new(tag.parse()?, payload))
    }
}

/// Convert a ChatError into the `err` response sent to the client
impl From<ChatError> for Message {
    fn from(err: ChatError) -> Self {
        Message::err(err.to_string())
    }
}

/// Payload of a `delivery` message: `room:sender:text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub room: String,
    pub sender: String,
    pub text: String,
}

impl Delivery {
    pub fn new(
        room: impl Into<String>,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            room: room.into(),
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Split a delivery payload; the text keeps any further colons
    pub fn parse(payload: &str) -> Option<Self> {
        let (room, rest) = payload.split_once(SEPARATOR)?;
        let (sender, text) = rest.split_once(SEPARATOR)?;
        Some(Self::new(room, sender, text))
    }

    pub fn into_message(self) -> Message {
        Message::new(
            Tag::Delivery,
            format!("{}{sep}{}{sep}{}", self.room, self.sender, self.text, sep = SEPARATOR),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame() {
        let msg = Message::new(Tag::SendAll, "hello there");
        assert_eq!(msg.encode().unwrap(), "sendall:hello there\n");
    }

    #[test]
    fn test_decode_splits_on_first_separator() {
        let msg = Message::decode("sendall:time is 12:30").unwrap();
        assert_eq!(msg.tag, Tag::SendAll);
        assert_eq!(msg.payload, "time is 12:30");
    }

    #[test]
    fn test_decode_empty_payload() {
        let msg = Message::decode("quit:").unwrap();
        assert_eq!(msg, Message::new(Tag::Quit, ""));
    }

    #[test]
    fn test_decode_rejects_missing_separator() {
        assert!(Message::decode("hello").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let err = Message::decode("shout:hi").unwrap_err();
        assert!(err.contains("shout"));
    }

    #[test]
    fn test_encode_rejects_newline() {
        assert!(Message::new(Tag::SendAll, "two\nlines").encode().is_err());
    }

    #[test]
    fn test_encode_rejects_long_frame() {
        // "sendall:" is 8 bytes
        let fits = Message::new(Tag::SendAll, "x".repeat(MAX_FRAME_LEN - 8));
        assert!(fits.encode().is_ok());
        let too_long = Message::new(Tag::SendAll, "x".repeat(MAX_FRAME_LEN - 7));
        assert!(too_long.encode().is_err());
    }

    #[test]
    fn test_error_message_from_chat_error() {
        let msg: Message = ChatError::NotInRoom.into();
        assert_eq!(msg, Message::err("not in a room"));
    }

    #[test]
    fn test_delivery_payload() {
        let msg = Delivery::new("lounge", "alice", "see you at 5:00").into_message();
        assert_eq!(msg.tag, Tag::Delivery);
        assert_eq!(msg.payload, "lounge:alice:see you at 5:00");

        let parsed = Delivery::parse(&msg.payload).unwrap();
        assert_eq!(parsed.room, "lounge");
        assert_eq!(parsed.sender, "alice");
        assert_eq!(parsed.text, "see you at 5:00");
    }

    #[test]
    fn test_delivery_parse_needs_two_separators() {
        assert!(Delivery::parse("lounge").is_none());
        assert!(Delivery::parse("lounge:alice").is_none());
        assert_eq!(Delivery::parse("lounge:alice:").unwrap().text, "");
    }
}
