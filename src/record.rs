//! Typed record shapes for conversation data
//!
//! These mirror the JSON documents stored inside the container payload.
//! The crate does not validate record semantics; it only guarantees that
//! every shape serializes and deserializes losslessly.

use serde::{Deserialize, Serialize};

/// Summary of one chat, as listed by a record store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub display_name: String,
    pub message_count: u64,
    /// ISO-8601 timestamp of the most recent message, if any
    pub last_date: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// A reaction attached to a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    /// Reaction kind, e.g. "Loved" or "-Liked" for a removal
    #[serde(rename = "type")]
    pub kind: String,
    pub sender: Option<String>,
    pub date: Option<String>,
}

/// Reference to an attachment file on the source system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentRef {
    /// Source path on disk; may start with `~`
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub transfer_name: Option<String>,
}

/// A message as supplied by a record store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub rowid: i64,
    pub guid: String,
    pub text: Option<String>,
    /// ISO-8601 timestamp, if known
    pub date: Option<String>,
    pub is_from_me: bool,
    pub sender: Option<String>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

/// An attachment after it has been copied into the container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedAttachment {
    /// Container-relative entry path
    pub path: String,
    pub mime_type: Option<String>,
    pub transfer_name: Option<String>,
}

/// A message as stored in a chat's data document
///
/// Identical to [`Message`] except attachments point at container entries
/// instead of source paths; attachments whose source file could not be
/// copied are absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedMessage {
    pub rowid: i64,
    pub guid: String,
    pub text: Option<String>,
    pub date: Option<String>,
    pub is_from_me: bool,
    pub sender: Option<String>,
    pub reactions: Vec<Reaction>,
    pub attachments: Vec<ArchivedAttachment>,
}

/// The per-chat metadata document (`data.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatDocument {
    pub chat: ChatSummary,
    pub messages: Vec<ArchivedMessage>,
}

/// One entry of `manifest.json` in a multi-chat archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub chat_id: i64,
    pub display_name: String,
    pub message_count: u64,
    pub last_date: Option<String>,
    /// Container path of this chat's data document
    pub data_path: String,
}
