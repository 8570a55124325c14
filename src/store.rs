//! Record store interface
//!
//! The archive builder pulls chats and messages through [`RecordStore`];
//! how records come out of their origin database is not this crate's
//! concern. [`JsonRecordStore`] is the provided adapter: it loads a full
//! export from one JSON document, which is what the CLI and the tests use.

use crate::error::{Error, Result};
use crate::record::{ChatSummary, Message};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Source of conversation records
pub trait RecordStore {
    /// List every chat, in the store's display order
    fn list_chats(&self) -> Result<Vec<ChatSummary>>;

    /// Fetch the ordered messages of one chat, reactions already folded
    /// into their target messages
    fn get_messages(&self, chat_id: i64) -> Result<Vec<Message>>;
}

#[derive(Debug, Deserialize)]
struct JsonExport {
    chats: Vec<ChatSummary>,
    /// Keyed by chat_id rendered as a string (JSON object keys)
    messages: HashMap<String, Vec<Message>>,
}

/// Record store backed by a single JSON export file
pub struct JsonRecordStore {
    export: JsonExport,
}

impl JsonRecordStore {
    /// Load an export document of the form
    /// `{"chats": [...], "messages": {"<chat_id>": [...]}}`
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let export: JsonExport = serde_json::from_str(json)?;
        Ok(JsonRecordStore { export })
    }
}

impl RecordStore for JsonRecordStore {
    fn list_chats(&self) -> Result<Vec<ChatSummary>> {
        Ok(self.export.chats.clone())
    }

    fn get_messages(&self, chat_id: i64) -> Result<Vec<Message>> {
        self.export
            .messages
            .get(&chat_id.to_string())
            .cloned()
            .ok_or(Error::ChatNotFound(chat_id))
    }
}
