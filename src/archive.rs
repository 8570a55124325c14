//! Archive orchestration: records in, encrypted .imv file out
//!
//! [`ArchiveBuilder`] pulls chats from a [`RecordStore`], assembles the
//! container payload (data documents, copied attachments, the embedded
//! reader page), encrypts it and writes the result. The read side mirrors
//! this for viewers: decrypt, then safely extract.

use crate::container::{extract_container, ContainerBuilder};
use crate::crypto::ImvCipher;
use crate::error::{Error, Result};
use crate::record::{ArchivedAttachment, ArchivedMessage, ChatDocument, ChatSummary, ManifestEntry, Message};
use crate::store::RecordStore;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reader page embedded into single-chat archives
const READER_SINGLE: &str = include_str!("../templates/reader_single.html");

/// Reader page embedded into multi-chat archives
const READER_MULTI: &str = include_str!("../templates/reader_multi.html");

/// Progress callback: (chats completed, chats total)
pub type ProgressFn<'a> = Box<dyn Fn(usize, usize) + 'a>;

/// Copy each message's attachments into the container and produce the
/// serializable message list. Attachments that cannot be copied are
/// dropped from their message.
fn prepare_messages(
    container: &mut ContainerBuilder,
    messages: &[Message],
    attachment_prefix: &str,
) -> Vec<ArchivedMessage> {
    messages
        .iter()
        .map(|msg| {
            let attachments = msg
                .attachments
                .iter()
                .filter_map(|att| {
                    container
                        .add_attachment(att, attachment_prefix, msg.rowid)
                        .map(|path| ArchivedAttachment {
                            path,
                            mime_type: att.mime_type.clone(),
                            transfer_name: att.transfer_name.clone(),
                        })
                })
                .collect();

            ArchivedMessage {
                rowid: msg.rowid,
                guid: msg.guid.clone(),
                text: msg.text.clone(),
                date: msg.date.clone(),
                is_from_me: msg.is_from_me,
                sender: msg.sender.clone(),
                reactions: msg.reactions.clone(),
                attachments,
            }
        })
        .collect()
}

/// Placeholder summary for a chat the store no longer lists
fn fallback_summary(chat_id: i64, message_count: usize) -> ChatSummary {
    ChatSummary {
        chat_id,
        display_name: chat_id.to_string(),
        message_count: message_count as u64,
        last_date: None,
        participants: Vec::new(),
    }
}

/// Build an encrypted .imv archive from selected chats
pub struct ArchiveBuilder<'a> {
    store: &'a dyn RecordStore,
    cipher: &'a ImvCipher,
    password: &'a str,
    output_path: PathBuf,
    chat_ids: Vec<i64>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        cipher: &'a ImvCipher,
        password: &'a str,
        output_path: impl Into<PathBuf>,
        chat_ids: Vec<i64>,
    ) -> Self {
        ArchiveBuilder {
            store,
            cipher,
            password,
            output_path: output_path.into(),
            chat_ids,
            progress: None,
        }
    }

    /// Install a progress callback, invoked after each chat completes
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    fn report_progress(&self, current: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress(current, total);
        }
    }

    /// Build the archive and write it to the output path, which is
    /// returned for the caller's convenience
    pub fn build(&self) -> Result<PathBuf> {
        if self.chat_ids.is_empty() {
            return Err(Error::Config("no chats selected".to_string()));
        }

        let payload = if self.chat_ids.len() == 1 {
            self.build_single()?
        } else {
            self.build_multi()?
        };

        let encrypted = self.cipher.encrypt(&payload, self.password)?;
        std::fs::write(&self.output_path, &encrypted)?;

        info!(
            path = %self.output_path.display(),
            bytes = encrypted.len(),
            "archive written"
        );
        Ok(self.output_path.clone())
    }

    /// Compose the single-chat payload: data.json, attachments/, index.html
    fn build_single(&self) -> Result<Vec<u8>> {
        let chat_id = self.chat_ids[0];
        let chat = self
            .store
            .list_chats()?
            .into_iter()
            .find(|c| c.chat_id == chat_id);

        let mut container = ContainerBuilder::new();
        let messages = self.store.get_messages(chat_id)?;
        let processed = prepare_messages(&mut container, &messages, "attachments");

        let document = ChatDocument {
            chat: chat.unwrap_or_else(|| fallback_summary(chat_id, processed.len())),
            messages: processed,
        };
        container.add_text("data.json", &serde_json::to_string_pretty(&document)?)?;
        container.add_text("index.html", READER_SINGLE)?;

        let payload = container.finish()?;
        self.report_progress(1, 1);
        Ok(payload)
    }

    /// Compose the multi-chat payload: per-chat documents and attachment
    /// trees, manifest.json in selection order, shared index.html
    fn build_multi(&self) -> Result<Vec<u8>> {
        let all_chats = self.store.list_chats()?;
        let total = self.chat_ids.len();

        let mut container = ContainerBuilder::new();
        let mut manifest = Vec::with_capacity(total);

        for (i, &chat_id) in self.chat_ids.iter().enumerate() {
            let chat = all_chats.iter().find(|c| c.chat_id == chat_id).cloned();
            let messages = self.store.get_messages(chat_id)?;

            let prefix = format!("chats/{}/attachments", chat_id);
            let processed = prepare_messages(&mut container, &messages, &prefix);

            let chat = chat.unwrap_or_else(|| fallback_summary(chat_id, processed.len()));
            let data_path = format!("chats/{}/data.json", chat_id);

            manifest.push(ManifestEntry {
                chat_id,
                display_name: chat.display_name.clone(),
                message_count: chat.message_count,
                last_date: chat.last_date.clone(),
                data_path: data_path.clone(),
            });

            let document = ChatDocument {
                chat,
                messages: processed,
            };
            container.add_text(&data_path, &serde_json::to_string_pretty(&document)?)?;

            self.report_progress(i + 1, total);
        }

        container.add_text("manifest.json", &serde_json::to_string_pretty(&manifest)?)?;
        container.add_text("index.html", READER_MULTI)?;

        container.finish()
    }
}

/// Decrypt an .imv file back to its container payload
pub fn read_archive(path: &Path, password: &str, cipher: &ImvCipher) -> Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    cipher.decrypt(&data, password)
}

/// Decrypt an .imv file and extract its container to a directory
///
/// Applies the container safety checks: traversal and link entries are
/// skipped, everything else lands under `dest`. Returns the number of
/// extracted entries.
pub fn extract_archive(
    path: &Path,
    password: &str,
    dest: &Path,
    cipher: &ImvCipher,
) -> Result<usize> {
    let payload = read_archive(path, password, cipher)?;
    extract_container(&payload, dest)
}
