//! Container assembly for archive payloads
//!
//! The plaintext of an .imv archive is a gzip-compressed tar containing
//! JSON documents and copied attachment files. Building happens fully
//! in memory; extraction validates every entry against path traversal
//! and link tricks before touching the filesystem.

use crate::error::Result;
use crate::record::AttachmentRef;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Sanitize an entry name for use inside the container
///
/// Strips leading separators and drops `.` and `..` segments so no entry
/// name can escape the container root when extracted.
pub fn sanitize_entry_name(name: &str) -> String {
    name.trim_start_matches('/')
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Expand a leading `~` to the user's home directory
fn expand_user(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// True for paths in OS-managed temp locations, where transcoding
/// scratch files are routinely cleaned up behind our back
fn is_transient_path(path: &str) -> bool {
    path.contains("/T/") || path.contains("/tmp/")
}

/// In-memory tar.gz container writer
pub struct ContainerBuilder {
    builder: tar::Builder<GzEncoder<Vec<u8>>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        ContainerBuilder {
            builder: tar::Builder::new(encoder),
        }
    }

    /// Add a UTF-8 text document under the given entry name
    pub fn add_text(&mut self, name: &str, contents: &str) -> Result<()> {
        self.add_bytes(name, contents.as_bytes())
    }

    /// Add raw bytes under the given entry name
    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let name = sanitize_entry_name(name);
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        self.builder.append_data(&mut header, name, data)?;
        Ok(())
    }

    /// Copy an attachment file into the container, if it can be read
    ///
    /// The entry name combines the message rowid with the file's base name
    /// so same-named files from different messages never collide. Missing
    /// or unreadable source files are non-fatal: the attachment is simply
    /// omitted and the caller drops it from the message's list.
    pub fn add_attachment(
        &mut self,
        attachment: &AttachmentRef,
        prefix: &str,
        rowid: i64,
    ) -> Option<String> {
        let src = attachment.filename.as_deref()?;
        let src_path = expand_user(src);

        if !src_path.is_file() {
            // Transcoding temp files are cleaned up by the OS; their
            // absence is expected and not actionable.
            if is_transient_path(src) {
                debug!(path = src, "transient attachment missing (expected)");
            } else {
                warn!(path = src, "attachment missing");
            }
            return None;
        }

        let basename = src_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())?;
        let arc_name = sanitize_entry_name(&format!("{}/{}_{}", prefix, rowid, basename));

        match self.builder.append_path_with_name(&src_path, &arc_name) {
            Ok(()) => Some(arc_name),
            Err(e) => {
                warn!(path = src, error = %e, "could not read attachment");
                None
            }
        }
    }

    /// Finish the tar stream and return the compressed container bytes
    pub fn finish(self) -> Result<Vec<u8>> {
        let encoder = self.builder.into_inner()?;
        Ok(encoder.finish()?)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read all file entries of a container into memory
pub fn read_container(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        entries.push((name, contents));
    }

    Ok(entries)
}

/// Check one entry against path traversal and link tricks
///
/// Returns the reason the entry is unsafe, or None if it may be unpacked.
fn entry_violation(entry_type: tar::EntryType, path: &Path) -> Option<&'static str> {
    if entry_type.is_symlink() || entry_type.is_hard_link() {
        return Some("link entry");
    }
    for component in path.components() {
        match component {
            Component::ParentDir => return Some("parent directory reference"),
            Component::RootDir | Component::Prefix(_) => return Some("absolute path"),
            _ => {}
        }
    }
    None
}

/// Extract a container to a destination directory
///
/// Entries whose resolved path would escape `dest`, or whose type is a
/// symbolic or hard link, are skipped with a warning; extraction of the
/// remaining entries continues. Returns the number of entries unpacked.
pub fn extract_container(bytes: &[u8], dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest)?;

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let mut extracted = 0usize;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if let Some(reason) = entry_violation(entry.header().entry_type(), &path) {
            warn!(
                entry = %path.display(),
                reason,
                "skipping unsafe archive entry"
            );
            continue;
        }

        // unpack_in re-validates that the target stays inside dest
        if entry.unpack_in(dest)? {
            extracted += 1;
        } else {
            warn!(entry = %path.display(), "skipping unsafe archive entry");
        }
    }

    Ok(extracted)
}
