//! Entry metadata and download descriptors.
//!
//! Everything here is produced fresh from a filesystem stat on each call and
//! never cached.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::Metadata;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::disk::Disk;
use super::mime;
use super::path::ResolvedPath;

/// Entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or anything that is not a directory).
    File,
    /// Directory.
    Directory,
}

impl EntryKind {
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }
}

/// Descriptor of one file or directory on a disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Path relative to the disk root.
    pub relative_path: ResolvedPath,
    /// Last segment of `relative_path` (empty for the root).
    pub name: String,
    pub kind: EntryKind,
    pub mime_type: String,
    /// Only set for files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<SystemTime>,
}

impl EntryMetadata {
    /// Build metadata from a host stat.
    pub fn from_metadata(relative_path: ResolvedPath, meta: &Metadata) -> Self {
        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let name = relative_path.file_name().unwrap_or_default().to_string();
        let mime_type = mime::classify(std::path::Path::new(&name), kind.is_dir());

        Self {
            name,
            kind,
            mime_type,
            size_bytes: kind.is_file().then(|| meta.len()),
            modified_at: meta.modified().ok(),
            relative_path,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_dir()
    }

    /// Path as a plain string.
    pub fn path(&self) -> &str {
        self.relative_path.as_str()
    }
}

/// Headers-level description of a file about to be streamed to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub file_name: String,
    pub content_length: u64,
    pub last_modified: SystemTime,
    /// Quoted entity tag.
    pub etag: String,
}

impl Download {
    pub(crate) fn new(disk: &Disk, path: &ResolvedPath, meta: &Metadata) -> Self {
        let last_modified = meta.modified().unwrap_or(UNIX_EPOCH);
        Self {
            file_name: path.file_name().unwrap_or_default().to_string(),
            content_length: meta.len(),
            etag: entity_tag(disk, path, last_modified),
            last_modified,
        }
    }

    /// Whether a conditional request can be answered with "not modified".
    ///
    /// An exact ETag match wins; otherwise the file is fresh when it has not
    /// changed after `if_modified_since`, compared at whole-second precision.
    pub fn is_not_modified(
        &self,
        if_none_match: Option<&str>,
        if_modified_since: Option<SystemTime>,
    ) -> bool {
        if let Some(tags) = if_none_match {
            return tags
                .split(',')
                .map(str::trim)
                .any(|tag| tag == "*" || tag == self.etag);
        }
        match if_modified_since {
            Some(since) => unix_seconds(self.last_modified) <= unix_seconds(since),
            None => false,
        }
    }
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn entity_tag(disk: &Disk, path: &ResolvedPath, modified: SystemTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}/{}/{}", disk.id(), path, unix_seconds(modified)));
    format!("\"{:x}\"", hasher.finalize())
}
