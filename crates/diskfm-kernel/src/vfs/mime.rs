//! MIME classification for directory entries.

use std::path::Path;

/// Reported for every directory.
pub const DIRECTORY_MIME: &str = "directory";

/// Fallback for files with no recognised extension.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Classify an entry by kind and file extension.
pub fn classify(path: &Path, is_directory: bool) -> String {
    if is_directory {
        return DIRECTORY_MIME.to_string();
    }
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME)
        .to_string()
}
