//! Disk-relative path resolution.
//!
//! Every path a caller hands to the gateway goes through [`ResolvedPath::resolve`]
//! before any filesystem access. Resolution is purely lexical: empty and `.`
//! segments are dropped, `..` pops the previous segment, and a `..` with
//! nothing left to pop is a scope violation.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{Subject, VfsError, VfsResult};

/// A normalized, root-relative path.
///
/// Contains no `.` or `..` segments and no leading, trailing or duplicate
/// separators. The empty path is the disk root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResolvedPath(String);

impl ResolvedPath {
    /// The disk root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize `raw` against an implicit root.
    ///
    /// `subject` only shapes the error message.
    pub fn resolve(raw: &str, subject: Subject) -> VfsResult<Self> {
        let mut stack: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if stack.pop().is_none() {
                        return Err(VfsError::ScopeViolation(subject));
                    }
                }
                name => stack.push(name),
            }
        }
        Ok(Self(stack.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the disk root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<ResolvedPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append a single validated segment.
    pub fn join(&self, name: &str) -> VfsResult<ResolvedPath> {
        let name = validate_name(name)?;
        if self.is_root() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, name)))
        }
    }

    /// Returns true if `self` is `other` or lies somewhere below it.
    pub fn is_within(&self, other: &ResolvedPath) -> bool {
        other.is_root()
            || self.0 == other.0
            || (self.0.starts_with(&other.0) && self.0[other.0.len()..].starts_with('/'))
    }

    /// Absolute host path under `root`.
    pub fn to_host_path(&self, root: &Path) -> PathBuf {
        let mut full = root.to_path_buf();
        for segment in self.segments() {
            full.push(segment);
        }
        full
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that `name` is usable as one path segment.
pub fn validate_name(name: &str) -> VfsResult<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(name)
}
