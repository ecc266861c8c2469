//! Disk filesystem error types.
//!
//! Messages embed the disk label and the disk-relative path as
//! `"[Label]/path"`. The wording is what callers show to users, so it is kept
//! stable and asserted verbatim by tests.

use std::fmt;
use std::io;
use thiserror::Error;

/// Noun that opens a message: what the failing operation was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    File,
    Directory,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::File => f.write_str("File"),
            Subject::Directory => f.write_str("Directory"),
        }
    }
}

/// Coarse classification of a [`VfsError`] for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ScopeViolation,
    NotFound,
    NotADirectory,
    IsADirectory,
    AlreadyExists,
    InvalidInput,
    Io,
}

/// Disk filesystem error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path normalization would climb above the disk root, or a symlink
    /// leads outside of it.
    #[error("{0} path contains invalid reference that exceeds disk scope.")]
    ScopeViolation(Subject),

    /// Target path is absent.
    #[error("{subject} \"[{label}]/{path}\" does not exist.")]
    NotFound {
        subject: Subject,
        label: String,
        path: String,
    },

    /// Expected a directory.
    #[error("\"[{label}]/{path}\" is not a directory.")]
    NotADirectory { label: String, path: String },

    /// Expected a file.
    #[error("\"[{label}]/{path}\" is a directory.")]
    IsADirectory { label: String, path: String },

    /// Create or rename target is occupied.
    #[error("{subject} \"[{label}]/{path}\" already exists.")]
    AlreadyExists {
        subject: Subject,
        label: String,
        path: String,
    },

    /// No disk registered under this id.
    #[error("Disk \"{0}\" does not exist.")]
    DiskNotFound(String),

    /// Name is not a single path segment.
    #[error("\"{0}\" is not a valid file name.")]
    InvalidName(String),

    /// Move/copy destination lies inside the source.
    #[error("\"[{label}]/{path}\" cannot be moved or copied into itself.")]
    NestedDestination { label: String, path: String },

    /// The disk root cannot be removed or relocated.
    #[error("\"[{label}]/\" is the disk root.")]
    DiskRoot { label: String },

    /// Underlying I/O failure.
    #[error("I/O error on \"[{label}]/{path}\": {source}")]
    Io {
        label: String,
        path: String,
        #[source]
        source: io::Error,
    },
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(subject: Subject, label: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotFound {
            subject,
            label: label.into(),
            path: path.into(),
        }
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotADirectory {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self::IsADirectory {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(
        subject: Subject,
        label: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            subject,
            label: label.into(),
            path: path.into(),
        }
    }

    /// Create a NestedDestination error.
    pub fn nested_destination(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NestedDestination {
            label: label.into(),
            path: path.into(),
        }
    }

    /// Create an Io error.
    pub fn io(label: impl Into<String>, path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            label: label.into(),
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::ScopeViolation(_) => ErrorKind::ScopeViolation,
            VfsError::NotFound { .. } | VfsError::DiskNotFound(_) => ErrorKind::NotFound,
            VfsError::NotADirectory { .. } => ErrorKind::NotADirectory,
            VfsError::IsADirectory { .. } => ErrorKind::IsADirectory,
            VfsError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            VfsError::InvalidName(_)
            | VfsError::NestedDestination { .. }
            | VfsError::DiskRoot { .. } => ErrorKind::InvalidInput,
            VfsError::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let msg = e.to_string();
        match e {
            VfsError::ScopeViolation(_) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::NotFound { .. } | VfsError::DiskNotFound(_) => {
                io::Error::new(io::ErrorKind::NotFound, msg)
            }
            VfsError::NotADirectory { .. } => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory { .. } => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::AlreadyExists { .. } => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            VfsError::InvalidName(_)
            | VfsError::NestedDestination { .. }
            | VfsError::DiskRoot { .. } => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Io { source, .. } => source,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
