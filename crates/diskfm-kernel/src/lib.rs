//! # diskfm-kernel
//!
//! Root-confined access to named regions of the host filesystem ("disks").
//!
//! A disk binds an id and a display label to a root directory. All access
//! goes through a [`FilesystemGateway`] bound to one disk, which:
//! - Normalizes caller paths and refuses anything that climbs above the root
//! - Guards existence and entry type before touching the filesystem
//! - Lists, inspects, uploads, downloads, creates, moves, copies, renames
//!   and deletes entries
//!
//! Listings come back unordered; [`sort_entries`] orders them by path, size
//! or MIME type.

pub mod audit;
pub mod config;
pub mod vfs;

pub use audit::{Actor, AuditRecord};
pub use config::{ConfigError, DiskConfig, DisksConfig};
pub use vfs::{
    Disk, DiskRegistry, Download, EntryKind, EntryMetadata, ErrorKind, FilesystemGateway, Listing,
    ResolvedPath, SortDirection, SortKey, SortOrder, Subject, VfsError, VfsResult, sort_entries,
};
