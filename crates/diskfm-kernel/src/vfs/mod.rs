//! Disk-scoped virtual filesystem.
//!
//! Key components:
//!
//! - [`ResolvedPath`] - Lexical normalization with scope enforcement
//! - [`Disk`] / [`DiskRegistry`] - Named roots, in registration order
//! - [`FilesystemGateway`] - Guarded reads and mutations on one disk
//! - [`EntryMetadata`] - What a listing or stat returns
//! - [`SortOrder`] - Key + direction for ordering listings
//!
//! ## Design Decisions
//!
//! - **Lexical first**: `..` handling happens on strings before any I/O, so a
//!   path that climbs above the root fails the same way whether or not the
//!   disk exists.
//! - **Synchronous**: each call blocks on the host filesystem; scheduling is
//!   the caller's business.
//! - **No caching**: metadata is re-read on every call.

mod disk;
mod error;
mod gateway;
pub mod mime;
mod path;
mod sort;
mod types;

pub use disk::{Disk, DiskRegistry};
pub use error::{ErrorKind, Subject, VfsError, VfsResult};
pub use gateway::{FilesystemGateway, Listing};
pub use path::{ResolvedPath, validate_name};
pub use sort::{SortDirection, SortKey, SortOrder, sort_entries};
pub use types::{Download, EntryKind, EntryMetadata};
