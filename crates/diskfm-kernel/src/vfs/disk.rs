//! Disks and the disk registry.

use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::{VfsError, VfsResult};
use super::gateway::FilesystemGateway;

/// A named, root-confined region of the host filesystem.
///
/// Immutable once created. The root does not have to exist yet; operations
/// against a missing root simply report `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    id: String,
    label: String,
    root: PathBuf,
}

impl Disk {
    pub fn new(id: impl Into<String>, label: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            root: root.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display label, used in error messages as `[label]`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl fmt::Display for Disk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.label)
    }
}

/// Disks keyed by id, iterated in registration order.
#[derive(Debug, Default, Clone)]
pub struct DiskRegistry {
    disks: IndexMap<String, Arc<Disk>>,
}

impl DiskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a disk.
    ///
    /// A duplicate id replaces the earlier disk in place; uniqueness is the
    /// configuration's responsibility.
    pub fn create(
        &mut self,
        id: impl Into<String>,
        label: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Arc<Disk> {
        let disk = Arc::new(Disk::new(id, label, root));
        if let Some(previous) = self.disks.insert(disk.id.clone(), Arc::clone(&disk)) {
            tracing::debug!(id = %previous.id, "replacing registered disk");
        }
        disk
    }

    /// Look up a disk by id.
    pub fn get(&self, id: &str) -> VfsResult<Arc<Disk>> {
        self.disks
            .get(id)
            .cloned()
            .ok_or_else(|| VfsError::DiskNotFound(id.to_string()))
    }

    /// Gateway bound to the disk with the given id.
    pub fn gateway(&self, id: &str) -> VfsResult<FilesystemGateway> {
        self.get(id).map(FilesystemGateway::new)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.disks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    /// Disks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Disk>> {
        self.disks.values()
    }
}

impl<'a> IntoIterator for &'a DiskRegistry {
    type Item = &'a Arc<Disk>;
    type IntoIter = indexmap::map::Values<'a, String, Arc<Disk>>;

    fn into_iter(self) -> Self::IntoIter {
        self.disks.values()
    }
}
