//! Host filesystem access bound to one disk.
//!
//! Every entry point resolves its path arguments first, then applies its
//! guards in a fixed order:
//!
//! 1. lexical resolution (`ScopeViolation`), for all path arguments before
//!    any I/O, then symlink containment (`ScopeViolation`)
//! 2. existence (`NotFound`)
//! 3. type (`NotADirectory` / `IsADirectory`), only once existence is known
//!
//! Which error a malformed call reports depends on that order, so it is part
//! of the contract.
//!
//! Nothing here is atomic. Recursive delete and recursive copy stop at the
//! first failure and leave whatever was already done in place; concurrent
//! callers see whatever interleaving the host filesystem gives them.

use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audit::{Actor, AuditRecord};

use super::disk::Disk;
use super::error::{Subject, VfsError, VfsResult};
use super::path::{ResolvedPath, validate_name};
use super::sort::{SortOrder, sort_entries};
use super::types::{Download, EntryMetadata};

/// Filesystem operations scoped to a single [`Disk`].
///
/// Cheap to construct; build one per request.
#[derive(Debug, Clone)]
pub struct FilesystemGateway {
    disk: Arc<Disk>,
    actor: Actor,
}

impl FilesystemGateway {
    pub fn new(disk: Arc<Disk>) -> Self {
        Self {
            disk,
            actor: Actor::Anonymous,
        }
    }

    /// Attribute mutations to `actor` in the audit trail.
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Check whether a path exists.
    pub fn exists(&self, raw: &str) -> VfsResult<bool> {
        let path = self.resolve(raw, Subject::File)?;
        Ok(self.host(&path).exists())
    }

    /// Check whether a path is an existing directory.
    pub fn is_directory(&self, raw: &str) -> VfsResult<bool> {
        let path = self.resolve(raw, Subject::File)?;
        Ok(self.host(&path).is_dir())
    }

    /// Metadata of a single entry.
    pub fn get_info(&self, raw: &str) -> VfsResult<EntryMetadata> {
        let path = self.resolve(raw, Subject::File)?;
        let meta = self.ensure_exists(&path, Subject::File)?;
        Ok(EntryMetadata::from_metadata(path, &meta))
    }

    /// Immediate children of a directory, in host order.
    ///
    /// The listing reads the directory lazily; call again to re-read it.
    pub fn list_directory(&self, raw: &str) -> VfsResult<Listing> {
        let path = self.resolve(raw, Subject::Directory)?;
        let meta = self.ensure_exists(&path, Subject::Directory)?;
        self.ensure_directory(&path, &meta)?;

        let inner = fs::read_dir(self.host(&path)).map_err(|e| self.io_error(&path, e))?;
        tracing::debug!(disk = %self.disk.id(), path = %path, "listing directory");
        Ok(Listing {
            disk: Arc::clone(&self.disk),
            root: dunce::canonicalize(self.disk.root()).ok(),
            dir: path,
            inner,
        })
    }

    /// [`list_directory`](Self::list_directory), collected and sorted.
    pub fn list_sorted(&self, raw: &str, order: SortOrder) -> VfsResult<Vec<EntryMetadata>> {
        let entries = self.list_directory(raw)?.collect::<VfsResult<Vec<_>>>()?;
        Ok(sort_entries(entries, order))
    }

    /// Only the subdirectories of a directory, sorted.
    pub fn list_directories(&self, raw: &str, order: SortOrder) -> VfsResult<Vec<EntryMetadata>> {
        let mut entries = Vec::new();
        for entry in self.list_directory(raw)? {
            let entry = entry?;
            if entry.is_directory() {
                entries.push(entry);
            }
        }
        Ok(sort_entries(entries, order))
    }

    /// Open a file for streaming, along with its download descriptor.
    pub fn open_file(&self, raw: &str) -> VfsResult<(Download, File)> {
        let path = self.resolve(raw, Subject::File)?;
        let meta = self.ensure_exists(&path, Subject::File)?;
        if meta.is_dir() {
            return Err(VfsError::is_a_directory(self.disk.label(), path.as_str()));
        }

        let file = File::open(self.host(&path)).map_err(|e| self.io_error(&path, e))?;
        Ok((Download::new(&self.disk, &path, &meta), file))
    }

    /// Read an entire file.
    pub fn read_file(&self, raw: &str) -> VfsResult<Vec<u8>> {
        let (download, mut file) = self.open_file(raw)?;
        let mut data = Vec::with_capacity(download.content_length as usize);
        if let Err(e) = file.read_to_end(&mut data) {
            let path = ResolvedPath::resolve(raw, Subject::File)?;
            return Err(self.io_error(&path, e));
        }
        Ok(data)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    /// Create a directory along with any missing ancestors.
    pub fn create_directory(&self, raw: &str) -> VfsResult<EntryMetadata> {
        let path = self.resolve(raw, Subject::File)?;
        let root = ResolvedPath::root();
        let meta = self.ensure_exists(&root, Subject::File)?;
        self.ensure_directory(&root, &meta)?;

        let host = self.host(&path);
        if fs::symlink_metadata(&host).is_ok() {
            return Err(VfsError::already_exists(
                Subject::Directory,
                self.disk.label(),
                path.as_str(),
            ));
        }
        self.ensure_ancestors_are_directories(&path)?;

        fs::create_dir_all(&host).map_err(|e| self.io_error(&path, e))?;
        self.audit(format!("Directory \"{path}\" created"));
        self.get_info(path.as_str())
    }

    /// Store `reader`'s contents as `file_name` inside an existing directory.
    ///
    /// An existing file of that name is replaced.
    pub fn upload(
        &self,
        raw_dir: &str,
        file_name: &str,
        reader: &mut impl Read,
    ) -> VfsResult<EntryMetadata> {
        let dir = self.resolve(raw_dir, Subject::File)?;
        let meta = self.ensure_exists(&dir, Subject::File)?;
        self.ensure_directory(&dir, &meta)?;

        let target = dir.join(file_name)?;
        self.confine(&target, Subject::File)?;
        let host = self.host(&target);
        if host.is_dir() {
            return Err(VfsError::is_a_directory(self.disk.label(), target.as_str()));
        }
        // Replace a link in place rather than writing through it.
        if fs::symlink_metadata(&host).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&host).map_err(|e| self.io_error(&target, e))?;
        }

        let mut file = File::create(&host).map_err(|e| self.io_error(&target, e))?;
        io::copy(reader, &mut file).map_err(|e| self.io_error(&target, e))?;
        self.audit(format!("File \"{target}\" uploaded"));
        self.get_info(target.as_str())
    }

    /// Remove a file, or a directory with everything below it.
    ///
    /// A symbolic link is removed itself, never its target.
    pub fn delete(&self, raw: &str) -> VfsResult<()> {
        let path = self.resolve_entry(raw, Subject::File)?;
        let is_dir = self.ensure_present(&path, Subject::File)?.is_dir();
        if path.is_root() {
            return Err(self.root_error());
        }

        let host = self.host(&path);
        let result = if is_dir {
            fs::remove_dir_all(&host)
        } else {
            fs::remove_file(&host)
        };
        if let Err(e) = result {
            if is_dir {
                tracing::warn!(
                    disk = %self.disk.id(),
                    path = %path,
                    error = %e,
                    "recursive delete failed part way; subtree may be partially removed"
                );
            }
            return Err(self.io_error(&path, e));
        }

        self.audit(format!("File \"{path}\" deleted"));
        Ok(())
    }

    /// Move an entry.
    ///
    /// If `destination` is an existing directory the source lands inside it
    /// under its own name; otherwise it is relocated to exactly `destination`.
    pub fn move_entry(&self, source: &str, destination: &str) -> VfsResult<EntryMetadata> {
        let (source, target) = self.plan_transfer(source, destination)?;
        let from = self.host(&source);
        let to = self.host(&target);

        match fs::rename(&from, &to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(path = %source, "rename crosses devices, copying instead");
                copy_tree(&from, &to).map_err(|e| self.io_error(&target, e))?;
                let removed = if from.is_dir() {
                    fs::remove_dir_all(&from)
                } else {
                    fs::remove_file(&from)
                };
                removed.map_err(|e| self.io_error(&source, e))?;
            }
            Err(e) => return Err(self.io_error(&target, e)),
        }

        self.audit(format!("File \"{source}\" moved to \"{target}\""));
        self.get_info(target.as_str())
    }

    /// Copy an entry, recursively for directories.
    ///
    /// Same destination rules as [`move_entry`](Self::move_entry); the source
    /// is left untouched. Symbolic links inside a copied tree are skipped.
    pub fn copy(&self, source: &str, destination: &str) -> VfsResult<EntryMetadata> {
        let (source, target) = self.plan_transfer(source, destination)?;

        if let Err(e) = copy_tree(&self.host(&source), &self.host(&target)) {
            tracing::warn!(
                disk = %self.disk.id(),
                path = %target,
                error = %e,
                "copy failed part way; destination may be incomplete"
            );
            return Err(self.io_error(&target, e));
        }

        self.audit(format!("File \"{source}\" copied to \"{target}\""));
        self.get_info(target.as_str())
    }

    /// Give an entry a new name in the same directory.
    ///
    /// Refuses to overwrite an existing entry. A symbolic link is renamed
    /// itself.
    pub fn rename(&self, source: &str, new_name: &str) -> VfsResult<EntryMetadata> {
        let source = self.resolve_entry(source, Subject::File)?;
        self.ensure_present(&source, Subject::File)?;
        let Some(parent) = source.parent() else {
            return Err(self.root_error());
        };

        let target = parent.join(new_name)?;
        let to = self.host(&target);
        if fs::symlink_metadata(&to).is_ok() {
            return Err(VfsError::already_exists(
                Subject::File,
                self.disk.label(),
                target.as_str(),
            ));
        }

        fs::rename(self.host(&source), &to).map_err(|e| self.io_error(&target, e))?;
        self.audit(format!("File \"{source}\" renamed to \"{new_name}\""));
        self.describe(&target)
    }

    // ========================================================================
    // Guards
    // ========================================================================

    fn resolve(&self, raw: &str, subject: Subject) -> VfsResult<ResolvedPath> {
        let path = ResolvedPath::resolve(raw, subject)?;
        self.confine(&path, subject)?;
        Ok(path)
    }

    /// Like [`resolve`](Self::resolve), but for operations that act on the
    /// entry itself: only the containing directory must stay inside the root,
    /// so a link at the last segment may point anywhere.
    fn resolve_entry(&self, raw: &str, subject: Subject) -> VfsResult<ResolvedPath> {
        let path = ResolvedPath::resolve(raw, subject)?;
        let parent = path.parent().unwrap_or_default();
        self.confine(&parent, subject)?;
        Ok(path)
    }

    /// Reject paths whose deepest existing ancestor resolves outside the root
    /// through a symlink.
    ///
    /// Skipped when the root itself cannot be canonicalized, so a missing
    /// root reports `NotFound` from the existence guard instead.
    fn confine(&self, path: &ResolvedPath, subject: Subject) -> VfsResult<()> {
        let Ok(root) = dunce::canonicalize(self.disk.root()) else {
            return Ok(());
        };

        let full = self.host(path);
        let depth = path.segments().count();
        for ancestor in full.ancestors().take(depth + 1) {
            if let Ok(canonical) = dunce::canonicalize(ancestor) {
                if !canonical.starts_with(&root) {
                    tracing::debug!(
                        disk = %self.disk.id(),
                        path = %path,
                        resolved = %canonical.display(),
                        "path escapes disk root"
                    );
                    return Err(VfsError::ScopeViolation(subject));
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn ensure_exists(&self, path: &ResolvedPath, subject: Subject) -> VfsResult<Metadata> {
        fs::metadata(self.host(path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                VfsError::not_found(subject, self.disk.label(), path.as_str())
            }
            _ => self.io_error(path, e),
        })
    }

    /// Existence of the entry itself, without following a final symlink.
    fn ensure_present(&self, path: &ResolvedPath, subject: Subject) -> VfsResult<Metadata> {
        fs::symlink_metadata(self.host(path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                VfsError::not_found(subject, self.disk.label(), path.as_str())
            }
            _ => self.io_error(path, e),
        })
    }

    fn ensure_directory(&self, path: &ResolvedPath, meta: &Metadata) -> VfsResult<()> {
        if meta.is_dir() {
            Ok(())
        } else {
            Err(VfsError::not_a_directory(self.disk.label(), path.as_str()))
        }
    }

    /// The nearest existing ancestor of `path` must be a directory.
    fn ensure_ancestors_are_directories(&self, path: &ResolvedPath) -> VfsResult<()> {
        let mut current = path.parent();
        while let Some(ancestor) = current {
            if let Ok(meta) = fs::metadata(self.host(&ancestor)) {
                return self.ensure_directory(&ancestor, &meta);
            }
            current = ancestor.parent();
        }
        Ok(())
    }

    /// Resolve and guard both sides of a move or copy.
    ///
    /// Returns the source and the exact path it ends up at.
    fn plan_transfer(
        &self,
        source: &str,
        destination: &str,
    ) -> VfsResult<(ResolvedPath, ResolvedPath)> {
        let source = ResolvedPath::resolve(source, Subject::File)?;
        let destination = ResolvedPath::resolve(destination, Subject::File)?;
        self.confine(&source, Subject::File)?;
        self.confine(&destination, Subject::File)?;

        self.ensure_exists(&source, Subject::File)?;
        if source.is_root() {
            return Err(self.root_error());
        }

        let target = match fs::metadata(self.host(&destination)) {
            Ok(meta) if meta.is_dir() => match source.file_name() {
                Some(name) => destination.join(name)?,
                None => return Err(self.root_error()),
            },
            Ok(_) => {
                return Err(VfsError::not_a_directory(
                    self.disk.label(),
                    destination.as_str(),
                ));
            }
            Err(_) => {
                let parent = destination.parent().unwrap_or_default();
                let meta = self.ensure_exists(&parent, Subject::File)?;
                self.ensure_directory(&parent, &meta)?;
                destination
            }
        };

        if target.is_within(&source) {
            return Err(VfsError::nested_destination(
                self.disk.label(),
                target.as_str(),
            ));
        }
        if fs::symlink_metadata(self.host(&target)).is_ok() {
            return Err(VfsError::already_exists(
                Subject::File,
                self.disk.label(),
                target.as_str(),
            ));
        }
        Ok((source, target))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn host(&self, path: &ResolvedPath) -> PathBuf {
        path.to_host_path(self.disk.root())
    }

    /// Metadata of an entry that may be a symbolic link leading outside the root.
    fn describe(&self, path: &ResolvedPath) -> VfsResult<EntryMetadata> {
        let root = dunce::canonicalize(self.disk.root()).ok();
        let meta = stat_confined(&self.host(path), root.as_deref())
            .map_err(|e| self.io_error(path, e))?;
        Ok(EntryMetadata::from_metadata(path.clone(), &meta))
    }

    fn io_error(&self, path: &ResolvedPath, e: io::Error) -> VfsError {
        VfsError::io(self.disk.label(), path.as_str(), e)
    }

    fn root_error(&self) -> VfsError {
        VfsError::DiskRoot {
            label: self.disk.label().to_string(),
        }
    }

    fn audit(&self, message: String) {
        AuditRecord {
            scope: self.disk.root(),
            message,
            actor: &self.actor,
        }
        .emit();
    }
}

/// Lazily-read children of one directory.
#[derive(Debug)]
pub struct Listing {
    disk: Arc<Disk>,
    /// Canonical disk root, for deciding which links to follow.
    root: Option<PathBuf>,
    dir: ResolvedPath,
    inner: fs::ReadDir,
}

impl Listing {
    /// The directory being listed.
    pub fn directory(&self) -> &ResolvedPath {
        &self.dir
    }
}

impl Iterator for Listing {
    type Item = VfsResult<EntryMetadata>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.inner.next()? {
            Ok(entry) => entry,
            Err(e) => return Some(Err(VfsError::io(self.disk.label(), self.dir.as_str(), e))),
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = match self.dir.join(&name) {
            Ok(path) => path,
            Err(e) => return Some(Err(e)),
        };

        let meta = stat_confined(&entry.path(), self.root.as_deref());
        Some(
            meta.map(|meta| EntryMetadata::from_metadata(path.clone(), &meta))
                .map_err(|e| VfsError::io(self.disk.label(), path.as_str(), e)),
        )
    }
}

/// Stat `host`, following a symlink only when its target exists and stays
/// under `root`. Anything else reports the link itself.
fn stat_confined(host: &Path, root: Option<&Path>) -> io::Result<Metadata> {
    let link = fs::symlink_metadata(host)?;
    if !link.file_type().is_symlink() {
        return Ok(link);
    }
    match (dunce::canonicalize(host), root) {
        (Ok(target), Some(root)) if target.starts_with(root) => fs::metadata(host),
        _ => Ok(link),
    }
}

/// Recursively copy `from` to `to`, which must not exist yet.
fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from)?;
    if !meta.is_dir() {
        fs::copy(from, to)?;
        return Ok(());
    }

    fs::create_dir(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_type()?.is_symlink() {
            tracing::warn!(path = %entry.path().display(), "skipping symlink during copy");
            continue;
        }
        copy_tree(&entry.path(), &to.join(entry.file_name()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::error::ErrorKind;
    use crate::vfs::sort::{SortDirection, SortKey};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn setup() -> (FilesystemGateway, TempDir) {
        let dir = TempDir::new().unwrap();
        let disk = Arc::new(Disk::new("id", "Test", dir.path()));
        (FilesystemGateway::new(disk), dir)
    }

    #[test]
    fn test_exists_and_is_directory() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"x").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();

        assert!(gw.exists("foo").unwrap());
        assert!(!gw.exists("nope").unwrap());
        assert!(gw.is_directory("bar").unwrap());
        assert!(!gw.is_directory("foo").unwrap());
        assert!(!gw.is_directory("nope").unwrap());
        assert!(gw.exists("/foo/../../x").is_err());
    }

    #[test]
    fn test_get_info() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let info = gw.get_info("//a.txt").unwrap();
        assert_eq!(info.path(), "a.txt");
        assert_eq!(info.size_bytes, Some(5));

        let err = gw.get_info("missing").unwrap_err();
        assert_eq!(err.to_string(), "File \"[Test]/missing\" does not exist.");
    }

    #[test]
    fn test_listing_is_recomputed() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("one"), b"1").unwrap();
        assert_eq!(gw.list_directory("").unwrap().count(), 1);

        fs::write(dir.path().join("two"), b"2").unwrap();
        assert_eq!(gw.list_directory("").unwrap().count(), 2);
    }

    #[test]
    fn test_listing_is_one_level() {
        let (gw, dir) = setup();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/b/c/deep"), b"").unwrap();

        let entries = gw.list_sorted("a", SortOrder::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), "a/b");
    }

    #[test]
    fn test_list_directories_only() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();
        fs::create_dir(dir.path().join("baz")).unwrap();

        let order = SortOrder::new(SortKey::Path, SortDirection::Descending);
        let dirs = gw.list_directories("", order).unwrap();
        let names: Vec<_> = dirs.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["baz", "bar"]);
    }

    #[test]
    fn test_create_directory_deep() {
        let (gw, dir) = setup();
        let info = gw.create_directory("x/y/z").unwrap();
        assert!(info.is_directory());
        assert!(dir.path().join("x/y/z").is_dir());

        let err = gw.create_directory("x/y").unwrap_err();
        assert_eq!(err.to_string(), "Directory \"[Test]/x/y\" already exists.");
    }

    #[test]
    fn test_create_directory_under_file() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();

        let err = gw.create_directory("foo/sub/deeper").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotADirectory);
        assert_eq!(err.to_string(), "\"[Test]/foo\" is not a directory.");
    }

    #[test]
    fn test_create_directory_over_file() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();
        let err = gw.create_directory("foo").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_delete_file_and_tree() {
        let (gw, dir) = setup();
        fs::create_dir_all(dir.path().join("bar/sub")).unwrap();
        fs::write(dir.path().join("bar/test"), b"").unwrap();
        fs::write(dir.path().join("bar/sub/x"), b"").unwrap();

        gw.delete("//./bar/.././//bar/test").unwrap();
        assert!(!dir.path().join("bar/test").exists());

        gw.delete("bar").unwrap();
        assert!(!dir.path().join("bar").exists());

        let err = gw.delete("bar").unwrap_err();
        assert_eq!(err.to_string(), "File \"[Test]/bar\" does not exist.");
    }

    #[test]
    fn test_delete_root_refused() {
        let (gw, dir) = setup();
        assert!(matches!(gw.delete("/./"), Err(VfsError::DiskRoot { .. })));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_move_into_directory() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"data").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();

        let info = gw.move_entry("//./foo/.././//foo", "bar").unwrap();
        assert_eq!(info.path(), "bar/foo");
        assert!(!dir.path().join("foo").exists());
        assert!(dir.path().join("bar/foo").exists());
    }

    #[test]
    fn test_move_to_new_path() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"data").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();

        gw.move_entry("foo", "bar/renamed").unwrap();
        assert_eq!(fs::read(dir.path().join("bar/renamed")).unwrap(), b"data");
    }

    #[test]
    fn test_move_missing_parent() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();

        let err = gw.move_entry("foo", "nowhere/x").unwrap_err();
        assert_eq!(err.to_string(), "File \"[Test]/nowhere\" does not exist.");
    }

    #[test]
    fn test_move_into_itself() {
        let (gw, dir) = setup();
        fs::create_dir_all(dir.path().join("bar/inner")).unwrap();

        let err = gw.move_entry("bar", "bar/inner").unwrap_err();
        assert!(matches!(err, VfsError::NestedDestination { .. }));
        let err = gw.copy("bar", "bar").unwrap_err();
        assert!(matches!(err, VfsError::NestedDestination { .. }));
        assert!(dir.path().join("bar/inner").is_dir());
    }

    #[test]
    fn test_move_does_not_overwrite() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"new").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();
        fs::write(dir.path().join("bar/foo"), b"old").unwrap();

        let err = gw.move_entry("foo", "bar").unwrap_err();
        assert_eq!(err.to_string(), "File \"[Test]/bar/foo\" already exists.");
        assert_eq!(fs::read(dir.path().join("bar/foo")).unwrap(), b"old");
    }

    #[test]
    fn test_copy_tree() {
        let (gw, dir) = setup();
        fs::create_dir_all(dir.path().join("foo/nested")).unwrap();
        fs::write(dir.path().join("foo/baz"), b"1").unwrap();
        fs::write(dir.path().join("foo/nested/q"), b"2").unwrap();
        fs::create_dir(dir.path().join("bar")).unwrap();

        let info = gw.copy("foo", "bar").unwrap();
        assert_eq!(info.path(), "bar/foo");
        assert_eq!(fs::read(dir.path().join("bar/foo/baz")).unwrap(), b"1");
        assert_eq!(fs::read(dir.path().join("bar/foo/nested/q")).unwrap(), b"2");
        assert!(dir.path().join("foo/nested/q").exists());
    }

    #[test]
    fn test_rename() {
        let (gw, dir) = setup();
        fs::create_dir(dir.path().join("bar")).unwrap();
        fs::write(dir.path().join("bar/old"), b"x").unwrap();

        let info = gw.rename("bar/old", "new").unwrap();
        assert_eq!(info.path(), "bar/new");
        assert!(!dir.path().join("bar/old").exists());
        assert!(dir.path().join("bar/new").exists());
    }

    #[test]
    fn test_rename_invalid_name() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();

        for name in ["", ".", "..", "a/b"] {
            let err = gw.rename("foo", name).unwrap_err();
            assert!(matches!(err, VfsError::InvalidName(_)), "{name:?}");
        }
        assert!(matches!(gw.rename("", "x"), Err(VfsError::DiskRoot { .. })));
    }

    #[test]
    fn test_open_and_read_file() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"bar").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let (download, _file) = gw.open_file("//./bar/.././//foo").unwrap();
        assert_eq!(download.file_name, "foo");
        assert_eq!(download.content_length, 3);
        assert_eq!(gw.read_file("foo").unwrap(), b"bar");

        let err = gw.open_file("sub").unwrap_err();
        assert_eq!(err.to_string(), "\"[Test]/sub\" is a directory.");
    }

    #[test]
    fn test_upload() {
        let (gw, dir) = setup();
        fs::create_dir(dir.path().join("bar")).unwrap();
        fs::write(dir.path().join("foo"), b"").unwrap();

        let info = gw.upload("bar", "up.txt", &mut &b"payload"[..]).unwrap();
        assert_eq!(info.path(), "bar/up.txt");
        assert_eq!(info.size_bytes, Some(7));

        // replaces an existing file
        gw.upload("bar", "up.txt", &mut &b"v2"[..]).unwrap();
        assert_eq!(fs::read(dir.path().join("bar/up.txt")).unwrap(), b"v2");

        let err = gw.upload("foo", "x", &mut &b""[..]).unwrap_err();
        assert_eq!(err.to_string(), "\"[Test]/foo\" is not a directory.");
        let err = gw.upload("", "bar", &mut &b""[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IsADirectory);
        let err = gw.upload("", "../x", &mut &b""[..]).unwrap_err();
        assert!(matches!(err, VfsError::InvalidName(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_blocked() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), b"s").unwrap();

        let (gw, dir) = setup();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = gw.get_info("link/secret").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeViolation);
        assert!(gw.list_directory("link").is_err());
        assert!(gw.create_directory("link/new").is_err());
        assert!(!outside.path().join("new").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_skips_symlinks() {
        let (gw, dir) = setup();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/real"), b"r").unwrap();
        std::os::unix::fs::symlink("/etc", dir.path().join("src/etc")).unwrap();

        gw.copy("src", "dst").unwrap();
        assert!(dir.path().join("dst/real").exists());
        assert!(fs::symlink_metadata(dir.path().join("dst/etc")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_upload_never_writes_through_symlink() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("victim"), b"ORIGINAL").unwrap();

        let (gw, dir) = setup();
        std::os::unix::fs::symlink(outside.path().join("victim"), dir.path().join("link"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("absent"), dir.path().join("dangling"))
            .unwrap();

        let err = gw.upload("", "link", &mut &b"PWNED"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeViolation);
        assert_eq!(fs::read(outside.path().join("victim")).unwrap(), b"ORIGINAL");

        // a dangling link is replaced by a regular file
        gw.upload("", "dangling", &mut &b"data"[..]).unwrap();
        assert!(!outside.path().join("absent").exists());
        let meta = fs::symlink_metadata(dir.path().join("dangling")).unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(fs::read(dir.path().join("dangling")).unwrap(), b"data");
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_follows_only_contained_links() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), vec![0u8; 12345]).unwrap();

        let (gw, dir) = setup();
        fs::write(dir.path().join("real"), b"abc").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("link"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let entries = gw.list_sorted("", SortOrder::default()).unwrap();
        let link = entries.iter().find(|e| e.path() == "link").unwrap();
        let link_len = fs::symlink_metadata(dir.path().join("link")).unwrap().len();
        assert_eq!(link.size_bytes, Some(link_len));
        assert_ne!(link.size_bytes, Some(12345));

        let alias = entries.iter().find(|e| e.path() == "alias").unwrap();
        assert_eq!(alias.size_bytes, Some(3));

        let err = gw.get_info("link").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeViolation);
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_and_rename_act_on_links() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("keep"), b"k").unwrap();

        let (gw, dir) = setup();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();

        let listed = gw.list_sorted("", SortOrder::default()).unwrap();
        assert!(listed.iter().any(|e| e.path() == "dangling"));

        let info = gw.rename("dangling", "renamed").unwrap();
        assert_eq!(info.path(), "renamed");
        assert!(!info.is_directory());
        gw.delete("renamed").unwrap();
        assert!(fs::symlink_metadata(dir.path().join("renamed")).is_err());

        gw.rename("out", "elsewhere").unwrap();
        gw.delete("elsewhere").unwrap();
        assert!(fs::symlink_metadata(dir.path().join("elsewhere")).is_err());
        assert_eq!(fs::read(outside.path().join("keep")).unwrap(), b"k");

        // the link's parent is still confined
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();
        let err = gw.delete("out/keep").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScopeViolation);
        assert!(outside.path().join("keep").exists());
    }

    // ========================================================================
    // Audit trail
    // ========================================================================

    /// Records the message of every `diskfm::audit` event.
    struct AuditCapture(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for AuditCapture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if event.metadata().target() != "diskfm::audit" {
                return;
            }
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    #[derive(Default)]
    struct MessageVisitor(String);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    fn audit_lines(f: impl FnOnce()) -> Vec<String> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(AuditCapture(Arc::clone(&lines)));
        tracing::subscriber::with_default(subscriber, f);
        let captured = lines.lock().unwrap().clone();
        captured
    }

    #[test]
    fn test_mutations_are_audited() {
        let (gw, _dir) = setup();
        let gw = gw.with_actor(Actor::user("amy"));
        assert_eq!(gw.actor(), &Actor::user("amy"));

        let lines = audit_lines(|| {
            gw.create_directory("made").unwrap();
            gw.upload("made", "f.txt", &mut &b"x"[..]).unwrap();
            gw.copy("made/f.txt", "made/g.txt").unwrap();
            gw.move_entry("made/g.txt", "h.txt").unwrap();
            gw.rename("h.txt", "i.txt").unwrap();
            gw.delete("made").unwrap();
            // failures and reads are not audited
            assert!(gw.delete("made").is_err());
            gw.get_info("i.txt").unwrap();
        });

        assert_eq!(
            lines,
            [
                "Directory \"made\" created by user \"amy\".",
                "File \"made/f.txt\" uploaded by user \"amy\".",
                "File \"made/f.txt\" copied to \"made/g.txt\" by user \"amy\".",
                "File \"made/g.txt\" moved to \"h.txt\" by user \"amy\".",
                "File \"h.txt\" renamed to \"i.txt\" by user \"amy\".",
                "File \"made\" deleted by user \"amy\".",
            ]
        );
    }

    #[test]
    fn test_anonymous_audit() {
        let (gw, dir) = setup();
        fs::write(dir.path().join("foo"), b"").unwrap();

        let lines = audit_lines(|| gw.delete("foo").unwrap());
        assert_eq!(lines, ["File \"foo\" deleted by user ~anonymous."]);
    }
}
