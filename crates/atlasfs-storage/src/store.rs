//! Local disk store.
//!
//! Synchronous, bounds-checked file operations under a root directory.
//! Namespace paths resolve strictly inside the root (path components never
//! contain separators, so no request can escape it). The async server
//! wraps these in blocking tasks.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use atlasfs_core::{FsError, Path};

/// A directory tree on the local filesystem, addressed by namespace paths.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Opens a store rooted at `root`, which must be an existing
    /// directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FsError> {
        let root: PathBuf = root.into();
        let metadata = fs::metadata(&root)
            .map_err(|_| FsError::NotFound(format!("storage root {}", root.display())))?;
        if !metadata.is_dir() {
            return Err(FsError::InvalidArgument(format!(
                "storage root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn local(&self, path: &Path) -> PathBuf {
        path.to_local(&self.root)
    }

    /// Resolves `path` to an existing regular file.
    fn file_for(&self, path: &Path) -> Result<PathBuf, FsError> {
        let local = self.local(path);
        let metadata =
            fs::metadata(&local).map_err(|_| FsError::NotFound(format!("no such file: {path}")))?;
        if !metadata.is_file() {
            return Err(FsError::NotFound(format!("{path} is not a regular file")));
        }
        Ok(local)
    }

    /// Size of the file at `path` in bytes.
    pub fn size(&self, path: &Path) -> Result<u64, FsError> {
        let local = self.file_for(path)?;
        Ok(fs::metadata(local)?.len())
    }

    /// Reads `length` bytes starting at `offset`. The whole range must lie
    /// within the file.
    pub fn read_at(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>, FsError> {
        let local = self.file_for(path)?;
        let size = fs::metadata(&local)?.len();
        let end = offset.checked_add(length).ok_or_else(|| {
            FsError::OutOfRange(format!("range {offset}+{length} overflows"))
        })?;
        if end > size {
            return Err(FsError::OutOfRange(format!(
                "read of {path} at {offset}+{length} passes the end ({size} bytes)"
            )));
        }

        let mut file = File::open(local)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    /// Writes `data` at `offset`, extending the file if needed.
    pub fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), FsError> {
        let local = self.file_for(path)?;
        let mut file = OpenOptions::new().write(true).open(local)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Creates an empty file at `path`, building any missing parent
    /// directories. `false` if the path already exists or is the root.
    pub fn create(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }
        let local = self.local(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&local) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the file or directory tree at `path`. `false` when nothing
    /// is there or `path` is the root.
    pub fn delete(&self, path: &Path) -> Result<bool, FsError> {
        if path.is_root() {
            return Ok(false);
        }
        let local = self.local(path);
        let Ok(metadata) = fs::symlink_metadata(&local) else {
            return Ok(false);
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&local)?;
        } else {
            fs::remove_file(&local)?;
        }
        Ok(true)
    }

    /// Removes directories left empty on the way from `path`'s parent up
    /// to (but not including) the root.
    pub fn prune_empty_dirs(&self, path: &Path) -> Result<(), FsError> {
        let mut current = path.clone();
        while let Ok(parent) = current.parent() {
            if parent.is_root() {
                break;
            }
            let local = self.local(&parent);
            let Ok(mut entries) = fs::read_dir(&local) else {
                break;
            };
            if entries.next().is_some() {
                break;
            }
            fs::remove_dir(&local)?;
            current = parent;
        }
        Ok(())
    }
}
