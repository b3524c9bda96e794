//! Exclusive run lock for mutating commands.
//!
//! The lock is an `flock(LOCK_EX)` on a file that also records the holder's
//! PID. The kernel drops the lock when the holder exits, so a lock file that
//! nobody holds is stale and may be removed.
//!
//! Releasing never unlinks the file: a run blocked on the old inode would
//! otherwise lock it while a newcomer locks a fresh file at the same path.
//! Only `remove_stale` unlinks, and only while it holds the lock itself;
//! `acquire` re-checks that the locked inode is still the one at the path.

use fs2::FileExt;
use log::{debug, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Lock file name inside the cache directory.
pub const LOCK_FILE_NAME: &str = "pkgfeed.lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{path:?} is held by another run (pid {})", pid_label(.holder))]
    Held { path: PathBuf, holder: Option<u32> },

    #[error("lock file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn pid_label(holder: &Option<u32>) -> String {
    holder.map_or_else(|| "unknown".to_string(), |p| p.to_string())
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> LockError + '_ {
    move |source| LockError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A held run lock; released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock without waiting, failing if another run holds it.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error(path))?;
        }

        let mut file = loop {
            let file = Self::lock_file(path)?;
            if is_linked_at(&file, path) {
                break file;
            }
            // Unlinked by `remove_stale` between our open and our lock
            debug!("Lock file {:?} was replaced, retrying", path);
        };

        file.set_len(0).map_err(io_error(path))?;
        write!(file, "{}", std::process::id()).map_err(io_error(path))?;
        file.flush().map_err(io_error(path))?;

        info!("Acquired run lock {:?}", path);
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open the file at `path` and lock it, without truncating: the holder's
    /// PID must survive a failed attempt.
    fn lock_file(path: &Path) -> Result<File, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_error(path))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(LockError::Held {
                path: path.to_path_buf(),
                holder: Self::holder_pid(path),
            }),
            Err(e) => Err(io_error(path)(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some process currently holds the lock at `path`.
    pub fn is_held(path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    /// PID recorded in the lock file, if readable.
    pub fn holder_pid(path: &Path) -> Option<u32> {
        fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    /// Remove a lock file left behind by a run that no longer exists.
    ///
    /// The file is locked before it is unlinked, so a live run is never
    /// robbed of its lock. Returns `Ok(false)` when there is no lock file.
    pub fn remove_stale(path: &Path) -> Result<bool, LockError> {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_error(path)(e)),
        };

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                return Err(LockError::Held {
                    path: path.to_path_buf(),
                    holder: Self::holder_pid(path),
                });
            }
            Err(e) => return Err(io_error(path)(e)),
        }

        warn!("Removing stale lock {:?}", path);
        let removed = fs::remove_file(path).map_err(io_error(path));
        let _ = FileExt::unlock(&file);
        removed?;
        Ok(true)
    }
}

/// Whether `file` is still the inode linked at `path`.
#[cfg(unix)]
fn is_linked_at(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_linked_at(_file: &File, path: &Path) -> bool {
    path.exists()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // The file stays; only the PID goes so `holder_pid` reports nobody
        if let Err(e) = self.file.set_len(0) {
            debug!("Could not clear lock file {:?}: {}", self.path, e);
        }
        let _ = FileExt::unlock(&self.file);
        info!("Released run lock {:?}", self.path);
    }
}
