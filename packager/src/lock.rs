//! Advisory locks serialising builds.
//!
//! Two builds writing the same archive, or sharing a staging directory,
//! would race on the files they delete and recreate. A build therefore takes
//! an exclusive lock on `<path>.lock` for both its archive and its staging
//! directory, and refuses to start while another process holds either.
//!
//! The lock file is unlinked on release while the lock is still held. A
//! process that opened the old file before the unlink may still lock it, so
//! [`BuildLock::acquire`] checks that the locked handle is the file currently
//! at the lock path and retries when it is not.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs;
use std::io;

/// Attempts made before a lock file that keeps being replaced is reported as
/// contended.
const MAX_ATTEMPTS: usize = 5;

/// Exclusive build lock, released and removed on drop.
#[derive(Debug)]
pub struct BuildLock {
    file: fs::File,
    path: Utf8PathBuf,
}

/// Outcome of locking one opened lock file.
#[derive(Debug)]
enum Attempt {
    /// The handle is locked and is the file at the lock path.
    Acquired(fs::File),
    /// Another process holds the lock.
    Contended,
    /// The handle was locked, but the lock path no longer names it.
    Stale,
}

impl BuildLock {
    /// Acquire the lock guarding `guarded`, an archive or staging path.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::BuildInProgress`] if another process holds
    /// the lock, or [`PackagerError::Io`] if the lock file cannot be created
    /// or locked.
    pub fn acquire(guarded: &Utf8Path) -> Result<Self> {
        let path = lock_path_for(guarded);
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        for _ in 0..MAX_ATTEMPTS {
            match try_lock_file(open_lock_file(&path)?, &path)? {
                Attempt::Acquired(file) => {
                    log::debug!("acquired build lock {path}");
                    return Ok(Self { file, path });
                }
                Attempt::Contended => break,
                Attempt::Stale => log::debug!("lock file {path} was replaced; retrying"),
            }
        }
        Err(PackagerError::BuildInProgress { lock_path: path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        // Unlink before unlocking so no other process can lock this file and
        // find it still at the lock path.
        let _ = fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Lock file path for a guarded path: the path with `.lock` appended.
#[must_use]
pub fn lock_path_for(guarded: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{guarded}.lock"))
}

fn open_lock_file(path: &Utf8Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

fn try_lock_file(file: fs::File, path: &Utf8Path) -> Result<Attempt> {
    if let Err(err) = file.try_lock_exclusive() {
        return match classify_lock_error(err, path) {
            PackagerError::BuildInProgress { .. } => Ok(Attempt::Contended),
            other => Err(other),
        };
    }
    if is_current_lock_file(&file, path)? {
        Ok(Attempt::Acquired(file))
    } else {
        Ok(Attempt::Stale)
    }
}

/// Map a failed `try_lock_exclusive` to an error. Only contention means
/// another build is running.
fn classify_lock_error(err: io::Error, path: &Utf8Path) -> PackagerError {
    let contended = fs2::lock_contended_error();
    if err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error() {
        PackagerError::BuildInProgress {
            lock_path: path.to_owned(),
        }
    } else {
        PackagerError::Io(err)
    }
}

#[cfg(unix)]
fn is_current_lock_file(file: &fs::File, path: &Utf8Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

// Open files cannot be unlinked on other platforms.
#[cfg(not(unix))]
fn is_current_lock_file(_file: &fs::File, _path: &Utf8Path) -> io::Result<bool> {
    Ok(true)
}
