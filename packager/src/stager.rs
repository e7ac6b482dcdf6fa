//! Staging directory lifecycle.
//!
//! The staging directory is the exact image of the archive root: the source
//! module is copied into it, dependencies are installed into it, and it is
//! zipped and discarded. Every build starts from a clean slate so nothing
//! from an earlier run can leak into the archive.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;

/// Handles the staging directory and the previous build's artefacts.
#[derive(Debug, Clone)]
pub struct Stager {
    staging_dir: Utf8PathBuf,
    archive_path: Utf8PathBuf,
}

impl Stager {
    /// Create a stager for the given staging directory and archive path.
    #[must_use]
    pub fn new(staging_dir: Utf8PathBuf, archive_path: Utf8PathBuf) -> Self {
        Self {
            staging_dir,
            archive_path,
        }
    }

    /// Delete the previous archive and staging directory, if any.
    ///
    /// Absence of either is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::StagingFailed`] if an existing artefact cannot
    /// be removed.
    pub fn clean(&self) -> Result<()> {
        remove_if_present(&self.archive_path, |p| fs::remove_file(p))?;
        remove_if_present(&self.staging_dir, |p| fs::remove_dir_all(p))
    }

    /// Create a fresh, empty staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::StagingFailed`] if the directory cannot be
    /// created.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.staging_dir).map_err(|e| staging_failed(&self.staging_dir, &e))
    }

    /// Copy `source` to the root of the staging directory.
    ///
    /// Returns the staged path.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingSourceFile`] if `source` is not a file,
    /// or [`PackagerError::StagingFailed`] if the copy fails.
    pub fn stage_source(&self, source: &Utf8Path) -> Result<Utf8PathBuf> {
        if !source.is_file() {
            return Err(PackagerError::MissingSourceFile {
                path: source.to_owned(),
            });
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| PackagerError::MissingSourceFile {
                path: source.to_owned(),
            })?;
        let dest = self.staging_dir.join(file_name);

        fs::copy(source, &dest).map_err(|e| PackagerError::StagingFailed {
            path: dest.clone(),
            reason: format!("failed to copy {source}: {e}"),
        })?;

        Ok(dest)
    }

    /// Remove the staging directory.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::StagingFailed`] if removal fails.
    pub fn remove(&self) -> Result<()> {
        remove_if_present(&self.staging_dir, |p| fs::remove_dir_all(p))
    }

    /// Return the staging directory path.
    #[must_use]
    pub fn staging_path(&self) -> &Utf8Path {
        &self.staging_dir
    }

    /// Return the archive path this stager cleans up before a build.
    #[must_use]
    pub fn archive_path(&self) -> &Utf8Path {
        &self.archive_path
    }
}

fn remove_if_present(path: &Utf8Path, remove: impl FnOnce(&Utf8Path) -> io::Result<()>) -> Result<()> {
    match remove(path) {
        Ok(()) => {
            log::debug!("removed {path}");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(staging_failed(path, &e)),
    }
}

fn staging_failed(path: &Utf8Path, err: &io::Error) -> PackagerError {
    PackagerError::StagingFailed {
        path: path.to_owned(),
        reason: err.to_string(),
    }
}
