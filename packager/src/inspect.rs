//! Pre-deployment archive checks.
//!
//! Before an archive is uploaded it must exist, be a readable zip, and carry
//! the handler's module at its root, otherwise the Lambda runtime cannot
//! import the handler.

use crate::archive::ArchiveDescriptor;
use crate::config::handler_module_file;
use crate::error::{PackagerError, Result};
use camino::Utf8Path;

/// Inspect the archive at `path` and verify it can serve `handler`.
///
/// # Errors
///
/// Returns [`PackagerError::ArchiveNotFound`] if there is no archive,
/// [`PackagerError::ArchiveRead`] if it is not a readable zip, and
/// [`PackagerError::HandlerModuleMissing`] if the handler's module file is
/// not in the archive.
pub fn inspect_archive(path: &Utf8Path, handler: &str) -> Result<ArchiveDescriptor> {
    if !path.is_file() {
        return Err(PackagerError::ArchiveNotFound {
            path: path.to_owned(),
        });
    }

    let descriptor = ArchiveDescriptor::read(path)?;
    let module = handler_module_file(handler);
    if !descriptor.contains(&module) {
        return Err(PackagerError::HandlerModuleMissing {
            module,
            archive: path.to_owned(),
        });
    }

    log::info!(
        "{path}: {} entries, handler module {module} present",
        descriptor.entries.len()
    );
    Ok(descriptor)
}
