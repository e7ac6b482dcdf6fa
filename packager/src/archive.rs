//! Deployment archive creation and inspection.
//!
//! Archives are deflated zip files whose root is the staging directory's
//! root. Entries are written in sorted order with a fixed modification time,
//! so staging the same files twice yields byte-identical archives.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Summary of a finished (or inspected) deployment archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveDescriptor {
    /// Location of the archive.
    pub path: Utf8PathBuf,
    /// Size of the archive file in bytes.
    pub size_bytes: u64,
    /// Member names in archive order; directories end with `/`.
    pub entries: Vec<String>,
    /// Lowercase hex SHA-256 of the archive file.
    pub sha256: String,
}

impl ArchiveDescriptor {
    /// Describe the archive at `path` by reading it back from disk.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ArchiveRead`] if the file is not a readable
    /// zip archive.
    pub fn read(path: &Utf8Path) -> Result<Self> {
        let read_failed = |reason: String| PackagerError::ArchiveRead {
            path: path.to_owned(),
            reason,
        };
        let size_bytes = fs::metadata(path)
            .map_err(|e| read_failed(e.to_string()))?
            .len();
        let entries = list_entries(path)?;
        let sha256 = compute_sha256(path).map_err(|e| read_failed(e.to_string()))?;
        Ok(Self {
            path: path.to_owned(),
            size_bytes,
            entries,
            sha256,
        })
    }

    /// Returns `true` if `name` is a file entry of the archive.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry == name)
    }

    /// Names of the top-level members, without trailing slashes, in order of
    /// first appearance.
    #[must_use]
    pub fn root_members(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .filter_map(|entry| entry.split('/').next())
            .filter(|root| !root.is_empty() && seen.insert(*root))
            .collect()
    }
}

/// Zip the contents of `root` into a new archive at `archive_path`.
///
/// Paths inside the archive are relative to `root`. Missing parent
/// directories of `archive_path` are created. A partially written archive is
/// removed when creation fails.
///
/// # Errors
///
/// Returns [`PackagerError::ArchiveCreation`] if the tree cannot be read or
/// the archive cannot be written.
pub fn create_archive(root: &Utf8Path, archive_path: &Utf8Path) -> Result<ArchiveDescriptor> {
    let creation_failed = |reason: String| PackagerError::ArchiveCreation {
        path: archive_path.to_owned(),
        reason,
    };

    let members = collect_members(root).map_err(|e| creation_failed(e.to_string()))?;

    if let Err(err) = write_zip(archive_path, &members) {
        let _ = fs::remove_file(archive_path);
        return Err(creation_failed(err));
    }

    let size_bytes = fs::metadata(archive_path)
        .map_err(|e| creation_failed(e.to_string()))?
        .len();
    let sha256 = compute_sha256(archive_path).map_err(|e| creation_failed(e.to_string()))?;

    Ok(ArchiveDescriptor {
        path: archive_path.to_owned(),
        size_bytes,
        entries: members.into_iter().map(|m| m.name).collect(),
        sha256,
    })
}

/// List member names of the zip archive at `path`, in archive order.
///
/// # Errors
///
/// Returns [`PackagerError::ArchiveRead`] if the archive cannot be opened or
/// parsed.
pub fn list_entries(path: &Utf8Path) -> Result<Vec<String>> {
    let read_failed = |reason: String| PackagerError::ArchiveRead {
        path: path.to_owned(),
        reason,
    };
    let file = fs::File::open(path).map_err(|e| read_failed(e.to_string()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| read_failed(e.to_string()))?;

    (0..archive.len())
        .map(|index| {
            archive
                .by_index_raw(index)
                .map(|entry| entry.name().to_owned())
                .map_err(|e| read_failed(e.to_string()))
        })
        .collect()
}

/// Compute the lowercase hex SHA-256 digest of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Utf8Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// One file or directory destined for the archive.
#[derive(Debug)]
struct Member {
    /// Archive-relative name using `/` separators; directories end in `/`.
    name: String,
    source: Utf8PathBuf,
    is_dir: bool,
    mode: u32,
}

/// Walk `root` and return its members sorted by archive name.
fn collect_members(root: &Utf8Path) -> io::Result<Vec<Member>> {
    let mut members = Vec::new();
    let mut pending = vec![root.to_owned()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = Utf8PathBuf::try_from(entry?.path())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let metadata = fs::metadata(&path)?;
            let relative = path
                .strip_prefix(root)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let mut name = relative
                .components()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join("/");

            if metadata.is_dir() {
                name.push('/');
                pending.push(path.clone());
            }
            members.push(Member {
                name,
                source: path,
                is_dir: metadata.is_dir(),
                mode: unix_mode(&metadata),
            });
        }
    }

    members.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(members)
}

fn write_zip(archive_path: &Utf8Path, members: &[Member]) -> std::result::Result<(), String> {
    if let Some(parent) = archive_path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    let file = fs::File::create(archive_path).map_err(|e| e.to_string())?;
    let mut zip = ZipWriter::new(file);
    let base = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for member in members {
        let options = base.unix_permissions(member.mode);
        if member.is_dir {
            zip.add_directory(member.name.as_str(), options)
                .map_err(|e| format!("{}: {e}", member.name))?;
        } else {
            zip.start_file(member.name.as_str(), options)
                .map_err(|e| format!("{}: {e}", member.name))?;
            let mut source = fs::File::open(&member.source)
                .map_err(|e| format!("{}: {e}", member.source))?;
            io::copy(&mut source, &mut zip).map_err(|e| format!("{}: {e}", member.name))?;
        }
    }

    zip.finish().map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() { 0o755 } else { 0o644 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Tree {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Tree {
        fn staging(&self) -> Utf8PathBuf {
            self.root.join("package")
        }

        fn write(&self, relative: &str, contents: &[u8]) {
            let path = self.staging().join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, contents).expect("write");
        }
    }

    #[fixture]
    fn tree() -> Tree {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 temp dir");
        let tree = Tree { _dir: dir, root };
        tree.write("lambda_function.py", b"def lambda_handler(e, c): pass\n");
        tree.write("urllib3/__init__.py", b"__version__ = '2.2.1'\n");
        tree.write("urllib3/util/retry.py", b"class Retry: pass\n");
        tree
    }

    #[rstest]
    fn create_archive_uses_paths_relative_to_staging_root(tree: Tree) {
        let archive = tree.root.join("lambda_function.zip");
        let descriptor = create_archive(&tree.staging(), &archive).expect("archive");

        assert_eq!(
            descriptor.entries,
            [
                "lambda_function.py",
                "urllib3/",
                "urllib3/__init__.py",
                "urllib3/util/",
                "urllib3/util/retry.py",
            ]
        );
        assert_eq!(descriptor.root_members(), ["lambda_function.py", "urllib3"]);
        assert!(descriptor.contains("urllib3/__init__.py"));
        assert_eq!(list_entries(&archive).expect("list"), descriptor.entries);
    }

    #[rstest]
    fn create_archive_is_byte_for_byte_reproducible(tree: Tree) {
        let first = create_archive(&tree.staging(), &tree.root.join("a.zip")).expect("first");
        let second = create_archive(&tree.staging(), &tree.root.join("b.zip")).expect("second");

        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.size_bytes, second.size_bytes);
    }

    #[rstest]
    fn create_archive_creates_missing_parent_directories(tree: Tree) {
        let archive = tree.root.join("dist/nested/etl.zip");
        let descriptor = create_archive(&tree.staging(), &archive).expect("archive");

        assert!(archive.is_file());
        assert_eq!(descriptor.size_bytes, fs::metadata(&archive).expect("meta").len());
    }

    #[rstest]
    fn create_archive_reports_unreadable_root(tree: Tree) {
        let archive = tree.root.join("out.zip");
        let err = create_archive(&tree.root.join("absent"), &archive).expect_err("no root");

        assert!(matches!(err, PackagerError::ArchiveCreation { .. }));
        assert!(!archive.exists());
    }

    #[rstest]
    fn descriptor_read_matches_created_descriptor(tree: Tree) {
        let archive = tree.root.join("lambda_function.zip");
        let created = create_archive(&tree.staging(), &archive).expect("archive");

        assert_eq!(ArchiveDescriptor::read(&archive).expect("read"), created);
    }

    #[test]
    fn root_members_are_unique_for_unsorted_archives() {
        let descriptor = ArchiveDescriptor {
            path: Utf8PathBuf::from("external.zip"),
            size_bytes: 0,
            entries: vec![
                "urllib3/__init__.py".to_owned(),
                "lambda_function.py".to_owned(),
                "urllib3/util/retry.py".to_owned(),
            ],
            sha256: String::new(),
        };

        assert_eq!(descriptor.root_members(), ["urllib3", "lambda_function.py"]);
    }

    #[rstest]
    fn list_entries_rejects_non_zip_files(tree: Tree) {
        let bogus = tree.root.join("bogus.zip");
        fs::write(&bogus, b"not a zip").expect("write");

        let err = list_entries(&bogus).expect_err("not a zip");
        assert!(matches!(err, PackagerError::ArchiveRead { .. }));
    }

    #[test]
    fn compute_sha256_of_empty_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("empty")).expect("UTF-8");
        fs::write(&path, b"").expect("write");

        assert_eq!(
            compute_sha256(&path).expect("digest"),
            concat!(
                "e3b0c44298fc1c149afbf4c8996fb924",
                "27ae41e4649b934ca495991b7852b855"
            )
        );
    }
}
