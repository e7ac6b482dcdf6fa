//! End-to-end tests of the build pipeline against a fake resolver.
//!
//! The fake imitates `pip install --target`, so these tests exercise the real
//! staging, archiving, and locking code without network access.

use camino::Utf8PathBuf;
use lambda_packager::archive::{ArchiveDescriptor, create_archive, list_entries};
use lambda_packager::config::PackageConfig;
use lambda_packager::error::PackagerError;
use lambda_packager::lock::lock_path_for;
use lambda_packager::packager::Packager;
use lambda_packager::test_utils::FakePipInstaller;
use rstest::{fixture, rstest};
use std::fs;
use tempfile::TempDir;

const HANDLER_SOURCE: &str = "import urllib3\n\n\ndef lambda_handler(event, context):\n    return {\"statusCode\": 200}\n";

struct Project {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Project {
    fn config(&self) -> PackageConfig {
        PackageConfig::default().anchored_at(&self.root)
    }

    fn build(&self, installer: &FakePipInstaller) -> Result<ArchiveDescriptor, PackagerError> {
        Packager::new(self.config(), installer)
            .quiet(true)
            .build(&mut Vec::new())
    }

    fn top_level(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.root)
            .expect("read project dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

#[fixture]
fn project() -> Project {
    let dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 temp dir");
    let source = root.join("lambda/lambda_function.py");
    fs::create_dir_all(source.parent().expect("parent")).expect("mkdir lambda/");
    fs::write(&source, HANDLER_SOURCE).expect("write handler");
    Project { _dir: dir, root }
}

#[rstest]
fn handler_and_dependency_sit_at_archive_root(project: Project) {
    let descriptor = project
        .build(&FakePipInstaller::default())
        .expect("build succeeds");

    assert_eq!(
        descriptor.root_members(),
        ["lambda_function.py", "urllib3-2.2.1.dist-info", "urllib3"]
    );
    assert!(descriptor.contains("urllib3/__init__.py"));
    assert!(
        descriptor.entries.iter().all(|e| !e.starts_with("package/")),
        "staging directory name must not appear in the archive"
    );
}

#[rstest]
fn archived_handler_matches_source(project: Project) {
    let descriptor = project
        .build(&FakePipInstaller::default())
        .expect("build succeeds");

    let file = fs::File::open(&descriptor.path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    let mut entry = archive.by_name("lambda_function.py").expect("handler entry");
    let mut contents = String::new();
    std::io::Read::read_to_string(&mut entry, &mut contents).expect("read handler");
    assert_eq!(contents, HANDLER_SOURCE);
}

#[rstest]
fn rebuilding_unchanged_inputs_is_reproducible(project: Project) {
    let installer = FakePipInstaller::default();

    let first = project.build(&installer).expect("first build");
    let second = project.build(&installer).expect("second build");

    assert_eq!(first.entries, second.entries);
    assert_eq!(first.sha256, second.sha256);
    assert_eq!(first.size_bytes, second.size_bytes);
}

#[rstest]
fn repeated_builds_leave_exactly_one_archive(project: Project) {
    let installer = FakePipInstaller::default();
    for _ in 0..3 {
        project.build(&installer).expect("build succeeds");
    }

    assert_eq!(project.top_level(), ["lambda", "lambda_function.zip"]);
    assert!(!lock_path_for(&project.config().archive_path).exists());
    assert_eq!(installer.calls().len(), 3);
}

#[rstest]
fn dependency_upgrade_replaces_archive_contents(project: Project) {
    project
        .build(&FakePipInstaller::new("1.26.18"))
        .expect("first build");
    let descriptor = project
        .build(&FakePipInstaller::new("2.2.1"))
        .expect("second build");

    let entries = list_entries(&descriptor.path).expect("list entries");
    assert!(entries.iter().any(|e| e.starts_with("urllib3-2.2.1.dist-info/")));
    assert!(!entries.iter().any(|e| e.starts_with("urllib3-1.26.18.dist-info/")));
}

#[rstest]
fn stale_staging_contents_never_reach_the_archive(project: Project) {
    let config = project.config();
    fs::create_dir_all(config.staging_dir.join("leftover")).expect("mkdir leftover");
    fs::write(config.staging_dir.join("leftover/old.py"), b"stale\n").expect("write stale");

    let descriptor = project
        .build(&FakePipInstaller::default())
        .expect("build succeeds");

    assert!(!descriptor.entries.iter().any(|e| e.starts_with("leftover")));
}

#[rstest]
fn configured_paths_are_honoured(project: Project) {
    fs::write(
        project.root.join("lambda-packager.toml"),
        concat!(
            "function_name = \"nightly-report\"\n",
            "archive_path = \"dist/nightly.zip\"\n",
            "staging_dir = \"build/staging\"\n",
            "dependencies = [\"urllib3\", \"certifi\"]\n",
        ),
    )
    .expect("write config");
    let config = PackageConfig::discover(None, &project.root).expect("load config");
    let installer = FakePipInstaller::default();

    let descriptor = Packager::new(config, &installer)
        .quiet(true)
        .build(&mut Vec::new())
        .expect("build succeeds");

    assert_eq!(descriptor.path, project.root.join("dist/nightly.zip"));
    assert!(descriptor.contains("certifi/__init__.py"));
    assert!(!project.root.join("build/staging").exists());
}

#[rstest]
fn archive_creation_reports_unwritable_destination(project: Project) {
    let staging = project.root.join("lambda");
    let blocker = project.root.join("blocker");
    fs::write(&blocker, b"not a directory").expect("write blocker");
    let target = blocker.join("lambda_function.zip");

    let err = create_archive(&staging, &target).expect_err("parent is a file");

    assert!(
        matches!(err, PackagerError::ArchiveCreation { ref path, .. } if *path == target),
        "expected ArchiveCreation, got {err:?}"
    );
}

#[cfg(unix)]
#[rstest]
fn archive_creation_reports_unreadable_staging(project: Project) {
    use std::os::unix::fs::PermissionsExt;

    // Root bypasses permission checks.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let staging = project.root.join("package");
    let locked = staging.join("urllib3");
    fs::create_dir_all(&locked).expect("mkdir");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("chmod");
    let target = project.root.join("lambda_function.zip");

    let result = create_archive(&staging, &target);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("restore mode");

    assert!(matches!(result, Err(PackagerError::ArchiveCreation { .. })));
    assert!(!target.exists(), "no partial archive may remain");
}
