//! Error types for the Lambda packager.
//!
//! Each variant names the build step that failed and carries enough context
//! (paths, exit status, captured tool output) to act on the failure without
//! re-running the build.

use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors that can occur while building or inspecting a deployment archive.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The declared source file does not exist.
    #[error("source file not found at {path}")]
    MissingSourceFile {
        /// Path where the source file was expected.
        path: Utf8PathBuf,
    },

    /// The external dependency resolver failed, could not start, or timed out.
    #[error("{program} could not resolve dependencies [{}] ({}): {stderr}", .dependencies.join(", "), describe_status(.status.as_ref()))]
    DependencyResolution {
        /// Resolver program that was invoked.
        program: String,
        /// Dependencies requested in the failing invocation.
        dependencies: Vec<String>,
        /// Exit status of the resolver, if it ran to completion.
        status: Option<ExitStatus>,
        /// Captured diagnostic output (stderr, or stdout when stderr is empty).
        stderr: String,
    },

    /// The archive could not be written to the target path.
    #[error("failed to create archive {path}: {reason}")]
    ArchiveCreation {
        /// Target archive path.
        path: Utf8PathBuf,
        /// Description of the underlying failure.
        reason: String,
    },

    /// A staging directory operation failed.
    #[error("staging failed at {path}: {reason}")]
    StagingFailed {
        /// Path involved in the failing operation.
        path: Utf8PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// The staging directory would overlap files the build must not delete.
    #[error("refusing to use staging directory {path}: {reason}")]
    UnsafeStagingDir {
        /// The configured staging directory.
        path: Utf8PathBuf,
        /// Which file or directory it overlaps.
        reason: String,
    },

    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found at {path}")]
    ConfigNotFound {
        /// Path that was requested.
        path: Utf8PathBuf,
    },

    /// The configuration file could not be parsed or failed validation.
    #[error("invalid configuration in {path}: {reason}")]
    InvalidConfig {
        /// Path of the offending configuration file.
        path: Utf8PathBuf,
        /// Description of the parse or validation error.
        reason: String,
    },

    /// A Lambda function name violates the naming rules.
    #[error("invalid function name \"{value}\": {reason}")]
    InvalidFunctionName {
        /// The rejected value.
        value: String,
        /// Which rule was violated.
        reason: String,
    },

    /// The archive to inspect does not exist.
    #[error("archive not found at {path}; run `lambda-packager build` first")]
    ArchiveNotFound {
        /// Path where the archive was expected.
        path: Utf8PathBuf,
    },

    /// The archive exists but could not be read as a zip file.
    #[error("failed to read archive {path}: {reason}")]
    ArchiveRead {
        /// Path of the unreadable archive.
        path: Utf8PathBuf,
        /// Description of the read failure.
        reason: String,
    },

    /// The handler module is not present at the archive root.
    #[error("handler module {module} not found at the root of {archive}")]
    HandlerModuleMissing {
        /// Expected module file name (for example `lambda_function.py`).
        module: String,
        /// Archive that was inspected.
        archive: Utf8PathBuf,
    },

    /// Another build holds the lock for this archive or staging directory.
    #[error("another build is in progress (lock held on {lock_path})")]
    BuildInProgress {
        /// Lock file that is held.
        lock_path: Utf8PathBuf,
    },

    /// A path on disk is not valid UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to write output.
    #[error("failed to write output")]
    WriteFailed {
        /// The underlying error that caused the write to fail.
        #[source]
        source: std::io::Error,
    },

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

fn describe_status(status: Option<&ExitStatus>) -> String {
    match status.and_then(ExitStatus::code) {
        Some(code) => format!("exit code {code}"),
        None if status.is_some() => "terminated by signal".to_owned(),
        None => "did not complete".to_owned(),
    }
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
