//! Shared test utilities for the packager crate.

use crate::deps::CommandExecutor;
use crate::error::{PackagerError, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "pip").
    pub cmd: String,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `cmd` with exactly `args`, answering with `result`.
    #[must_use]
    pub fn new(cmd: &str, args: &[&str], result: Result<Output>) -> Self {
        Self {
            cmd: cmd.to_owned(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
            result,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Replays expected command invocations in order and returns their
/// predefined results. An unexpected or mismatched invocation yields
/// [`PackagerError::StubMismatch`].
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let Some(call) = self.expected.borrow_mut().pop_front() else {
            return Err(PackagerError::StubMismatch {
                message: format!("unexpected invocation: {cmd} {}", args.join(" ")),
            });
        };

        if call.cmd != cmd || call.args != args {
            return Err(PackagerError::StubMismatch {
                message: format!(
                    "expected `{} {}`, got `{cmd} {}`",
                    call.cmd,
                    call.args.join(" "),
                    args.join(" ")
                ),
            });
        }

        call.result
    }
}

/// A `CommandExecutor` that imitates `pip install --target <dir> <deps...>`.
///
/// For every dependency it writes `<dep>/__init__.py` and a
/// `<dep>-<version>.dist-info/METADATA` file into the target directory, so
/// builds can be exercised end to end without network access.
#[derive(Debug)]
pub struct FakePipInstaller {
    version: String,
    calls: RefCell<Vec<Vec<String>>>,
}

impl FakePipInstaller {
    /// Create an installer that reports every dependency at `version`.
    #[must_use]
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_owned(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Argument lists of every invocation so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl Default for FakePipInstaller {
    fn default() -> Self {
        Self::new("2.2.1")
    }
}

impl CommandExecutor for FakePipInstaller {
    fn run(&self, _cmd: &str, args: &[&str]) -> Result<Output> {
        self.calls
            .borrow_mut()
            .push(args.iter().map(|a| (*a).to_owned()).collect());

        let Some(position) = args.iter().position(|a| *a == "--target") else {
            return Ok(failure_output("ERROR: --target is required"));
        };
        let Some(target) = args.get(position + 1) else {
            return Ok(failure_output("ERROR: --target needs a directory"));
        };
        let target = std::path::Path::new(target);
        let rest = args.get(position + 2..).unwrap_or_default();

        let mut installed = Vec::new();
        for dependency in rest.iter().filter(|a| !a.starts_with('-')) {
            let package = target.join(dependency);
            std::fs::create_dir_all(&package)?;
            std::fs::write(
                package.join("__init__.py"),
                format!("__version__ = '{}'\n", self.version),
            )?;
            let dist_info = target.join(format!("{dependency}-{}.dist-info", self.version));
            std::fs::create_dir_all(&dist_info)?;
            std::fs::write(
                dist_info.join("METADATA"),
                format!("Name: {dependency}\nVersion: {}\n", self.version),
            )?;
            installed.push(format!("{dependency}-{}", self.version));
        }

        let mut output = success_output();
        output.stdout = format!("Successfully installed {}\n", installed.join(" ")).into_bytes();
        Ok(output)
    }
}
