//! Dependency resolution through an external package installer.
//!
//! The packager only decides *which* dependencies are installed and *where*
//! they land; fetching them is delegated to a resolver program (`pip` by
//! default) run through the [`CommandExecutor`] seam. Resolver output is
//! always captured: it is logged on success and carried inside
//! [`PackagerError::DependencyResolution`] on failure.

use crate::config::ResolverConfig;
use crate::error::{PackagerError, Result};
use camino::Utf8Path;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O errors encountered while spawning or running the
    /// command, including a [`io::ErrorKind::TimedOut`] error when the
    /// executor enforces a time limit.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lambda_packager::deps::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("pip", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), lambda_packager::error::PackagerError>(())
    /// ```
    fn run<'a>(&self, cmd: &str, args: &[&'a str]) -> Result<Output>;
}

/// Executes commands on the host system.
///
/// Output is captured in full. When a timeout is set the child is killed
/// once it elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Create an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let Some(timeout) = self.timeout else {
            return Command::new(cmd)
                .args(args)
                .stdin(Stdio::null())
                .output()
                .map_err(PackagerError::from);
        };

        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain both pipes while waiting so a chatty resolver cannot block on
        // a full pipe buffer.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        match child.wait_timeout(timeout)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_drain(stdout)?,
                stderr: join_drain(stderr)?,
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("{cmd} timed out after {} seconds", timeout.as_secs()),
                )
                .into())
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| io::Error::other("output reader thread panicked"))?
            .map_err(PackagerError::from),
        None => Ok(Vec::new()),
    }
}

/// A fully assembled resolver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverInvocation {
    /// Executable to run.
    pub program: String,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl ResolverInvocation {
    /// Build the `install --target` invocation for `dependencies`.
    ///
    /// A resolver program written with spaces (`python3 -m pip`) is split so
    /// that the first word is the executable.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use lambda_packager::config::ResolverConfig;
    /// use lambda_packager::deps::ResolverInvocation;
    ///
    /// let invocation = ResolverInvocation::new(
    ///     &ResolverConfig::default(),
    ///     Utf8Path::new("package"),
    ///     &["urllib3".to_owned()],
    /// );
    /// assert_eq!(invocation.command_line(), "pip install --target package urllib3");
    /// ```
    #[must_use]
    pub fn new(config: &ResolverConfig, target: &Utf8Path, dependencies: &[String]) -> Self {
        let mut words = config.program.split_whitespace().map(str::to_owned);
        let program = words.next().unwrap_or_default();
        let mut args: Vec<String> = words.collect();
        args.extend(["install".to_owned(), "--target".to_owned(), target.to_string()]);
        args.extend(config.extra_args.iter().cloned());
        args.extend(dependencies.iter().cloned());
        Self { program, args }
    }

    /// Render the invocation as a single shell-like line for display.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Install `dependencies` into `target` using the configured resolver.
///
/// Does nothing when `dependencies` is empty.
///
/// # Errors
///
/// Returns [`PackagerError::DependencyResolution`] if the resolver cannot be
/// started, times out, or exits unsuccessfully. The error carries the exit
/// status (when known) and the resolver's diagnostic output.
pub fn resolve_dependencies(
    executor: &dyn CommandExecutor,
    config: &ResolverConfig,
    dependencies: &[String],
    target: &Utf8Path,
) -> Result<()> {
    if dependencies.is_empty() {
        log::debug!("no dependencies declared; skipping resolver");
        return Ok(());
    }

    let invocation = ResolverInvocation::new(config, target, dependencies);
    log::info!("resolving dependencies: {}", invocation.command_line());

    let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
    let failure = |status: Option<ExitStatus>, stderr: String| PackagerError::DependencyResolution {
        program: invocation.program.clone(),
        dependencies: dependencies.to_vec(),
        status,
        stderr,
    };

    let output = executor
        .run(&invocation.program, &args)
        .map_err(|err| failure(None, err.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let diagnostic = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        return Err(failure(Some(output.status), diagnostic.to_owned()));
    }

    for line in stdout.lines().chain(stderr.lines()) {
        log::debug!("{}: {line}", invocation.program);
    }
    Ok(())
}
