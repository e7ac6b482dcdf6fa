//! Build pipeline orchestration.
//!
//! [`Packager::build`] runs the packaging steps strictly in order:
//!
//! 1. delete the previous archive and staging directory,
//! 2. create a fresh staging directory,
//! 3. copy the source module into it,
//! 4. install the declared dependencies into it,
//! 5. zip it into the archive,
//! 6. remove it,
//! 7. report the archive.
//!
//! Any failing step halts the build. Nothing is rolled back; a staging
//! directory left behind by a failed run is removed by the next run's first
//! step.

use crate::archive::{ArchiveDescriptor, create_archive};
use crate::config::PackageConfig;
use crate::deps::{CommandExecutor, ResolverInvocation, resolve_dependencies};
use crate::error::Result;
use crate::lock::BuildLock;
use crate::output::{human_size, success_banner, write_line};
use crate::stager::Stager;
use std::fmt;
use std::io::Write;

/// Progress of a build through its linear sequence of steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    /// Nothing has happened yet.
    Start,
    /// Previous archive and staging directory are gone.
    Cleaned,
    /// An empty staging directory exists.
    Staged,
    /// The source module sits at the staging root.
    SourceCopied,
    /// Dependencies are installed into the staging directory.
    DependenciesInstalled,
    /// The archive has been written.
    Archived,
    /// The staging directory has been removed.
    StagingRemoved,
    /// The archive has been reported.
    Done,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Cleaned => "cleaned",
            Self::Staged => "staged",
            Self::SourceCopied => "source copied",
            Self::DependenciesInstalled => "dependencies installed",
            Self::Archived => "archived",
            Self::StagingRemoved => "staging removed",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Builds deployment archives for one [`PackageConfig`].
pub struct Packager<'a> {
    config: PackageConfig,
    executor: &'a dyn CommandExecutor,
    quiet: bool,
}

impl<'a> Packager<'a> {
    /// Create a packager that resolves dependencies through `executor`.
    #[must_use]
    pub fn new(config: PackageConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            config,
            executor,
            quiet: false,
        }
    }

    /// Suppress progress output and the success banner.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// The configuration this packager builds.
    #[must_use]
    pub fn config(&self) -> &PackageConfig {
        &self.config
    }

    /// Build the deployment archive.
    ///
    /// Progress lines and the final banner are written to `out` unless the
    /// packager is quiet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PackagerError::UnsafeStagingDir`] if removing
    /// the staging directory could delete the source, the archive, or their
    /// parents, [`crate::error::PackagerError::BuildInProgress`] if another
    /// build holds the lock on the archive or the staging directory, and
    /// otherwise the error of the first failing step: `StagingFailed`, `MissingSourceFile`,
    /// `DependencyResolution`, or `ArchiveCreation`.
    pub fn build(&self, out: &mut dyn Write) -> Result<ArchiveDescriptor> {
        self.config.check_staging_dir(None)?;
        let _archive_lock = BuildLock::acquire(&self.config.archive_path)?;
        let _staging_lock = BuildLock::acquire(&self.config.staging_dir)?;
        let stager = Stager::new(
            self.config.staging_dir.clone(),
            self.config.archive_path.clone(),
        );

        let mut reached = BuildStage::Start;
        let result = self.run_steps(&stager, out, &mut reached);
        match &result {
            Ok(descriptor) => log::info!(
                "built {} ({} bytes, sha256 {})",
                descriptor.path,
                descriptor.size_bytes,
                descriptor.sha256
            ),
            Err(err) => log::warn!("build halted after stage '{reached}': {err}"),
        }
        result
    }

    fn run_steps(
        &self,
        stager: &Stager,
        out: &mut dyn Write,
        reached: &mut BuildStage,
    ) -> Result<ArchiveDescriptor> {
        let config = &self.config;

        self.progress(out, "Removing previous build artefacts...");
        stager.clean()?;
        self.advance(reached, BuildStage::Cleaned);

        self.progress(out, format!("Creating staging directory {}...", config.staging_dir));
        stager.prepare()?;
        self.advance(reached, BuildStage::Staged);

        self.progress(out, format!("Copying {}...", config.source_file));
        stager.stage_source(&config.source_file)?;
        self.advance(reached, BuildStage::SourceCopied);

        if !config.dependencies.is_empty() {
            self.progress(
                out,
                format!("Installing dependencies: {}...", config.dependencies.join(", ")),
            );
        }
        resolve_dependencies(
            self.executor,
            &config.resolver,
            &config.dependencies,
            stager.staging_path(),
        )?;
        self.advance(reached, BuildStage::DependenciesInstalled);

        self.progress(out, format!("Creating archive {}...", config.archive_path));
        let descriptor = create_archive(stager.staging_path(), &config.archive_path)?;
        self.advance(reached, BuildStage::Archived);

        self.progress(out, "Removing staging directory...");
        stager.remove()?;
        self.advance(reached, BuildStage::StagingRemoved);

        if !self.quiet {
            write_line(out, "");
            write_line(out, success_banner(&config.function_name, &descriptor));
        }
        log::debug!("archive size {}", human_size(descriptor.size_bytes));
        self.advance(reached, BuildStage::Done);

        Ok(descriptor)
    }

    fn advance(&self, reached: &mut BuildStage, next: BuildStage) {
        log::debug!("{}: {reached} -> {next}", self.config.function_name);
        *reached = next;
    }

    fn progress(&self, out: &mut dyn Write, message: impl fmt::Display) {
        if !self.quiet {
            write_line(out, message);
        }
    }

    /// Describe what [`Self::build`] would do, without touching the disk.
    #[must_use]
    pub fn plan(&self) -> BuildPlan {
        let config = &self.config;
        let staged_source = config
            .source_file
            .file_name()
            .map_or_else(|| config.staging_dir.clone(), |name| config.staging_dir.join(name));

        let mut steps = vec![
            format!(
                "remove {} and {} if present",
                config.archive_path, config.staging_dir
            ),
            format!("create {}", config.staging_dir),
            format!("copy {} -> {staged_source}", config.source_file),
        ];
        if config.dependencies.is_empty() {
            steps.push("no dependencies to install".to_owned());
        } else {
            let invocation =
                ResolverInvocation::new(&config.resolver, &config.staging_dir, &config.dependencies);
            steps.push(format!("run `{}`", invocation.command_line()));
        }
        steps.push(format!("zip {} -> {}", config.staging_dir, config.archive_path));
        steps.push(format!("remove {}", config.staging_dir));

        let mut warnings = Vec::new();
        if let Err(err) = config.check_staging_dir(None) {
            warnings.push(err.to_string());
        }
        if !config.source_file.is_file() {
            warnings.push(format!("source file {} does not exist", config.source_file));
        }

        BuildPlan {
            function_name: config.function_name.to_string(),
            handler: config.handler.clone(),
            steps,
            warnings,
        }
    }
}

/// The steps a build would take, for `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Function the archive is for.
    pub function_name: String,
    /// Configured handler.
    pub handler: String,
    /// Human-readable steps, in order.
    pub steps: Vec<String>,
    /// Problems that would make the build fail.
    pub warnings: Vec<String>,
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dry run for {} (handler {}):", self.function_name, self.handler)?;
        for (index, step) in self.steps.iter().enumerate() {
            writeln!(f, "  {}. {step}", index + 1)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {warning}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "packager_tests.rs"]
mod tests;
