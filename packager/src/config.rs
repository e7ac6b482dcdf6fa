//! Packaging configuration.
//!
//! `PackageConfig` describes one deployment package: which source file to
//! ship, which dependencies to install beside it, where to stage them, and
//! where to write the archive. Values are read from `lambda-packager.toml`
//! when present and fall back to defaults that reproduce the classic
//! `lambda_function.zip` layout otherwise.

use crate::error::{PackagerError, Result};
use crate::function_name::FunctionName;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// File name probed in the working directory when no config path is given.
pub const CONFIG_FILE_NAME: &str = "lambda-packager.toml";

/// Description of a single deployment package.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Lambda function the archive is built for.
    pub function_name: FunctionName,
    /// Where the finished archive is written.
    pub archive_path: Utf8PathBuf,
    /// The single source module copied to the archive root.
    pub source_file: Utf8PathBuf,
    /// Runtime dependencies installed beside the source module, in order.
    pub dependencies: Vec<String>,
    /// Temporary directory assembled before archiving.
    pub staging_dir: Utf8PathBuf,
    /// Lambda handler in `module.function` form.
    pub handler: String,
    /// How dependencies are resolved.
    pub resolver: ResolverConfig,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            function_name: FunctionName::default(),
            archive_path: Utf8PathBuf::from("lambda_function.zip"),
            source_file: Utf8PathBuf::from("lambda/lambda_function.py"),
            dependencies: vec!["urllib3".to_owned()],
            staging_dir: Utf8PathBuf::from("package"),
            handler: "lambda_function.lambda_handler".to_owned(),
            resolver: ResolverConfig::default(),
        }
    }
}

/// Settings for the external dependency resolver.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Resolver executable; invoked as `<program> install --target <dir> ...`.
    pub program: String,
    /// Extra arguments inserted before the dependency names.
    pub extra_args: Vec<String>,
    /// Upper bound on a single resolver run, in seconds. `0` disables it.
    pub timeout_secs: u64,
}

impl ResolverConfig {
    const fn default_timeout_secs() -> u64 {
        300
    }

    /// Return the configured timeout, or `None` when disabled.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: "pip".to_owned(),
            extra_args: Vec::new(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

impl PackageConfig {
    /// Parse and validate configuration from TOML text.
    ///
    /// `origin` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::InvalidConfig`] if the text is not valid TOML,
    /// contains unknown keys, or fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use lambda_packager::config::PackageConfig;
    ///
    /// let config = PackageConfig::from_toml_str(
    ///     "dependencies = [\"urllib3\", \"certifi\"]",
    ///     Utf8Path::new("inline"),
    /// )?;
    /// assert_eq!(config.dependencies, ["urllib3", "certifi"]);
    /// assert_eq!(config.archive_path, "lambda_function.zip");
    /// # Ok::<(), lambda_packager::error::PackagerError>(())
    /// ```
    pub fn from_toml_str(contents: &str, origin: &Utf8Path) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|e| PackagerError::InvalidConfig {
            path: origin.to_owned(),
            reason: e.message().to_owned(),
        })?;
        config.validate().map_err(|reason| PackagerError::InvalidConfig {
            path: origin.to_owned(),
            reason,
        })?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ConfigNotFound`] if the file is missing, or
    /// the errors of [`Self::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.is_file() {
            return Err(PackagerError::ConfigNotFound {
                path: path.to_owned(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents, path)
    }

    /// Resolve the configuration for a run rooted at `working_dir`.
    ///
    /// An explicit path wins. Otherwise `lambda-packager.toml` in the working
    /// directory is used when present, and the defaults when not. Relative
    /// paths in the result are anchored at `working_dir`.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Self::load`] and
    /// [`Self::check_staging_dir`].
    pub fn discover(explicit: Option<&Utf8Path>, working_dir: &Utf8Path) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(&anchor(working_dir, path))?,
            None => {
                let candidate = working_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Self::load(&candidate)?
                } else {
                    log::debug!("no {CONFIG_FILE_NAME} in {working_dir}; using defaults");
                    Self::default()
                }
            }
        };
        let config = config.anchored_at(working_dir);
        config.check_staging_dir(Some(working_dir))?;
        Ok(config)
    }

    /// Return a copy with every relative path joined onto `root`.
    #[must_use]
    pub fn anchored_at(mut self, root: &Utf8Path) -> Self {
        self.archive_path = anchor(root, &self.archive_path);
        self.source_file = anchor(root, &self.source_file);
        self.staging_dir = anchor(root, &self.staging_dir);
        self
    }

    /// Archive-relative path of the module named by the handler.
    ///
    /// `lambda_function.lambda_handler` maps to `lambda_function.py`;
    /// `pkg.app.handler` maps to `pkg/app.py`.
    #[must_use]
    pub fn handler_module_file(&self) -> String {
        handler_module_file(&self.handler)
    }

    /// Check that deleting `staging_dir` cannot remove anything else.
    ///
    /// The staging directory must not contain `.` or `..` segments and must
    /// not be, or lie above, the source file, the archive, or `working_dir`.
    /// The comparison is lexical, so call this on anchored configurations.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnsafeStagingDir`] naming the overlap.
    pub fn check_staging_dir(&self, working_dir: Option<&Utf8Path>) -> Result<()> {
        match self.staging_overlap(working_dir) {
            Some(reason) => Err(PackagerError::UnsafeStagingDir {
                path: self.staging_dir.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn staging_overlap(&self, working_dir: Option<&Utf8Path>) -> Option<String> {
        let staging = &self.staging_dir;
        if staging
            .as_str()
            .split(['/', '\\'])
            .any(|segment| segment == "." || segment == "..")
        {
            return Some("it must not contain `.` or `..` segments".to_owned());
        }

        let guarded = [
            ("source_file", Some(self.source_file.as_path())),
            ("archive_path", Some(self.archive_path.as_path())),
            ("the working directory", working_dir),
        ];
        guarded.into_iter().find_map(|(label, path)| {
            path.filter(|p| p.starts_with(staging))
                .map(|p| format!("it contains {label} \"{p}\""))
        })
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !is_valid_handler(&self.handler) {
            return Err(format!(
                "handler \"{}\" must have the form module.function",
                self.handler
            ));
        }
        if self.source_file.file_name().is_none() {
            return Err(format!("source_file \"{}\" has no file name", self.source_file));
        }
        if self.staging_dir.as_str().trim().is_empty() {
            return Err("staging_dir must not be empty".to_owned());
        }
        if let Some(reason) = self.staging_overlap(None) {
            return Err(format!("staging_dir \"{}\": {reason}", self.staging_dir));
        }
        if let Some(blank) = self.dependencies.iter().find(|d| d.trim().is_empty()) {
            return Err(format!("dependency entry {blank:?} is blank"));
        }
        if self.resolver.program.trim().is_empty() {
            return Err("resolver.program must not be empty".to_owned());
        }
        Ok(())
    }
}

/// Map a `module.function` handler to the module's archive-relative file.
#[must_use]
pub fn handler_module_file(handler: &str) -> String {
    let module = handler.rsplit_once('.').map_or(handler, |(module, _)| module);
    format!("{}.py", module.replace('.', "/"))
}

fn is_valid_handler(handler: &str) -> bool {
    handler
        .rsplit_once('.')
        .is_some_and(|(module, function)| {
            !function.is_empty() && !module.is_empty() && module.split('.').all(|s| !s.is_empty())
        })
}

fn anchor(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("temp dir is UTF-8")
    }

    #[test]
    fn defaults_reproduce_classic_layout() {
        let config = PackageConfig::default();
        assert_eq!(config.function_name.as_str(), "data-pipeline-etl");
        assert_eq!(config.archive_path, "lambda_function.zip");
        assert_eq!(config.source_file, "lambda/lambda_function.py");
        assert_eq!(config.dependencies, ["urllib3"]);
        assert_eq!(config.staging_dir, "package");
        assert_eq!(config.resolver.program, "pip");
        assert_eq!(config.resolver.timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let config = PackageConfig::from_toml_str(
            concat!(
                "function_name = \"nightly-etl\"\n",
                "[resolver]\n",
                "program = \"pip3\"\n",
                "timeout_secs = 0\n",
            ),
            Utf8Path::new("test.toml"),
        )
        .expect("valid config");

        assert_eq!(config.function_name.as_str(), "nightly-etl");
        assert_eq!(config.resolver.program, "pip3");
        assert_eq!(config.resolver.timeout(), None);
        assert_eq!(config.source_file, "lambda/lambda_function.py");
    }

    #[rstest]
    #[case::unknown_key("archive = \"x.zip\"", "unknown field")]
    #[case::bad_function_name("function_name = \"bad name\"", "not allowed")]
    #[case::bad_handler("handler = \"lambda_handler\"", "module.function")]
    #[case::blank_dependency("dependencies = [\"urllib3\", \" \"]", "blank")]
    #[case::archive_in_staging(
        "staging_dir = \"build\"\narchive_path = \"build/out.zip\"",
        "contains archive_path"
    )]
    #[case::staging_is_working_dir("staging_dir = \".\"", "`.` or `..`")]
    #[case::staging_escapes_working_dir("staging_dir = \"../package\"", "`.` or `..`")]
    #[case::staging_holds_source("staging_dir = \"lambda\"", "contains source_file")]
    fn rejects_invalid_configuration(#[case] toml: &str, #[case] fragment: &str) {
        let err = PackageConfig::from_toml_str(toml, Utf8Path::new("bad.toml"))
            .expect_err("config should be rejected");
        assert!(matches!(err, PackagerError::InvalidConfig { .. }));
        assert!(err.to_string().contains(fragment), "got: {err}");
    }

    #[rstest]
    #[case::top_level("lambda_function.lambda_handler", "lambda_function.py")]
    #[case::nested("etl.app.handler", "etl/app.py")]
    fn handler_maps_to_module_file(#[case] handler: &str, #[case] expected: &str) {
        assert_eq!(handler_module_file(handler), expected);
    }

    #[test]
    fn discover_falls_back_to_defaults_anchored_at_working_dir() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_root(&dir);

        let config = PackageConfig::discover(None, &root).expect("defaults");
        assert_eq!(config.archive_path, root.join("lambda_function.zip"));
        assert_eq!(config.staging_dir, root.join("package"));
    }

    #[test]
    fn discover_reads_config_file_from_working_dir() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_root(&dir);
        std::fs::write(
            root.join(CONFIG_FILE_NAME),
            "archive_path = \"dist/etl.zip\"\n",
        )
        .expect("write config");

        let config = PackageConfig::discover(None, &root).expect("config loads");
        assert_eq!(config.archive_path, root.join("dist/etl.zip"));
    }

    #[test]
    fn discover_rejects_missing_explicit_file() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_root(&dir);

        let err = PackageConfig::discover(Some(Utf8Path::new("missing.toml")), &root)
            .expect_err("missing file");
        assert!(matches!(err, PackagerError::ConfigNotFound { .. }));
    }

    #[test]
    fn discover_rejects_staging_dir_above_working_dir() {
        let dir = TempDir::new().expect("temp dir");
        let root = utf8_root(&dir);
        let parent = root.parent().expect("temp dir has a parent");
        std::fs::write(
            root.join(CONFIG_FILE_NAME),
            format!(
                "staging_dir = \"{parent}\"\nsource_file = \"/srv/app/handler.py\"\narchive_path = \"/srv/out/app.zip\"\n"
            ),
        )
        .expect("write config");

        let err = PackageConfig::discover(None, &root).expect_err("staging above working dir");
        assert!(
            matches!(err, PackagerError::UnsafeStagingDir { ref reason, .. } if reason.contains("working directory")),
            "got: {err}"
        );
    }

    #[test]
    fn check_staging_dir_accepts_sibling_directories() {
        let config = PackageConfig::default().anchored_at(Utf8Path::new("/work"));
        assert!(config.check_staging_dir(Some(Utf8Path::new("/work"))).is_ok());
    }

    #[test]
    fn anchored_at_leaves_absolute_paths_alone() {
        let config = PackageConfig {
            archive_path: Utf8PathBuf::from("/srv/out.zip"),
            ..PackageConfig::default()
        }
        .anchored_at(Utf8Path::new("/work"));

        assert_eq!(config.archive_path, "/srv/out.zip");
        assert_eq!(config.source_file, "/work/lambda/lambda_function.py");
    }
}
