//! CLI argument definitions for the Lambda packager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "LAMBDA_PACKAGER_CONFIG";

/// Build deployment archives for Python AWS Lambda functions.
#[derive(Parser, Debug)]
#[command(name = "lambda-packager")]
#[command(version, about)]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = concat!(
    "Build a deployment archive for a Python AWS Lambda function.\n\n",
    "The handler source file is copied into a fresh staging directory, the ",
    "declared dependencies are installed beside it with `pip install --target`, ",
    "and the staging directory is zipped so that the handler module and its ",
    "dependencies sit at the archive root. Every build starts from scratch: the ",
    "previous archive and staging directory are deleted first.\n\n",
    "Without a configuration file the packager builds lambda_function.zip from ",
    "lambda/lambda_function.py with urllib3 as its only dependency.",
))]
#[command(after_help = concat!(
    "CONFIGURATION (lambda-packager.toml):\n",
    "  function_name = \"data-pipeline-etl\"\n",
    "  archive_path  = \"lambda_function.zip\"\n",
    "  source_file   = \"lambda/lambda_function.py\"\n",
    "  dependencies  = [\"urllib3\"]\n",
    "  staging_dir   = \"package\"\n",
    "  handler       = \"lambda_function.lambda_handler\"\n\n",
    "  [resolver]\n",
    "  program      = \"pip\"\n",
    "  extra_args   = []\n",
    "  timeout_secs = 300\n\n",
    "EXAMPLES:\n",
    "  Build with defaults or ./lambda-packager.toml:\n",
    "    $ lambda-packager\n\n",
    "  Show the steps without touching the disk:\n",
    "    $ lambda-packager --dry-run\n\n",
    "  Check an archive before deploying it:\n",
    "    $ lambda-packager inspect",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Build arguments (used when no subcommand is given).
    #[command(flatten)]
    pub build: BuildArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the deployment archive (default when no subcommand given).
    Build(BuildArgs),

    /// Verify an existing archive and list its contents.
    Inspect(InspectArgs),
}

/// Arguments shared by every command.
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Configuration file [default: ./lambda-packager.toml when present].
    #[arg(short, long, value_name = "FILE", env = CONFIG_ENV_VAR)]
    pub config: Option<Utf8PathBuf>,

    /// Run as if started in DIR.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<Utf8PathBuf>,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the build command.
#[derive(Parser, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Options shared with other commands.
    #[command(flatten)]
    pub common: CommonArgs,

    /// Show the build steps and exit without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Arguments for the inspect command.
#[derive(Parser, Debug, Clone, Default)]
pub struct InspectArgs {
    /// Options shared with other commands.
    #[command(flatten)]
    pub common: CommonArgs,

    /// Archive to inspect [default: the configured archive_path].
    #[arg(short, long, value_name = "PATH")]
    pub archive: Option<Utf8PathBuf>,
}

impl Cli {
    /// Returns the effective build arguments.
    ///
    /// If a `Build` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened top-level arguments, so that a bare
    /// `lambda-packager` builds.
    #[must_use]
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Some(Command::Build(args)) => args,
            Some(Command::Inspect(_)) | None => &self.build,
        }
    }

    /// Log level implied by the verbosity flags.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        let args = self.build_args();
        if args.quiet {
            return log::LevelFilter::Error;
        }
        match args.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
