//! Lambda packager CLI entrypoint.
//!
//! This binary builds the deployment archive for a Python AWS Lambda function
//! and can inspect an existing archive before it is deployed.

use camino::Utf8PathBuf;
use clap::Parser;
use lambda_packager::cli::{BuildArgs, Cli, Command, CommonArgs, InspectArgs};
use lambda_packager::config::PackageConfig;
use lambda_packager::deps::SystemCommandExecutor;
use lambda_packager::error::{PackagerError, Result};
use lambda_packager::inspect::inspect_archive;
use lambda_packager::output::{inspection_summary, write_line};
use lambda_packager::packager::Packager;
use serde::Serialize;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Some(Command::Inspect(args)) => run_inspect(args, stdout),
        Some(Command::Build(args)) => run_build(args, stdout),
        None => run_build(&cli.build, stdout),
    }
}

/// Builds the archive, or prints the plan in dry-run mode.
fn run_build(args: &BuildArgs, stdout: &mut dyn Write) -> Result<()> {
    let config = load_config(&args.common)?;

    if args.dry_run {
        let executor = SystemCommandExecutor::default();
        let plan = Packager::new(config, &executor).plan();
        write_line(stdout, plan.to_string().trim_end());
        return Ok(());
    }

    let executor = SystemCommandExecutor::with_timeout(config.resolver.timeout());
    // JSON output replaces progress lines and the banner.
    let quiet = args.quiet || args.common.json;
    let packager = Packager::new(config, &executor).quiet(quiet);

    let descriptor = packager.build(stdout)?;
    if args.common.json {
        write_json(stdout, &descriptor)?;
    }
    Ok(())
}

/// Verifies an archive and reports its contents.
fn run_inspect(args: &InspectArgs, stdout: &mut dyn Write) -> Result<()> {
    let config = load_config(&args.common)?;
    let archive = match &args.archive {
        Some(path) => working_dir(&args.common)?.join(path),
        None => config.archive_path.clone(),
    };

    let descriptor = inspect_archive(&archive, &config.handler)?;
    if args.common.json {
        write_json(stdout, &descriptor)
    } else {
        write_line(stdout, inspection_summary(&descriptor).trim_end());
        Ok(())
    }
}

fn load_config(common: &CommonArgs) -> Result<PackageConfig> {
    let root = working_dir(common)?;
    let config = PackageConfig::discover(common.config.as_deref(), &root)?;
    log::debug!(
        "building {} from {} into {}",
        config.function_name,
        config.source_file,
        config.archive_path
    );
    Ok(config)
}

/// The directory relative paths are resolved against.
fn working_dir(common: &CommonArgs) -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| PackagerError::NonUtf8Path(e.into_path_buf()))?;
    Ok(match &common.directory {
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|e| PackagerError::WriteFailed { source: e.into() })?;
    writeln!(out).map_err(|source| PackagerError::WriteFailed { source })
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_line(stderr, format!("error: {err}"));
            1
        }
    }
}
