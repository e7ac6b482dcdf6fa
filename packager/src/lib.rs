//! Lambda packager library.
//!
//! This crate builds deployment archives for Python AWS Lambda functions: a
//! handler module and its third-party dependencies, installed with
//! `pip install --target`, zipped so both sit at the archive root. It is used
//! by the `lambda-packager` CLI binary and can be driven programmatically for
//! testing or custom build workflows.
//!
//! # Modules
//!
//! - [`archive`] - Deterministic zip creation and archive descriptors
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Package configuration loading and validation
//! - [`deps`] - Dependency installation through an external resolver
//! - [`error`] - Semantic error types for each build step
//! - [`function_name`] - Validated Lambda function names
//! - [`inspect`] - Pre-deployment archive checks
//! - [`lock`] - Exclusive per-archive build lock
//! - [`output`] - Human-readable reports
//! - [`packager`] - Build pipeline orchestration
//! - [`stager`] - Staging directory lifecycle

pub mod archive;
pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod function_name;
pub mod inspect;
pub mod lock;
pub mod output;
pub mod packager;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
