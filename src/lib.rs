//! Core library entry for the `gitdiagram` CLI.
//!
//! The heart of the crate is [`stream::StreamController`], which opens a
//! generation against the remote service and folds its server-sent events
//! into a [`stream::StreamState`]. [`session::DiagramSession`] adds the
//! cache, cost estimates and stored credentials around it.

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod ports;
pub mod repo_ref;
pub mod session;
pub mod stream;

use clap::Parser;

/// Run the CLI with the provided arguments and environment configuration.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    run_with_config(args, &config::Config::from_env())
}

/// Run the CLI with an explicit configuration.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run_with_config<I, T>(args: I, config: &config::Config) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli, config)
}
