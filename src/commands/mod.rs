//! Command dispatch and handlers.

pub mod cost;
pub mod generate;
pub mod key;
pub mod progress;
pub mod show;

use std::future::Future;

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::context::ServiceContext;
use crate::credentials::AiPlatform;

/// Dispatch a parsed command to its handler.
///
/// When `GITDIAGRAM_RECORD` is set, every generation-service interaction
/// is recorded to that cassette; `GITDIAGRAM_REPLAY` serves them from one.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(cli: &Cli, config: &Config) -> Result<(), String> {
    let ctx = ServiceContext::from_config(config)?;
    let ai_platform =
        AiPlatform::parse_or_default(cli.ai_platform.as_deref().unwrap_or(&config.ai_platform));

    // The context is dropped after the command so a recording is saved even on error.
    dispatch_with_context(&cli.command, &ctx, ai_platform)
}

/// Dispatch a command with the given service context.
fn dispatch_with_context(
    command: &Command,
    ctx: &ServiceContext,
    ai_platform: AiPlatform,
) -> Result<(), String> {
    match command {
        Command::Generate { target, api_key, git_token } => block_on(generate::run(
            ctx,
            &target.repo,
            ai_platform,
            api_key.as_deref(),
            git_token.clone(),
        ))?,
        Command::Modify { target, instructions } => {
            block_on(generate::modify(ctx, &target.repo, ai_platform, instructions))?
        }
        Command::Regenerate { target, instructions } => {
            block_on(generate::regenerate(ctx, &target.repo, ai_platform, instructions))?
        }
        Command::Cost { target } => block_on(cost::run(ctx, &target.repo, ai_platform))?,
        Command::Show { target } => show::run(ctx, &target.repo),
        Command::Export { target, output } => show::export(ctx, &target.repo, output.as_deref()),
        Command::Key { action } => key::run(ctx, action),
    }
}

/// Runs `future` to completion on a single-threaded runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;
    Ok(runtime.block_on(future))
}
