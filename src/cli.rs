//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI parser for `gitdiagram`.
#[derive(Debug, Parser)]
#[command(
    name = "gitdiagram",
    version,
    about = "Turn a Git repository into an architecture diagram"
)]
pub struct Cli {
    /// AI provider to generate with (openai, anthropic, deepseek).
    /// Overrides `GITDIAGRAM_AI_PLATFORM`.
    #[arg(long, global = true)]
    pub ai_platform: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// A repository given as a URL or `platform/user/repo`.
#[derive(Debug, Args)]
pub struct RepoArg {
    /// Repository, e.g. `https://github.com/user/repo` or `gitlab/user/repo`.
    pub repo: String,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the cached diagram, or estimate the cost and generate one.
    Generate {
        #[command(flatten)]
        target: RepoArg,
        /// Store this key for the AI provider and generate with it.
        #[arg(long)]
        api_key: Option<String>,
        /// Access token for a private repository (not stored).
        #[arg(long)]
        git_token: Option<String>,
    },
    /// Generate again with extra instructions.
    Modify {
        #[command(flatten)]
        target: RepoArg,
        /// What to change about the diagram.
        instructions: String,
    },
    /// Estimate the cost and generate from scratch.
    Regenerate {
        #[command(flatten)]
        target: RepoArg,
        /// Optional instructions for the new diagram.
        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// Print what a generation would cost.
    Cost {
        #[command(flatten)]
        target: RepoArg,
    },
    /// Print the cached diagram and explanation.
    Show {
        #[command(flatten)]
        target: RepoArg,
    },
    /// Write the cached diagram source to a file or stdout.
    Export {
        #[command(flatten)]
        target: RepoArg,
        /// Destination file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage stored API keys and access tokens.
    Key {
        /// The key operation.
        #[command(subcommand)]
        action: KeyAction,
    },
}

/// Operations on stored credentials.
#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Store a credential. Slots: openai, anthropic, deepseek, github, gitlab, gitea.
    Set {
        /// Slot name, e.g. `openai` or `gitlab_token`.
        slot: String,
        /// The secret. An empty value clears the slot.
        value: String,
    },
    /// Remove a stored credential.
    Clear {
        /// Slot name.
        slot: String,
    },
    /// List slots and whether they are set.
    List,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, KeyAction};
    use clap::Parser;

    #[test]
    fn parses_generate_with_options() {
        let cli = Cli::parse_from([
            "gitdiagram",
            "generate",
            "acme/widgets",
            "--api-key",
            "sk-1",
            "--ai-platform",
            "anthropic",
        ]);
        assert_eq!(cli.ai_platform.as_deref(), Some("anthropic"));
        match cli.command {
            Command::Generate { target, api_key, git_token } => {
                assert_eq!(target.repo, "acme/widgets");
                assert_eq!(api_key.as_deref(), Some("sk-1"));
                assert!(git_token.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_modify_instructions() {
        let cli = Cli::parse_from(["gitdiagram", "modify", "acme/widgets", "add the queue"]);
        assert!(matches!(
            cli.command,
            Command::Modify { instructions, .. } if instructions == "add the queue"
        ));
    }

    #[test]
    fn parses_key_subcommands() {
        let cli = Cli::parse_from(["gitdiagram", "key", "set", "openai", "sk-1"]);
        assert!(matches!(cli.command, Command::Key { action: KeyAction::Set { .. } }));
        let cli = Cli::parse_from(["gitdiagram", "key", "list"]);
        assert!(matches!(cli.command, Command::Key { action: KeyAction::List }));
    }

    #[test]
    fn modify_requires_instructions() {
        assert!(Cli::try_parse_from(["gitdiagram", "modify", "acme/widgets"]).is_err());
    }
}
