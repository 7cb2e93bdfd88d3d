//! Runtime configuration read from the environment.

use std::path::PathBuf;

/// Generation service used when `GITDIAGRAM_API_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.gitdiagram.com";

/// Local state directory used when `GITDIAGRAM_HOME` is unset.
pub const DEFAULT_HOME: &str = ".gitdiagram";

/// AI provider used when `GITDIAGRAM_AI_PLATFORM` is unset.
pub const DEFAULT_AI_PLATFORM: &str = "openai";

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the generation service, without a trailing slash.
    pub base_url: String,
    /// Directory holding credentials and cached diagrams.
    pub home: PathBuf,
    /// Default AI provider for new generations.
    pub ai_platform: String,
    /// Write a cassette of every service interaction to this path.
    pub record: Option<PathBuf>,
    /// Serve service interactions from this cassette instead of the network.
    pub replay: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Reads the configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            base_url: var("GITDIAGRAM_API_URL")
                .map_or_else(|| DEFAULT_BASE_URL.to_string(), |url| url.trim_end_matches('/').to_string()),
            home: var("GITDIAGRAM_HOME").map_or_else(|| PathBuf::from(DEFAULT_HOME), PathBuf::from),
            ai_platform: var("GITDIAGRAM_AI_PLATFORM")
                .map_or_else(|| DEFAULT_AI_PLATFORM.to_string(), |p| p.to_lowercase()),
            record: var("GITDIAGRAM_RECORD").map(PathBuf::from),
            replay: var("GITDIAGRAM_REPLAY").map(PathBuf::from),
        }
    }

    /// Path of the credential store.
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.home.join("credentials.json")
    }

    /// Root directory of the diagram cache.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.home.join("cache")
    }
}
