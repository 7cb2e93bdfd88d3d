//! Credential slots and one-time flags on top of the key-value store.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::warn;

use crate::ports::store::KeyValueStore;

/// Flag set once the first generation has completed.
pub const FREE_GENERATION_FLAG: &str = "has_used_free_generation";

/// AI provider the generation service should run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiPlatform {
    /// OpenAI models.
    #[default]
    OpenAi,
    /// Anthropic models.
    Anthropic,
    /// DeepSeek models.
    DeepSeek,
}

impl AiPlatform {
    /// Every supported provider.
    pub const ALL: [Self; 3] = [Self::OpenAi, Self::Anthropic, Self::DeepSeek];

    /// Identifier sent to the service as `ai_platform`.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Slot holding this provider's API key.
    #[must_use]
    pub fn slot(self) -> CredentialSlot {
        match self {
            Self::OpenAi => CredentialSlot::OpenAiKey,
            Self::Anthropic => CredentialSlot::AnthropicKey,
            Self::DeepSeek => CredentialSlot::DeepSeekKey,
        }
    }

    /// Prefix every key for this provider starts with.
    #[must_use]
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::OpenAi | Self::DeepSeek => "sk-",
            Self::Anthropic => "sk-ant-",
        }
    }

    /// Parses a provider name. Unknown names fall back to OpenAI.
    #[must_use]
    pub fn parse_or_default(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(ai_platform = name, "unknown AI platform, using openai");
            Self::OpenAi
        })
    }
}

impl FromStr for AiPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown AI platform '{s}' (expected openai, anthropic or deepseek)"))
    }
}

impl fmt::Display for AiPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Source-hosting platform a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GitPlatform {
    /// github.com
    #[default]
    GitHub,
    /// gitlab.com
    GitLab,
    /// gitea.com
    Gitea,
}

impl GitPlatform {
    /// Every supported platform.
    pub const ALL: [Self; 3] = [Self::GitHub, Self::GitLab, Self::Gitea];

    /// Identifier sent to the service as `platform`.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
            Self::Gitea => "gitea",
        }
    }

    /// Public host of the platform.
    #[must_use]
    pub fn host(self) -> &'static str {
        match self {
            Self::GitHub => "github.com",
            Self::GitLab => "gitlab.com",
            Self::Gitea => "gitea.com",
        }
    }

    /// Slot holding the access token for private repositories.
    #[must_use]
    pub fn token_slot(self) -> CredentialSlot {
        match self {
            Self::GitHub => CredentialSlot::GitHubPat,
            Self::GitLab => CredentialSlot::GitLabToken,
            Self::Gitea => CredentialSlot::GiteaToken,
        }
    }

    /// Prefix issued tokens start with. Gitea tokens have none.
    #[must_use]
    pub fn token_prefix(self) -> &'static str {
        match self {
            Self::GitHub => "ghp_",
            Self::GitLab => "glpat-",
            Self::Gitea => "",
        }
    }

    /// Whether the stored token is sent when the caller supplies none.
    #[must_use]
    pub fn uses_stored_token(self) -> bool {
        matches!(self, Self::GitLab | Self::Gitea)
    }
}

impl FromStr for GitPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown platform '{s}' (expected github, gitlab or gitea)"))
    }
}

impl fmt::Display for GitPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Named storage slot for one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSlot {
    /// `openai_key`
    OpenAiKey,
    /// `anthropic_key`
    AnthropicKey,
    /// `deepseek_key`
    DeepSeekKey,
    /// `github_pat`
    GitHubPat,
    /// `gitlab_token`
    GitLabToken,
    /// `gitea_token`
    GiteaToken,
}

impl CredentialSlot {
    /// Every slot, AI keys first.
    pub const ALL: [Self; 6] = [
        Self::OpenAiKey,
        Self::AnthropicKey,
        Self::DeepSeekKey,
        Self::GitHubPat,
        Self::GitLabToken,
        Self::GiteaToken,
    ];

    /// Storage key of the slot.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::OpenAiKey => "openai_key",
            Self::AnthropicKey => "anthropic_key",
            Self::DeepSeekKey => "deepseek_key",
            Self::GitHubPat => "github_pat",
            Self::GitLabToken => "gitlab_token",
            Self::GiteaToken => "gitea_token",
        }
    }

    /// Prefix a well-formed value starts with.
    #[must_use]
    pub fn expected_prefix(self) -> &'static str {
        match self {
            Self::OpenAiKey => AiPlatform::OpenAi.key_prefix(),
            Self::AnthropicKey => AiPlatform::Anthropic.key_prefix(),
            Self::DeepSeekKey => AiPlatform::DeepSeek.key_prefix(),
            Self::GitHubPat => GitPlatform::GitHub.token_prefix(),
            Self::GitLabToken => GitPlatform::GitLab.token_prefix(),
            Self::GiteaToken => GitPlatform::Gitea.token_prefix(),
        }
    }
}

impl FromStr for CredentialSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        if let Some(slot) = Self::ALL.into_iter().find(|slot| slot.key() == wanted) {
            return Ok(slot);
        }
        // Accept provider and platform names as shorthands.
        if let Ok(ai) = wanted.parse::<AiPlatform>() {
            return Ok(ai.slot());
        }
        if let Ok(git) = wanted.parse::<GitPlatform>() {
            return Ok(git.token_slot());
        }
        let known: Vec<&str> = Self::ALL.iter().map(|slot| slot.key()).collect();
        Err(format!("Unknown credential slot '{s}' (expected one of: {})", known.join(", ")))
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Reads and writes credentials through a [`KeyValueStore`].
///
/// Empty stored values are treated as absent; setting an empty value
/// clears the slot.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn KeyValueStore>,
}

impl Credentials {
    /// Wraps a key-value store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Returns the value in `slot`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self, slot: CredentialSlot) -> Result<Option<String>, String> {
        let value = self
            .store
            .get(slot.key())
            .map_err(|e| format!("Failed to read credential {slot}: {e}"))?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    /// Stores `value` in `slot`, or clears the slot when `value` is blank.
    ///
    /// A value that lacks the slot's expected prefix is stored anyway
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn set(&self, slot: CredentialSlot, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return self.clear(slot);
        }
        if !value.starts_with(slot.expected_prefix()) {
            warn!(%slot, prefix = slot.expected_prefix(), "credential does not have the expected prefix");
        }
        self.store
            .set(slot.key(), value)
            .map_err(|e| format!("Failed to store credential {slot}: {e}"))
    }

    /// Removes the value in `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear(&self, slot: CredentialSlot) -> Result<(), String> {
        self.store
            .remove(slot.key())
            .map_err(|e| format!("Failed to clear credential {slot}: {e}"))
    }

    /// API key for `platform`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn api_key(&self, platform: AiPlatform) -> Result<Option<String>, String> {
        self.get(platform.slot())
    }

    /// Access token for `platform`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn git_token(&self, platform: GitPlatform) -> Result<Option<String>, String> {
        self.get(platform.token_slot())
    }

    /// Whether a generation has already completed on this machine.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn has_used_free_generation(&self) -> Result<bool, String> {
        let value = self
            .store
            .get(FREE_GENERATION_FLAG)
            .map_err(|e| format!("Failed to read {FREE_GENERATION_FLAG}: {e}"))?;
        Ok(value.as_deref() == Some("true"))
    }

    /// Records that the free generation has been used.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn mark_free_generation_used(&self) -> Result<(), String> {
        self.store
            .set(FREE_GENERATION_FLAG, "true")
            .map_err(|e| format!("Failed to write {FREE_GENERATION_FLAG}: {e}"))
    }
}

/// Shortens a secret for display, keeping only the prefix.
#[must_use]
pub fn masked(secret: &str) -> String {
    let shown: String = secret.chars().take(6).collect();
    if secret.chars().count() <= 6 {
        "*".repeat(secret.chars().count())
    } else {
        format!("{shown}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    fn credentials(entries: &[(&str, &str)]) -> Credentials {
        Credentials::new(Arc::new(MemoryStore::with_entries(entries.iter().copied())))
    }

    #[test]
    fn parses_slots_and_shorthands() {
        assert_eq!("openai_key".parse::<CredentialSlot>(), Ok(CredentialSlot::OpenAiKey));
        assert_eq!("Anthropic".parse::<CredentialSlot>(), Ok(CredentialSlot::AnthropicKey));
        assert_eq!("gitlab".parse::<CredentialSlot>(), Ok(CredentialSlot::GitLabToken));
        assert!("bitbucket".parse::<CredentialSlot>().unwrap_err().contains("github_pat"));
    }

    #[test]
    fn unknown_ai_platform_falls_back_to_openai() {
        assert_eq!(AiPlatform::parse_or_default("deepseek"), AiPlatform::DeepSeek);
        assert_eq!(AiPlatform::parse_or_default("gemini"), AiPlatform::OpenAi);
        assert_eq!(AiPlatform::parse_or_default("gemini").slot().key(), "openai_key");
    }

    #[test]
    fn blank_values_read_as_absent() {
        let creds = credentials(&[("openai_key", ""), ("gitea_token", "abc123")]);
        assert_eq!(creds.api_key(AiPlatform::OpenAi), Ok(None));
        assert_eq!(creds.git_token(GitPlatform::Gitea), Ok(Some("abc123".into())));
    }

    #[test]
    fn setting_blank_clears_the_slot() {
        let creds = credentials(&[]);
        creds.set(CredentialSlot::AnthropicKey, "sk-ant-123").unwrap();
        assert_eq!(creds.api_key(AiPlatform::Anthropic), Ok(Some("sk-ant-123".into())));
        creds.set(CredentialSlot::AnthropicKey, "  ").unwrap();
        assert_eq!(creds.api_key(AiPlatform::Anthropic), Ok(None));
    }

    #[test]
    fn free_generation_flag() {
        let creds = credentials(&[]);
        assert_eq!(creds.has_used_free_generation(), Ok(false));
        creds.mark_free_generation_used().unwrap();
        assert_eq!(creds.has_used_free_generation(), Ok(true));
    }

    #[test]
    fn only_gitlab_and_gitea_fall_back_to_stored_tokens() {
        assert!(!GitPlatform::GitHub.uses_stored_token());
        assert!(GitPlatform::GitLab.uses_stored_token());
        assert!(GitPlatform::Gitea.uses_stored_token());
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(masked("sk-ant-abcdef"), "sk-ant…");
        assert_eq!(masked("abc"), "***");
    }
}
