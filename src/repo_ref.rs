//! Parsing repository references given on the command line.

use std::fmt;
use std::str::FromStr;

use crate::credentials::GitPlatform;

/// Host that serves diagrams for GitHub repositories under the same path.
const DIAGRAM_HOST: &str = "gitdiagram.com";

/// A repository on one of the supported platforms.
///
/// Username and repository name are lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Hosting platform.
    pub platform: GitPlatform,
    /// Owner of the repository.
    pub username: String,
    /// Repository name without a `.git` suffix.
    pub repo: String,
}

impl RepoRef {
    /// Builds a reference from its parts.
    #[must_use]
    pub fn new(platform: GitPlatform, username: &str, repo: &str) -> Self {
        Self {
            platform,
            username: username.to_lowercase(),
            repo: repo.strip_suffix(".git").unwrap_or(repo).to_lowercase(),
        }
    }

    /// Web URL of the repository.
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}/{}/{}", self.platform.host(), self.username, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.platform, self.username, self.repo)
    }
}

fn platform_for_host(host: &str) -> Option<GitPlatform> {
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host == DIAGRAM_HOST {
        return Some(GitPlatform::GitHub);
    }
    GitPlatform::ALL.into_iter().find(|p| p.host() == host)
}

impl FromStr for RepoRef {
    type Err = String;

    /// Accepts `https://github.com/user/repo`, `gitlab.com/user/repo.git`,
    /// `gitea/user/repo` or a bare `user/repo` (GitHub).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let without_scheme = input
            .strip_prefix("https://")
            .or_else(|| input.strip_prefix("http://"))
            .unwrap_or(input);
        let segments: Vec<&str> =
            without_scheme.split('/').filter(|segment| !segment.is_empty()).collect();

        let invalid = || {
            format!(
                "Invalid repository '{s}': expected a URL like https://github.com/user/repo \
                 or platform/user/repo"
            )
        };

        let (platform, rest) = match segments.as_slice() {
            [] | [_] => return Err(invalid()),
            [first, rest @ ..] => {
                let first = first.to_lowercase();
                if let Some(platform) = platform_for_host(&first) {
                    (platform, rest)
                } else if let Ok(platform) = first.parse::<GitPlatform>() {
                    (platform, rest)
                } else if first.contains('.') {
                    return Err(format!(
                        "Unsupported host '{first}': only github.com, gitlab.com and gitea.com are supported"
                    ));
                } else if segments.len() == 2 {
                    (GitPlatform::GitHub, segments.as_slice())
                } else {
                    return Err(invalid());
                }
            }
        };

        match rest {
            [username, repo, ..] if !repo.strip_suffix(".git").unwrap_or(*repo).is_empty() => {
                Ok(Self::new(platform, username, repo))
            }
            _ => Err(invalid()),
        }
    }
}
