//! `gitdiagram cost` command.

use crate::context::ServiceContext;
use crate::credentials::AiPlatform;
use crate::repo_ref::RepoRef;
use crate::session::DiagramSession;

/// Execute the `cost` command.
///
/// # Errors
///
/// Returns an error string if the repository is invalid or the service
/// cannot estimate the cost.
pub async fn run(ctx: &ServiceContext, repo: &str, ai_platform: AiPlatform) -> Result<(), String> {
    let repo: RepoRef = repo.parse()?;
    let mut session = DiagramSession::new(ctx, repo, ai_platform);
    let view = session.cost().await;
    if let Some(failure) = view.failure() {
        return Err(failure.to_string());
    }
    println!("{}", view.cost.as_deref().unwrap_or_default());
    Ok(())
}
