//! `gitdiagram generate`, `modify` and `regenerate` commands.

use crate::commands::progress::ProgressPrinter;
use crate::context::ServiceContext;
use crate::credentials::AiPlatform;
use crate::repo_ref::RepoRef;
use crate::session::{DiagramSession, SessionView};

/// Execute the `generate` command.
///
/// Prints the cached diagram when there is one. Otherwise estimates the
/// cost and streams a new diagram. With `api_key`, the key is stored for
/// `ai_platform` first and the generation always runs.
///
/// # Errors
///
/// Returns an error string if the repository is invalid or the
/// generation fails.
pub async fn run(
    ctx: &ServiceContext,
    repo: &str,
    ai_platform: AiPlatform,
    api_key: Option<&str>,
    git_token: Option<String>,
) -> Result<(), String> {
    let mut session = open(ctx, repo, ai_platform)?.with_git_token(git_token);
    let view = match api_key {
        Some(key) => session.submit_api_key(key, ai_platform).await,
        None => session.load().await,
    };
    report(view, ai_platform)
}

/// Execute the `modify` command.
///
/// # Errors
///
/// Returns an error string if the repository is invalid, is an example
/// repository, or the generation fails.
pub async fn modify(
    ctx: &ServiceContext,
    repo: &str,
    ai_platform: AiPlatform,
    instructions: &str,
) -> Result<(), String> {
    let mut session = open(ctx, repo, ai_platform)?;
    report(session.modify(instructions).await, ai_platform)
}

/// Execute the `regenerate` command.
///
/// # Errors
///
/// Returns an error string if the repository is invalid, is an example
/// repository, or the cost estimate or generation fails.
pub async fn regenerate(
    ctx: &ServiceContext,
    repo: &str,
    ai_platform: AiPlatform,
    instructions: &str,
) -> Result<(), String> {
    let mut session = open(ctx, repo, ai_platform)?;
    report(session.regenerate(instructions).await, ai_platform)
}

fn open(ctx: &ServiceContext, repo: &str, ai_platform: AiPlatform) -> Result<DiagramSession, String> {
    let repo: RepoRef = repo.parse()?;
    let mut printer = ProgressPrinter::new(std::io::stderr());
    Ok(DiagramSession::new(ctx, repo, ai_platform).with_observer(move |state| printer.observe(state)))
}

/// Prints the diagram to stdout and everything else to stderr.
fn report(view: &SessionView, ai_platform: AiPlatform) -> Result<(), String> {
    if let Some(cost) = &view.cost {
        eprintln!("Estimated cost: {cost}");
    }
    if let Some(failure) = view.failure() {
        return Err(with_hint(failure, ai_platform));
    }
    if view.stalled() {
        return Err(format!(
            "Generation stream ended before the diagram was complete (last status: {})",
            view.state.status
        ));
    }
    if view.diagram.is_empty() {
        return Err("The service returned no diagram".to_string());
    }
    if view.from_cache {
        eprintln!("Using cached diagram.");
    }
    if let Some(date) = view.last_generated {
        eprintln!("Last generated: {}", date.format("%Y-%m-%d %H:%M UTC"));
    }
    println!("{}", view.diagram.trim_end());
    Ok(())
}

fn with_hint(failure: &str, ai_platform: AiPlatform) -> String {
    if crate::session::needs_api_key(failure) {
        format!(
            "{failure}\nHint: store your own key with `gitdiagram key set {ai_platform} <KEY>` \
             or pass `--api-key <KEY>`."
        )
    } else {
        failure.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        MemoryDiagramCache, MemoryStore, ScriptedGenerationService, ScriptedStream,
    };
    use crate::ports::clock::FixedClock;
    use crate::ports::generation::CostEstimate;
    use crate::stream::{StreamEvent, StreamStatus};
    use chrono::Utc;
    use std::sync::Arc;

    fn context(service: &Arc<ScriptedGenerationService>) -> ServiceContext {
        ServiceContext::from_parts(
            Arc::new(FixedClock(Utc::now())),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryDiagramCache::new()),
            service.clone(),
        )
    }

    #[tokio::test]
    async fn generate_succeeds_on_complete() {
        let service = Arc::new(ScriptedGenerationService::new());
        service.push_cost(Ok(CostEstimate { cost: "$0.01 USD".into() }));
        service.push_stream(ScriptedStream::from_events(&[StreamEvent::complete("e", "graph TD")]));
        let ctx = context(&service);
        assert!(run(&ctx, "acme/widgets", AiPlatform::OpenAi, None, None).await.is_ok());
    }

    #[tokio::test]
    async fn generate_adds_hint_for_key_errors() {
        let service = Arc::new(ScriptedGenerationService::new());
        service.push_cost(Ok(CostEstimate { cost: "$0.01 USD".into() }));
        service.push_stream(ScriptedStream::from_events(&[StreamEvent::failure(
            "Please provide an API key",
        )]));
        let ctx = context(&service);
        let err = run(&ctx, "acme/widgets", AiPlatform::Anthropic, None, None).await.unwrap_err();
        assert!(err.starts_with("Please provide an API key"));
        assert!(err.contains("gitdiagram key set anthropic"));
    }

    #[tokio::test]
    async fn stalled_generation_is_an_error() {
        let service = Arc::new(ScriptedGenerationService::new());
        service.push_stream(ScriptedStream::from_events(&[StreamEvent::milestone(
            StreamStatus::DiagramSent,
            "Sending diagram",
        )]));
        let ctx = context(&service);
        let err = modify(&ctx, "acme/widgets", AiPlatform::OpenAi, "more").await.unwrap_err();
        assert!(err.contains("last status: diagram_sent"));
    }

    #[tokio::test]
    async fn invalid_repository_is_rejected_before_any_request() {
        let service = Arc::new(ScriptedGenerationService::new());
        let ctx = context(&service);
        assert!(regenerate(&ctx, "not-a-repo", AiPlatform::OpenAi, "").await.is_err());
        assert!(service.requests().is_empty());
    }
}
