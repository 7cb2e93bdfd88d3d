//! A diagram session for one repository.
//!
//! Wraps the [`StreamController`] with everything that happens around a
//! generation: the diagram cache, cost estimates, stored credentials and
//! the bookkeeping done once a diagram is complete.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::context::ServiceContext;
use crate::credentials::{AiPlatform, Credentials, GitPlatform};
use crate::error::GenerationError;
use crate::ports::cache::{CachedDiagram, DiagramCache};
use crate::ports::clock::Clock;
use crate::ports::generation::{GenerationRequest, GenerationService};
use crate::repo_ref::RepoRef;
use crate::stream::{Outcome, Snapshot, StreamController, StreamState, StreamStatus};

/// Repositories showcased by the service. Their diagrams are fixed.
pub const EXAMPLE_REPOS: [&str; 5] = ["fastapi", "streamlit", "flask", "api-analytics", "monkeytype"];

/// Explanation cached when a completed generation carried none.
pub const NO_EXPLANATION: &str = "No explanation provided";

/// Shown when a step fails for a reason the service did not explain.
pub const SOMETHING_WENT_WRONG: &str = "Something went wrong. Please try again later.";

/// Whether an error message asks the user for their own AI key.
#[must_use]
pub fn needs_api_key(message: &str) -> bool {
    message.contains("API key")
}

/// Whether `repo` is one of the showcased example repositories.
#[must_use]
pub fn is_example_repo(repo: &str) -> bool {
    EXAMPLE_REPOS.iter().any(|example| example.eq_ignore_ascii_case(repo))
}

/// Everything a front end needs to render the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// The finished diagram, once there is one.
    pub diagram: String,
    /// Explanation that came with the finished diagram.
    pub explanation: String,
    /// Failure outside the stream itself (cost estimate, guards, storage).
    pub error: Option<String>,
    /// Estimated cost of the running generation.
    pub cost: Option<String>,
    /// When the diagram was last generated.
    pub last_generated: Option<DateTime<Utc>>,
    /// Latest stream state.
    pub state: StreamState,
    /// How the latest generation ended.
    pub outcome: Option<Outcome>,
    /// The diagram came from the cache, no generation ran.
    pub from_cache: bool,
}

impl SessionView {
    /// The message to show for a failed step, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.error.as_deref().or_else(|| {
            (self.state.status == StreamStatus::Error)
                .then(|| self.state.error.as_deref().unwrap_or_default())
        })
    }

    /// Whether the latest generation ended without a terminal event.
    #[must_use]
    pub fn stalled(&self) -> bool {
        self.outcome == Some(Outcome::Stalled)
    }
}

type Observer = Box<dyn FnMut(&StreamState) + Send>;

/// Generates, caches and exports the diagram of one repository.
pub struct DiagramSession {
    repo: RepoRef,
    ai_platform: AiPlatform,
    controller: StreamController,
    generator: Arc<dyn GenerationService>,
    credentials: Credentials,
    cache: Arc<dyn DiagramCache>,
    clock: Arc<dyn Clock>,
    observer: Option<Observer>,
    git_token: Option<String>,
    view: SessionView,
}

impl DiagramSession {
    /// Creates a session using the adapters of `ctx`.
    pub fn new(ctx: &ServiceContext, repo: RepoRef, ai_platform: AiPlatform) -> Self {
        Self {
            repo,
            ai_platform,
            controller: StreamController::new(Arc::clone(&ctx.generator)),
            generator: Arc::clone(&ctx.generator),
            credentials: Credentials::new(Arc::clone(&ctx.store)),
            cache: Arc::clone(&ctx.cache),
            clock: Arc::clone(&ctx.clock),
            observer: None,
            git_token: None,
            view: SessionView::default(),
        }
    }

    /// Calls `observer` with every stream state seen while generating.
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(&StreamState) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Sends `git_token` instead of any stored token.
    #[must_use]
    pub fn with_git_token(mut self, git_token: Option<String>) -> Self {
        self.git_token = git_token.filter(|t| !t.trim().is_empty());
        self
    }

    /// The repository this session is bound to.
    #[must_use]
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    /// AI provider used for the next generation.
    #[must_use]
    pub fn ai_platform(&self) -> AiPlatform {
        self.ai_platform
    }

    /// Current view of the session.
    #[must_use]
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    /// Whether the current failure can be fixed by supplying an AI key.
    #[must_use]
    pub fn needs_api_key(&self) -> bool {
        self.view.failure().is_some_and(needs_api_key)
    }

    /// Shows the cached diagram, or estimates the cost and generates one.
    pub async fn load(&mut self) -> &SessionView {
        if self.load_cached() || self.view.error.is_some() {
            return &self.view;
        }
        let git_token = self.fallback_git_token();
        if self.estimate_cost(git_token.clone()).await {
            self.generate("", git_token).await;
        }
        &self.view
    }

    /// Fills the view from the diagram cache. Returns `true` on a hit.
    pub fn load_cached(&mut self) -> bool {
        self.reset_for_request();
        match self.cache.get(&self.repo.username, &self.repo.repo) {
            Ok(Some(cached)) => {
                debug!(repo = %self.repo, "serving cached diagram");
                self.view.last_generated = Some(cached.last_successful_update);
                self.view.diagram = cached.diagram;
                self.view.explanation = cached.explanation;
                self.view.from_cache = true;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(repo = %self.repo, error = %e, "failed to read diagram cache");
                self.view.error = Some(SOMETHING_WENT_WRONG.to_string());
                false
            }
        }
    }

    /// Asks the service what a generation would cost, without generating.
    pub async fn cost(&mut self) -> &SessionView {
        self.reset_for_request();
        let git_token = self.fallback_git_token();
        self.estimate_cost(git_token).await;
        &self.view
    }

    /// Generates again with extra instructions.
    pub async fn modify(&mut self, instructions: &str) -> &SessionView {
        self.reset_for_request();
        if is_example_repo(&self.repo.repo) {
            self.view.error = Some("Example repositories cannot be modified.".to_string());
            return &self.view;
        }
        self.generate(instructions, None).await;
        &self.view
    }

    /// Estimates the cost, then generates from scratch with `instructions`.
    pub async fn regenerate(&mut self, instructions: &str) -> &SessionView {
        self.reset_for_request();
        if is_example_repo(&self.repo.repo) {
            self.view.error = Some("Example repositories cannot be regenerated.".to_string());
            return &self.view;
        }
        let git_token = self.fallback_git_token();
        if self.estimate_cost(git_token.clone()).await {
            self.generate(instructions, git_token).await;
        }
        &self.view
    }

    /// Stores `api_key` for `ai_platform`, switches to that provider and
    /// generates with it.
    pub async fn submit_api_key(&mut self, api_key: &str, ai_platform: AiPlatform) -> &SessionView {
        self.reset_for_request();
        self.ai_platform = ai_platform;
        if let Err(e) = self.credentials.set(ai_platform.slot(), api_key) {
            warn!(error = %e, "failed to store API key");
            self.view.error =
                Some(format!("Failed to generate diagram with provided {ai_platform} API key."));
            return &self.view;
        }
        let github_pat = self
            .credentials
            .git_token(GitPlatform::GitHub)
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to read GitHub token");
                None
            });
        self.generate("", self.git_token.clone().or(github_pat)).await;
        &self.view
    }

    /// Runs one generation to its end.
    ///
    /// `git_token` falls back to the stored token on platforms that use
    /// one. Progress goes to the observer; the final state lands in the
    /// view, and a completed diagram is cached.
    pub async fn generate(&mut self, instructions: &str, git_token: Option<String>) -> &SessionView {
        let git_token = git_token.or_else(|| self.fallback_git_token());
        let api_key = self.credentials.api_key(self.ai_platform).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read API key");
            None
        });
        let used_own_key = api_key.is_some();
        let request = GenerationRequest::new(
            self.repo.platform.id(),
            &self.repo.username,
            &self.repo.repo,
            self.ai_platform.id(),
        )
        .with_instructions(instructions)
        .with_api_key(api_key)
        .with_git_token(git_token);

        let mut updates = self.controller.subscribe();
        let request_id = match self.controller.start(request) {
            Ok(id) => id,
            Err(err) => {
                self.view.state = StreamState::failed(err.stream_message());
                self.view.outcome = Some(Outcome::Failed);
                return &self.view;
            }
        };
        info!(repo = %self.repo, ai_platform = %self.ai_platform, request_id, "generating diagram");

        let last = loop {
            let snapshot: Snapshot = updates.borrow_and_update().clone();
            if snapshot.request_id == request_id {
                if let Some(observer) = self.observer.as_mut() {
                    observer(&snapshot.state);
                }
                if snapshot.outcome.is_some() {
                    break snapshot;
                }
            } else if snapshot.request_id > request_id {
                break Snapshot { outcome: Some(Outcome::Superseded), ..snapshot };
            }
            if updates.changed().await.is_err() {
                break self.controller.snapshot();
            }
        };

        self.view.state = last.state;
        self.view.outcome = last.outcome;
        match self.view.outcome {
            Some(Outcome::Complete) => self.complete(used_own_key),
            Some(Outcome::Stalled) => {
                warn!(repo = %self.repo, status = %self.view.state.status, "generation stalled");
            }
            _ => {}
        }
        &self.view
    }

    /// Writes the diagram source to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no diagram yet or `out` fails.
    pub fn export<W: Write>(&self, out: &mut W) -> Result<(), String> {
        if self.view.diagram.is_empty() {
            return Err(format!("No diagram available for {}", self.repo));
        }
        writeln!(out, "{}", self.view.diagram.trim_end())
            .map_err(|e| format!("Failed to write diagram: {e}"))
    }

    fn reset_for_request(&mut self) {
        self.view.error = None;
        self.view.cost = None;
        self.view.from_cache = false;
    }

    /// The token given to [`DiagramSession::with_git_token`], else the
    /// stored one on platforms that use it.
    fn fallback_git_token(&self) -> Option<String> {
        if self.git_token.is_some() {
            return self.git_token.clone();
        }
        if !self.repo.platform.uses_stored_token() {
            return None;
        }
        self.credentials.git_token(self.repo.platform).unwrap_or_else(|e| {
            warn!(error = %e, "failed to read stored git token");
            None
        })
    }

    /// Returns `false` (with the error in the view) when generation
    /// should not go ahead.
    async fn estimate_cost(&mut self, git_token: Option<String>) -> bool {
        let request = GenerationRequest::new(
            self.repo.platform.id(),
            &self.repo.username,
            &self.repo.repo,
            self.ai_platform.id(),
        )
        .with_git_token(git_token);
        match self.generator.estimate_cost(&request).await {
            Ok(estimate) => {
                self.view.cost = Some(estimate.cost);
                true
            }
            Err(GenerationError::Service(message)) => {
                warn!(repo = %self.repo, %message, "cost estimation failed");
                self.view.error = Some(message);
                false
            }
            Err(err) => {
                warn!(repo = %self.repo, error = %err, "cost estimation failed");
                self.view.error = Some(SOMETHING_WENT_WRONG.to_string());
                false
            }
        }
    }

    fn complete(&mut self, used_own_key: bool) {
        let Some(diagram) = self.view.state.diagram.clone().filter(|d| !d.is_empty()) else {
            return;
        };
        let explanation = self
            .view
            .state
            .explanation
            .clone()
            .unwrap_or_else(|| NO_EXPLANATION.to_string());
        let now = self.clock.now();
        let entry = CachedDiagram {
            diagram: diagram.clone(),
            explanation: explanation.clone(),
            used_own_key,
            last_successful_update: now,
        };
        if let Err(e) = self.cache.put(&self.repo.username, &self.repo.repo, &entry) {
            warn!(repo = %self.repo, error = %e, "failed to cache diagram");
        }
        self.view.diagram = diagram;
        self.view.explanation = explanation;
        self.view.last_generated = match self.cache.last_generated(&self.repo.username, &self.repo.repo) {
            Ok(Some(date)) => Some(date),
            Ok(None) => Some(now),
            Err(e) => {
                warn!(error = %e, "failed to read last generation date");
                Some(now)
            }
        };

        match self.credentials.has_used_free_generation() {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = self.credentials.mark_free_generation_used() {
                    warn!(error = %e, "failed to record free generation");
                }
            }
            Err(e) => warn!(error = %e, "failed to read free generation flag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        MemoryDiagramCache, MemoryStore, ScriptedGenerationService, ScriptedStream,
    };
    use crate::credentials::FREE_GENERATION_FLAG;
    use crate::ports::clock::FixedClock;
    use crate::ports::generation::CostEstimate;
    use crate::ports::store::KeyValueStore;
    use crate::stream::{Buffer, StreamEvent};
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct Fixture {
        service: Arc<ScriptedGenerationService>,
        store: Arc<MemoryStore>,
        cache: Arc<MemoryDiagramCache>,
        ctx: ServiceContext,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
    }

    fn fixture(entries: &[(&str, &str)]) -> Fixture {
        let service = Arc::new(ScriptedGenerationService::new());
        let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        let cache = Arc::new(MemoryDiagramCache::new());
        let ctx = ServiceContext::from_parts(
            Arc::new(FixedClock(now())),
            store.clone(),
            cache.clone(),
            service.clone(),
        );
        Fixture { service, store, cache, ctx }
    }

    fn repo(s: &str) -> RepoRef {
        s.parse().unwrap()
    }

    fn completed_stream() -> ScriptedStream {
        ScriptedStream::from_events(&[
            StreamEvent::milestone(StreamStatus::Started, "Starting"),
            StreamEvent::chunk(Buffer::Explanation, "Layered"),
            StreamEvent::chunk(Buffer::Diagram, "flowchart TD"),
            StreamEvent::complete("Layered app", "flowchart TD\n  A-->B"),
        ])
    }

    #[tokio::test]
    async fn load_serves_cached_diagram_without_calling_the_service() {
        let f = fixture(&[]);
        f.cache
            .put(
                "acme",
                "widgets",
                &CachedDiagram {
                    diagram: "graph".into(),
                    explanation: "why".into(),
                    used_own_key: false,
                    last_successful_update: now(),
                },
            )
            .unwrap();
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        let view = session.load().await;
        assert!(view.from_cache);
        assert_eq!(view.diagram, "graph");
        assert_eq!(view.last_generated, Some(now()));
        assert!(f.service.requests().is_empty());
    }

    #[tokio::test]
    async fn load_estimates_cost_then_generates_and_caches() {
        let f = fixture(&[("openai_key", "sk-own")]);
        f.service.push_cost(Ok(CostEstimate { cost: "$0.03 USD".into() }));
        f.service.push_stream(completed_stream());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi)
            .with_observer(move |state| sink.lock().unwrap().push(state.status));

        let view = session.load().await.clone();
        assert_eq!(view.cost.as_deref(), Some("$0.03 USD"));
        assert_eq!(view.outcome, Some(Outcome::Complete));
        assert_eq!(view.diagram, "flowchart TD\n  A-->B");
        assert_eq!(view.last_generated, Some(now()));
        assert!(!view.from_cache);

        let cached = f.cache.get("acme", "widgets").unwrap().unwrap();
        assert!(cached.used_own_key);
        assert_eq!(cached.explanation, "Layered app");
        assert_eq!(f.store.get(FREE_GENERATION_FLAG).unwrap().as_deref(), Some("true"));

        let requests = f.service.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].api_key.as_deref(), Some("sk-own"));
        assert_eq!(seen.lock().unwrap().last(), Some(&StreamStatus::Complete));
    }

    #[tokio::test]
    async fn cost_error_stops_before_generation() {
        let f = fixture(&[]);
        f.service.push_cost(Err(GenerationError::Service("Repository not found".into())));
        let mut session = DiagramSession::new(&f.ctx, repo("acme/missing"), AiPlatform::OpenAi);
        let view = session.load().await;
        assert_eq!(view.failure(), Some("Repository not found"));
        assert_eq!(f.service.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_cost_error_is_generic() {
        let f = fixture(&[]);
        f.service.push_cost(Err(GenerationError::Transport("dns".into())));
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        assert_eq!(session.load().await.failure(), Some(SOMETHING_WENT_WRONG));
    }

    #[tokio::test]
    async fn example_repositories_are_refused() {
        let f = fixture(&[]);
        let mut session = DiagramSession::new(&f.ctx, repo("tiangolo/fastapi"), AiPlatform::OpenAi);
        assert_eq!(
            session.modify("more colour").await.failure(),
            Some("Example repositories cannot be modified.")
        );
        assert_eq!(
            session.regenerate("").await.failure(),
            Some("Example repositories cannot be regenerated.")
        );
        assert!(f.service.requests().is_empty());
    }

    #[tokio::test]
    async fn modify_sends_instructions_and_stored_gitlab_token() {
        let f = fixture(&[("gitlab_token", "glpat-1")]);
        f.service.push_stream(completed_stream());
        let mut session =
            DiagramSession::new(&f.ctx, repo("gitlab/group/project"), AiPlatform::DeepSeek);
        session.modify("show the database").await;
        let request = &f.service.requests()[0];
        assert_eq!(request.instructions, "show the database");
        assert_eq!(request.git_token.as_deref(), Some("glpat-1"));
        assert_eq!(request.platform, "gitlab");
        assert_eq!(request.ai_platform, "deepseek");
        assert!(request.api_key.is_none());
        assert!(!f.cache.get("group", "project").unwrap().unwrap().used_own_key);
    }

    #[tokio::test]
    async fn github_does_not_fall_back_to_stored_pat() {
        let f = fixture(&[("github_pat", "ghp_1")]);
        f.service.push_stream(completed_stream());
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        session.generate("", None).await;
        assert!(f.service.requests()[0].git_token.is_none());
    }

    #[tokio::test]
    async fn submit_api_key_stores_key_and_uses_github_pat() {
        let f = fixture(&[("github_pat", "ghp_1")]);
        f.service.push_stream(completed_stream());
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        session.submit_api_key("sk-ant-9", AiPlatform::Anthropic).await;
        assert_eq!(session.ai_platform(), AiPlatform::Anthropic);
        assert_eq!(f.store.get("anthropic_key").unwrap().as_deref(), Some("sk-ant-9"));
        let request = &f.service.requests()[0];
        assert_eq!(request.api_key.as_deref(), Some("sk-ant-9"));
        assert_eq!(request.git_token.as_deref(), Some("ghp_1"));
        assert_eq!(
            Credentials::new(f.store.clone()).git_token(GitPlatform::GitHub),
            Ok(Some("ghp_1".into()))
        );
    }

    #[tokio::test]
    async fn stream_error_is_not_cached_and_suggests_api_key() {
        let f = fixture(&[]);
        f.service.push_stream(ScriptedStream::from_events(&[
            StreamEvent::milestone(StreamStatus::Started, "Starting"),
            StreamEvent::failure("Rate limit reached. Please add your own API key."),
        ]));
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        let view = session.generate("", None).await;
        assert_eq!(view.outcome, Some(Outcome::Failed));
        assert!(view.diagram.is_empty());
        assert!(session.needs_api_key());
        assert!(f.cache.is_empty());
        assert_eq!(f.store.get(FREE_GENERATION_FLAG).unwrap(), None);
    }

    #[tokio::test]
    async fn stalled_stream_is_reported_and_not_cached() {
        let f = fixture(&[]);
        f.service.push_stream(ScriptedStream::from_events(&[StreamEvent::chunk(
            Buffer::Diagram,
            "partial",
        )]));
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        let view = session.generate("", None).await;
        assert!(view.stalled());
        assert_eq!(view.failure(), None);
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn export_writes_the_diagram() {
        let f = fixture(&[]);
        f.service.push_stream(completed_stream());
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        let mut out = Vec::new();
        assert!(session.export(&mut out).is_err());

        session.generate("", None).await;
        session.export(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "flowchart TD\n  A-->B\n");
    }

    #[tokio::test]
    async fn explicit_git_token_wins_over_stored_one() {
        let f = fixture(&[("gitea_token", "stored")]);
        f.service.push_cost(Ok(CostEstimate { cost: "$0.01 USD".into() }));
        let mut session = DiagramSession::new(&f.ctx, repo("gitea/org/tool"), AiPlatform::OpenAi)
            .with_git_token(Some("given".into()));
        assert_eq!(session.cost().await.cost.as_deref(), Some("$0.01 USD"));
        assert_eq!(f.service.requests()[0].git_token.as_deref(), Some("given"));
    }

    #[tokio::test]
    async fn completion_without_explanation_caches_placeholder() {
        let f = fixture(&[]);
        f.service.push_stream(ScriptedStream::from_chunks(&[
            "data: {\"status\":\"complete\",\"diagram\":\"graph TD\"}\n\n",
        ]));
        let mut session = DiagramSession::new(&f.ctx, repo("acme/widgets"), AiPlatform::OpenAi);
        session.generate("", None).await;
        let cached = f.cache.get("acme", "widgets").unwrap().unwrap();
        assert_eq!(cached.explanation, NO_EXPLANATION);
        assert_eq!(cached.last_successful_update, now());
    }

    #[test]
    fn detects_api_key_errors() {
        assert!(needs_api_key("Please provide your own OpenAI API key"));
        assert!(!needs_api_key("Repository not found"));
        assert!(is_example_repo("FastAPI"));
        assert!(!is_example_repo("widgets"));
    }
}
