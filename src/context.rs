//! Service context bundling all port trait objects.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::adapters::live::{FileDiagramCache, FileStore, HttpGenerationService, LiveClock};
use crate::adapters::recording::RecordingGenerationService;
use crate::adapters::replaying::ReplayingGenerationService;
use crate::cassette::format::Cassette;
use crate::cassette::recorder::CassetteRecorder;
use crate::cassette::replayer::CassetteReplayer;
use crate::config::Config;
use crate::ports::cache::DiagramCache;
use crate::ports::clock::{Clock, FixedClock};
use crate::ports::generation::GenerationService;
use crate::ports::store::KeyValueStore;

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, replaying, recording).
pub struct ServiceContext {
    /// Clock used to stamp cached diagrams.
    pub clock: Arc<dyn Clock>,
    /// Credential slots and flags.
    pub store: Arc<dyn KeyValueStore>,
    /// Finished diagrams per repository.
    pub cache: Arc<dyn DiagramCache>,
    /// The remote generation service.
    pub generator: Arc<dyn GenerationService>,
    /// Optional cassette recorder; written to disk on drop.
    recorder: Option<Arc<Mutex<CassetteRecorder>>>,
}

impl ServiceContext {
    /// Creates a context from explicit adapters. Nothing is recorded.
    pub fn from_parts(
        clock: Arc<dyn Clock>,
        store: Arc<dyn KeyValueStore>,
        cache: Arc<dyn DiagramCache>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        Self { clock, store, cache, generator, recorder: None }
    }

    /// Creates a live context talking to `config.base_url`, with local
    /// state under `config.home`.
    #[must_use]
    pub fn live(config: &Config) -> Self {
        let (store, cache) = local_state(config);
        Self::from_parts(
            Arc::new(LiveClock),
            store,
            cache,
            Arc::new(HttpGenerationService::new(config.base_url.clone())),
        )
    }

    /// Creates a recording context that writes a cassette file on drop.
    ///
    /// Uses live adapters for actual work; every generation-service
    /// interaction is captured with credentials redacted.
    #[must_use]
    pub fn recording(config: &Config, path: &Path) -> Self {
        let live = Self::live(config);
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            "gitdiagram-session",
            config.base_url.clone(),
        )));
        let generator = Arc::new(RecordingGenerationService::new(
            Arc::clone(&live.generator),
            Arc::clone(&recorder),
        ));
        Self::from_parts(
            Arc::clone(&live.clock),
            Arc::clone(&live.store),
            Arc::clone(&live.cache),
            generator,
        )
        .with_recorder(recorder)
    }

    /// Creates a replaying context from a cassette file.
    ///
    /// The generation service is served from the cassette and the clock
    /// is frozen at the cassette's recording time. Credentials and the
    /// diagram cache still live under `config.home`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be read or parsed.
    pub fn replaying(config: &Config, path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
        let cassette: Cassette = serde_yaml::from_str(&content)
            .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;

        let (store, cache) = local_state(config);
        Ok(Self::from_parts(
            Arc::new(FixedClock(cassette.recorded_at)),
            store,
            cache,
            Arc::new(ReplayingGenerationService::new(CassetteReplayer::new(&cassette))),
        ))
    }

    /// Picks live, recording or replaying wiring from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if both recording and replay are requested, or
    /// the replay cassette cannot be loaded.
    pub fn from_config(config: &Config) -> Result<Self, String> {
        match (&config.record, &config.replay) {
            (Some(_), Some(_)) => {
                Err("GITDIAGRAM_RECORD and GITDIAGRAM_REPLAY cannot both be set".to_string())
            }
            (Some(record), None) => Ok(Self::recording(config, record)),
            (None, Some(replay)) => Self::replaying(config, replay),
            (None, None) => Ok(Self::live(config)),
        }
    }

    fn with_recorder(mut self, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        self.recorder = Some(recorder);
        self
    }
}

fn local_state(config: &Config) -> (Arc<dyn KeyValueStore>, Arc<dyn DiagramCache>) {
    (
        Arc::new(FileStore::new(config.credentials_path())),
        Arc::new(FileDiagramCache::new(config.cache_dir())),
    )
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            let recorder = recorder.lock().unwrap_or_else(PoisonError::into_inner);
            match recorder.save() {
                Ok(path) => info!(path = %path.display(), interactions = recorder.len(), "cassette saved"),
                Err(e) => warn!(error = %e, "failed to write cassette"),
            }
        }
    }
}
