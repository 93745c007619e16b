//! Drawable metadata loader
//!
//! Populates drawable details from the backing asset file without
//! blocking allocation work and without unbounded parallel I/O.
//!
//! # Architecture
//!
//! ```text
//! load(handle) ──→ DetailsCell::begin
//!                    ├─→ Ready    → return cached details
//!                    ├─→ Wait     → join the in-flight parse
//!                    └─→ Start    → spawn parse task
//!                                     ├─→ Semaphore (3 permits)
//!                                     └─→ AssetParser::parse_drawable_file
//! ```
//!
//! The parse always runs on its own task, so a caller giving up never
//! cancels it; the result lands in the cell even if the drawable is gone.

pub mod details;
pub mod mock;
pub mod parser;
pub mod state;

pub use details::{DetailWarning, DrawableDetails, EmbeddedTexture, Lod, ParsedDrawable};
pub use mock::MockParser;
pub use parser::AssetParser;
pub use state::{DetailsCell, DetailsHandle, LoadOutcome, LoadState};

use crate::config::LoaderConfig;
use crate::error::{Error, Result};
use state::Begin;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

/// Bounded-concurrency details loader
///
/// Clones share the same semaphore and parser.
#[derive(Clone)]
pub struct DetailsLoader {
    parser: Arc<dyn AssetParser>,
    semaphore: Arc<Semaphore>,
    config: LoaderConfig,
    polygon_limit: u32,
}

impl DetailsLoader {
    pub fn new(parser: Arc<dyn AssetParser>, config: LoaderConfig, polygon_limit: u32) -> Self {
        let permits = config.max_concurrent_loads.max(1);
        Self {
            parser,
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            polygon_limit,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Load details on demand, joining any parse already in flight
    pub async fn load(&self, handle: &DetailsHandle) -> Result<Arc<DrawableDetails>> {
        let rx = match handle.cell().begin() {
            Begin::Ready(details) => return Ok(details),
            Begin::Wait(rx) => rx,
            Begin::Start(tx, rx) => {
                if let Err(e) = handle.require_path() {
                    let _ = handle.cell().finish(Err(e.clone()), self.polygon_limit, tx);
                    return Err(e);
                }
                self.spawn_parse(handle.clone(), tx);
                rx
            }
        };
        self.wait(rx, handle).await
    }

    /// Start a background load if the drawable is unloaded
    ///
    /// Returns `false` when nothing was started: already loaded or loading,
    /// no backing file, or no tokio runtime on this thread.
    pub fn spawn_background(&self, handle: &DetailsHandle) -> bool {
        if handle.path().is_none() || tokio::runtime::Handle::try_current().is_err() {
            return false;
        }
        match handle.cell().begin() {
            Begin::Start(tx, _rx) => {
                self.spawn_parse(handle.clone(), tx);
                true
            }
            Begin::Ready(_) | Begin::Wait(_) => false,
        }
    }

    fn spawn_parse(&self, handle: DetailsHandle, tx: watch::Sender<Option<LoadOutcome>>) {
        let parser = self.parser.clone();
        let semaphore = self.semaphore.clone();
        let polygon_limit = self.polygon_limit;

        tokio::spawn(async move {
            let parsed = match semaphore.acquire_owned().await {
                Ok(_permit) => match handle.require_path() {
                    Ok(path) => {
                        debug!(drawable = %handle.name(), path = %path.display(), "Parsing drawable");
                        parser.parse_drawable_file(path).await
                    }
                    Err(e) => Err(e),
                },
                Err(e) => Err(Error::Parse(format!("Loader closed: {}", e))),
            };

            if let Err(e) = &parsed {
                warn!(drawable = %handle.name(), error = %e, "Failed to load drawable details");
            }
            let _ = handle.cell().finish(parsed, polygon_limit, tx);
        });
    }

    async fn wait(
        &self,
        mut rx: watch::Receiver<Option<LoadOutcome>>,
        handle: &DetailsHandle,
    ) -> Result<Arc<DrawableDetails>> {
        let waited = tokio::time::timeout(
            self.config.wait_timeout(),
            rx.wait_for(|outcome| outcome.is_some()),
        )
        .await;

        match waited {
            Err(_) => Err(Error::LoadTimeout(handle.name().to_string())),
            Ok(Err(_)) => {
                // Sender dropped without a result: the parse task died
                let reason = format!("Load task for {} ended without a result", handle.name());
                handle.cell().abandon(&reason);
                Err(Error::Parse(reason))
            }
            Ok(Ok(outcome)) => (*outcome)
                .clone()
                .unwrap_or_else(|| Err(Error::Parse(handle.name().to_string()))),
        }
    }
}

impl std::fmt::Debug for DetailsLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailsLoader")
            .field("config", &self.config)
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}
