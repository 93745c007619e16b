//! Per-drawable loading state machine
//!
//! ```text
//! Unloaded ──begin──→ Loading ──finish──→ Loaded
//!    ↑                   │
//!    └──── begin ←── Failed
//! ```
//!
//! `Loading` holds a watch receiver so late callers join the in-flight
//! parse instead of starting a second one.

use super::details::{DrawableDetails, ParsedDrawable};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Result handed to every caller waiting on one parse
pub type LoadOutcome = Result<Arc<DrawableDetails>>;

/// Observable loading state of a drawable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Unloaded,
    Loading(watch::Receiver<Option<LoadOutcome>>),
    Loaded(Arc<DrawableDetails>),
    Failed(String),
}

#[derive(Debug, Default)]
struct CellInner {
    slot: Slot,
    attached_textures: usize,
}

/// What a caller should do after calling [`DetailsCell::begin`]
pub(crate) enum Begin {
    Ready(Arc<DrawableDetails>),
    Wait(watch::Receiver<Option<LoadOutcome>>),
    Start(
        watch::Sender<Option<LoadOutcome>>,
        watch::Receiver<Option<LoadOutcome>>,
    ),
}

/// Shared details storage of a single drawable
#[derive(Debug, Default)]
pub struct DetailsCell {
    inner: Mutex<CellInner>,
}

impl DetailsCell {
    /// Unloaded cell that already knows how many textures are attached
    pub fn with_attached_textures(count: usize) -> Self {
        Self {
            inner: Mutex::new(CellInner {
                slot: Slot::Unloaded,
                attached_textures: count,
            }),
        }
    }

    pub fn state(&self) -> LoadState {
        match &self.inner.lock().slot {
            Slot::Unloaded => LoadState::Unloaded,
            Slot::Loading(_) => LoadState::Loading,
            Slot::Loaded(_) => LoadState::Loaded,
            Slot::Failed(msg) => LoadState::Failed(msg.clone()),
        }
    }

    pub fn details(&self) -> Option<Arc<DrawableDetails>> {
        match &self.inner.lock().slot {
            Slot::Loaded(details) => Some(details.clone()),
            _ => None,
        }
    }

    /// Record a texture list change, replacing loaded details with a re-derived copy
    pub(crate) fn set_attached_textures(&self, count: usize) {
        let mut inner = self.inner.lock();
        inner.attached_textures = count;
        let updated = match &inner.slot {
            Slot::Loaded(details) => Arc::new(details.with_attached_textures(count)),
            _ => return,
        };
        inner.slot = Slot::Loaded(updated);
    }

    /// Transition into `Loading` unless a load already finished or is in flight
    pub(crate) fn begin(&self) -> Begin {
        let mut inner = self.inner.lock();
        match &inner.slot {
            Slot::Loaded(details) => return Begin::Ready(details.clone()),
            Slot::Loading(rx) => return Begin::Wait(rx.clone()),
            Slot::Unloaded | Slot::Failed(_) => {}
        }
        let (tx, rx) = watch::channel(None);
        inner.slot = Slot::Loading(rx.clone());
        Begin::Start(tx, rx)
    }

    /// Store the parse result and wake all waiters
    pub(crate) fn finish(
        &self,
        parsed: Result<ParsedDrawable>,
        polygon_limit: u32,
        tx: watch::Sender<Option<LoadOutcome>>,
    ) -> LoadOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            match parsed {
                Ok(parsed) => {
                    let details = Arc::new(DrawableDetails::derive(
                        parsed,
                        inner.attached_textures,
                        polygon_limit,
                    ));
                    inner.slot = Slot::Loaded(details.clone());
                    Ok(details)
                }
                Err(e) => {
                    inner.slot = Slot::Failed(e.to_string());
                    Err(e)
                }
            }
        };
        // Nobody listening is fine, the drawable may already be gone
        let _ = tx.send(Some(outcome.clone()));
        outcome
    }

    /// Fail a load whose task went away without reporting
    pub(crate) fn abandon(&self, reason: &str) {
        let mut inner = self.inner.lock();
        if matches!(inner.slot, Slot::Loading(_)) {
            inner.slot = Slot::Failed(reason.to_string());
        }
    }
}

/// Cheap, clonable reference to a drawable's details cell
///
/// Outlives the drawable: a load running when the drawable is removed
/// completes into a cell nobody reads anymore.
#[derive(Debug, Clone)]
pub struct DetailsHandle {
    name: String,
    path: Option<PathBuf>,
    cell: Arc<DetailsCell>,
}

impl DetailsHandle {
    pub(crate) fn new(name: String, path: Option<PathBuf>, cell: Arc<DetailsCell>) -> Self {
        Self { name, path, cell }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> LoadState {
        self.cell.state()
    }

    pub fn details(&self) -> Option<Arc<DrawableDetails>> {
        self.cell.details()
    }

    pub(crate) fn cell(&self) -> &DetailsCell {
        &self.cell
    }

    pub(crate) fn require_path(&self) -> Result<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| Error::NoBackingFile(self.name.clone()))
    }
}
