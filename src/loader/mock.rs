//! Mock parser for testing
//!
//! In-memory [`AssetParser`] that records how often and how concurrently
//! it was invoked.

use super::details::{Lod, ParsedDrawable};
use super::parser::AssetParser;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockInner {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Duration>,
    failing: Mutex<HashSet<PathBuf>>,
    results: Mutex<HashMap<PathBuf, ParsedDrawable>>,
}

/// Instrumented in-memory parser
#[derive(Clone, Default)]
pub struct MockParser {
    inner: Arc<MockInner>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every parse sleep for `delay` before returning
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock() = delay;
        self
    }

    pub fn set_result<P: Into<PathBuf>>(&self, path: P, parsed: ParsedDrawable) {
        self.inner.results.lock().insert(path.into(), parsed);
    }

    pub fn fail_on<P: Into<PathBuf>>(&self, path: P) {
        self.inner.failing.lock().insert(path.into());
    }

    pub fn clear_failure(&self, path: &Path) {
        self.inner.failing.lock().remove(path);
    }

    /// Total parse invocations
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Highest number of parses observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn default_result() -> ParsedDrawable {
        ParsedDrawable {
            polygons_by_lod: BTreeMap::from([(Lod::High, 1200), (Lod::Medium, 600)]),
            embedded_textures: Vec::new(),
        }
    }
}

#[async_trait]
impl AssetParser for MockParser {
    async fn parse_drawable_file(&self, path: &Path) -> Result<ParsedDrawable> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.inner.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if self.inner.failing.lock().contains(path) {
            Err(Error::Parse(format!("Unreadable drawable: {}", path.display())))
        } else {
            Ok(self
                .inner
                .results
                .lock()
                .get(path)
                .cloned()
                .unwrap_or_else(Self::default_result))
        };

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
