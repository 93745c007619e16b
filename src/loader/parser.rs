//! Asset parser trait

use super::details::ParsedDrawable;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Extracts polygon counts and embedded textures from a drawable file
///
/// Implementations run on background tasks, so they must be `Send + Sync`
/// and must not assume any particular calling thread.
#[async_trait]
pub trait AssetParser: Send + Sync {
    async fn parse_drawable_file(&self, path: &Path) -> Result<ParsedDrawable>;
}
