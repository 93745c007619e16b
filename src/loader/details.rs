//! Descriptive metadata extracted from a drawable's asset file

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Level of detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Lod {
    High,
    Medium,
    Low,
    VeryLow,
}

/// Texture embedded in the drawable file itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Raw output of an [`AssetParser`](super::AssetParser)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDrawable {
    pub polygons_by_lod: BTreeMap<Lod, u32>,
    pub embedded_textures: Vec<EmbeddedTexture>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailWarning {
    /// High LOD polygon count above the configured threshold
    HighPolygonCount { count: u32, limit: u32 },
    MissingHighLod,
    NoTextures,
}

/// Loaded details of a drawable
///
/// Immutable once built. Texture list edits produce a new value through
/// [`DrawableDetails::with_attached_textures`] instead of re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawableDetails {
    pub polygons_by_lod: BTreeMap<Lod, u32>,
    pub embedded_textures: Vec<EmbeddedTexture>,
    /// Number of texture files attached to the drawable
    pub attached_textures: usize,
    pub polygon_limit: u32,
    pub warnings: Vec<DetailWarning>,
}

impl DrawableDetails {
    pub fn derive(parsed: ParsedDrawable, attached_textures: usize, polygon_limit: u32) -> Self {
        let mut details = Self {
            polygons_by_lod: parsed.polygons_by_lod,
            embedded_textures: parsed.embedded_textures,
            attached_textures,
            polygon_limit,
            warnings: Vec::new(),
        };
        details.warnings = details.compute_warnings();
        details
    }

    /// Re-derive the texture-dependent summary fields
    pub fn with_attached_textures(&self, attached_textures: usize) -> Self {
        let mut details = self.clone();
        details.attached_textures = attached_textures;
        details.warnings = details.compute_warnings();
        details
    }

    pub fn total_polygons(&self) -> u64 {
        self.polygons_by_lod.values().map(|&c| c as u64).sum()
    }

    pub fn polygons(&self, lod: Lod) -> Option<u32> {
        self.polygons_by_lod.get(&lod).copied()
    }

    fn compute_warnings(&self) -> Vec<DetailWarning> {
        let mut warnings = Vec::new();

        match self.polygons(Lod::High) {
            Some(count) if count > self.polygon_limit => {
                warnings.push(DetailWarning::HighPolygonCount {
                    count,
                    limit: self.polygon_limit,
                });
            }
            Some(_) => {}
            None => warnings.push(DetailWarning::MissingHighLod),
        }

        if self.attached_textures == 0 && self.embedded_textures.is_empty() {
            warnings.push(DetailWarning::NoTextures);
        }

        warnings
    }
}
