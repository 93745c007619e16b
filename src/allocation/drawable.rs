//! Drawable entity

use super::partition::{PartitionKey, Sex};
use crate::error::{Error, Result};
use crate::loader::{DetailsCell, DetailsHandle, DetailsLoader, DrawableDetails, LoadState};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Maximum textures per drawable (`a`..`z`)
pub const MAX_TEXTURES: usize = 26;

/// Stable identity of a drawable, independent of its number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DrawableId(Uuid);

impl DrawableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DrawableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DrawableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidArgument(format!("Invalid drawable id {}: {}", s, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    pub file_path: PathBuf,
}

/// A clothing or prop asset occupying one numbered slot
///
/// The display name is always derived from the type, number and skin flag.
/// A reserved placeholder occupies a slot without backing content.
#[derive(Debug, Serialize, Deserialize)]
#[serde(from = "DrawableRecord")]
pub struct Drawable {
    id: DrawableId,
    #[serde(flatten)]
    key: PartitionKey,
    number: usize,
    #[serde(default)]
    has_skin: bool,
    #[serde(default)]
    file_path: Option<PathBuf>,
    #[serde(default)]
    textures: Vec<Texture>,
    #[serde(default)]
    is_reserved: bool,
    #[serde(skip)]
    is_new: bool,
    #[serde(skip)]
    details: Arc<DetailsCell>,
}

/// Persisted form of a [`Drawable`]; runtime state is rebuilt on load
#[derive(Deserialize)]
struct DrawableRecord {
    id: DrawableId,
    #[serde(flatten)]
    key: PartitionKey,
    number: usize,
    #[serde(default)]
    has_skin: bool,
    #[serde(default)]
    file_path: Option<PathBuf>,
    #[serde(default)]
    textures: Vec<Texture>,
    #[serde(default)]
    is_reserved: bool,
}

impl From<DrawableRecord> for Drawable {
    fn from(record: DrawableRecord) -> Self {
        let details = Arc::new(DetailsCell::with_attached_textures(record.textures.len()));
        Self {
            id: record.id,
            key: record.key,
            number: record.number,
            has_skin: record.has_skin,
            file_path: record.file_path,
            textures: record.textures,
            is_reserved: record.is_reserved,
            is_new: false,
            details,
        }
    }
}

impl Drawable {
    /// Create an unassigned drawable backed by `file_path`
    pub fn new<P: Into<PathBuf>>(file_path: P, key: PartitionKey, has_skin: bool) -> Self {
        Self {
            id: DrawableId::new(),
            key,
            number: 0,
            has_skin,
            file_path: Some(file_path.into()),
            textures: Vec::new(),
            is_reserved: false,
            is_new: false,
            details: Arc::default(),
        }
    }

    /// Create a reserved placeholder for `key`
    pub fn reserved(key: PartitionKey) -> Self {
        Self {
            id: DrawableId::new(),
            key,
            number: 0,
            has_skin: false,
            file_path: None,
            textures: Vec::new(),
            is_reserved: true,
            is_new: false,
            details: Arc::default(),
        }
    }

    pub fn id(&self) -> DrawableId {
        self.id
    }

    pub fn key(&self) -> PartitionKey {
        self.key
    }

    pub fn sex(&self) -> Sex {
        self.key.sex
    }

    pub fn is_prop(&self) -> bool {
        self.key.is_prop
    }

    pub fn type_code(&self) -> u8 {
        self.key.type_code
    }

    pub fn type_name(&self) -> &'static str {
        self.key.type_name().unwrap_or("unknown")
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn has_skin(&self) -> bool {
        self.has_skin
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn is_reserved(&self) -> bool {
        self.is_reserved
    }

    /// Freshly added and not yet viewed
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn mark_viewed(&mut self) {
        self.is_new = false;
    }

    /// Whether this drawable ends up in rendering and export
    pub fn is_exportable(&self) -> bool {
        !self.is_reserved && self.file_path.is_some()
    }

    /// Derived display name, e.g. `jbib_004_u` or `p_head_012`
    pub fn name(&self) -> String {
        if self.key.is_prop {
            format!("{}_{:03}", self.type_name(), self.number)
        } else {
            let skin = if self.has_skin { "r" } else { "u" };
            format!("{}_{:03}_{}", self.type_name(), self.number, skin)
        }
    }

    /// Derived name of the texture at `index`
    pub fn texture_name(&self, index: usize) -> Option<String> {
        if index >= self.textures.len() {
            return None;
        }
        let letter = (b'a' + index as u8) as char;
        let name = if self.key.is_prop {
            format!("{}_diff_{:03}_{}", self.type_name(), self.number, letter)
        } else {
            let variant = if self.has_skin { "whi" } else { "uni" };
            format!(
                "{}_diff_{:03}_{}_{}",
                self.type_name(),
                self.number,
                letter,
                variant
            )
        };
        Some(name)
    }

    /// Attach a texture file, returning its index
    pub fn add_texture<P: Into<PathBuf>>(&mut self, file_path: P) -> Result<usize> {
        if self.textures.len() >= MAX_TEXTURES {
            return Err(Error::TextureLimit(format!(
                "{} already has {} textures",
                self.name(),
                MAX_TEXTURES
            )));
        }
        self.textures.push(Texture {
            file_path: file_path.into(),
        });
        self.details.set_attached_textures(self.textures.len());
        Ok(self.textures.len() - 1)
    }

    pub fn remove_texture(&mut self, index: usize) -> Result<Texture> {
        if index >= self.textures.len() {
            return Err(Error::InvalidArgument(format!(
                "{} has no texture at index {}",
                self.name(),
                index
            )));
        }
        let texture = self.textures.remove(index);
        self.details.set_attached_textures(self.textures.len());
        Ok(texture)
    }

    pub fn details(&self) -> Option<Arc<DrawableDetails>> {
        self.details.details()
    }

    pub fn load_state(&self) -> LoadState {
        self.details.state()
    }

    pub fn is_loading(&self) -> bool {
        self.details.state() == LoadState::Loading
    }

    pub fn details_handle(&self) -> DetailsHandle {
        DetailsHandle::new(self.name(), self.file_path.clone(), self.details.clone())
    }

    /// Fetch details, parsing the backing file on first access
    pub async fn load_details_on_demand(
        &self,
        loader: &DetailsLoader,
    ) -> Result<Arc<DrawableDetails>> {
        loader.load(&self.details_handle()).await
    }

    pub(crate) fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    pub(crate) fn set_key(&mut self, key: PartitionKey) {
        self.key = key;
    }

    pub(crate) fn set_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    /// Turn a placeholder into a real drawable, keeping slot and number
    pub(crate) fn fill(&mut self, file_path: PathBuf, has_skin: bool) {
        self.file_path = Some(file_path);
        self.has_skin = has_skin;
        self.is_reserved = false;
        self.details = Arc::new(DetailsCell::with_attached_textures(self.textures.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_name() {
        let mut drawable =
            Drawable::new("jbib_000_u.ydd", PartitionKey::component(Sex::Male, 11), false);
        drawable.set_number(4);
        assert_eq!(drawable.name(), "jbib_004_u");

        let mut skinned = Drawable::new("uppr.ydd", PartitionKey::component(Sex::Male, 3), true);
        skinned.set_number(12);
        assert_eq!(skinned.name(), "uppr_012_r");
    }

    #[test]
    fn test_prop_name() {
        let mut drawable = Drawable::new("hat.ydd", PartitionKey::prop(Sex::Female, 0), false);
        drawable.set_number(127);
        assert_eq!(drawable.name(), "p_head_127");
    }

    #[test]
    fn test_texture_names() -> Result<()> {
        let mut drawable = Drawable::new("a.ydd", PartitionKey::component(Sex::Male, 11), false);
        drawable.add_texture("t0.ytd")?;
        drawable.add_texture("t1.ytd")?;
        assert_eq!(drawable.texture_name(1).as_deref(), Some("jbib_diff_000_b_uni"));
        assert_eq!(drawable.texture_name(2), None);

        let mut prop = Drawable::new("b.ydd", PartitionKey::prop(Sex::Male, 1), false);
        prop.add_texture("t0.ytd")?;
        assert_eq!(prop.texture_name(0).as_deref(), Some("p_eyes_diff_000_a"));
        Ok(())
    }

    #[test]
    fn test_texture_limit() {
        let mut drawable = Drawable::new("a.ydd", PartitionKey::component(Sex::Male, 4), false);
        for i in 0..MAX_TEXTURES {
            assert_eq!(drawable.add_texture(format!("t{}.ytd", i)).unwrap(), i);
        }
        assert!(matches!(
            drawable.add_texture("extra.ytd"),
            Err(Error::TextureLimit(_))
        ));

        let removed = drawable.remove_texture(0).unwrap();
        assert_eq!(removed.file_path, PathBuf::from("t0.ytd"));
        assert_eq!(drawable.textures().len(), MAX_TEXTURES - 1);
        assert!(drawable.remove_texture(99).is_err());
    }

    #[test]
    fn test_reserved_placeholder() {
        let reserved = Drawable::reserved(PartitionKey::component(Sex::Female, 1));
        assert!(reserved.is_reserved());
        assert!(!reserved.is_exportable());
        assert!(reserved.file_path().is_none());
        assert_eq!(reserved.load_state(), LoadState::Unloaded);
    }

    #[test]
    fn test_fill_reserved() {
        let mut drawable = Drawable::reserved(PartitionKey::component(Sex::Female, 1));
        drawable.set_number(7);
        drawable.fill(PathBuf::from("berd_007_r.ydd"), true);
        assert!(!drawable.is_reserved());
        assert!(drawable.is_exportable());
        assert_eq!(drawable.name(), "berd_007_r");
    }

    #[tokio::test]
    async fn test_fill_keeps_attached_texture_count() -> Result<()> {
        use crate::config::LoaderConfig;
        use crate::loader::{DetailWarning, MockParser};

        let mut drawable = Drawable::reserved(PartitionKey::component(Sex::Female, 1));
        drawable.add_texture("berd_diff_000_a_whi.ytd")?;
        drawable.fill(PathBuf::from("berd_000_r.ydd"), true);

        let loader = DetailsLoader::new(Arc::new(MockParser::new()), LoaderConfig::default(), 20_000);
        let details = drawable.load_details_on_demand(&loader).await?;
        assert_eq!(details.attached_textures, 1);
        assert!(!details.warnings.contains(&DetailWarning::NoTextures));
        Ok(())
    }

    #[test]
    fn test_deserialized_drawable_starts_unloaded() {
        let mut drawable = Drawable::new("a.ydd", PartitionKey::component(Sex::Male, 11), false);
        drawable.set_new(true);
        let json = serde_json::to_string(&drawable).unwrap();

        let restored: Drawable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id(), drawable.id());
        assert_eq!(restored.key(), drawable.key());
        assert!(!restored.is_new());
        assert_eq!(restored.load_state(), LoadState::Unloaded);
    }

    #[test]
    fn test_drawable_id_parse() {
        let id = DrawableId::new();
        let parsed: DrawableId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<DrawableId>().is_err());
    }
}
