//! Allocation manager
//!
//! The only component that decides which addon a drawable lands in.
//!
//! Placement is greedy first-fit over addons in order, checked per
//! partition: an addon full for one key may still take drawables of
//! another. When no addon has room a new one ("Addon N") is appended.

use super::addon::Addon;
use super::classify::{classify_all, Classification};
use super::drawable::{Drawable, DrawableId};
use super::numbering::InvariantViolation;
use super::partition::{PartitionKey, Sex};
use crate::config::AllocatorConfig;
use crate::error::{Error, Result};
use crate::loader::{DetailsHandle, DetailsLoader};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a drawable ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub id: DrawableId,
    /// Index of the addon in the managed set
    pub addon: usize,
    pub number: usize,
}

/// When freshly placed drawables fetch their details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Start loading in the background right away
    Eager,
    /// Stay unloaded until first explicit access
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// Only drawables inside the selected addon
    SelectedAddon,
    AllAddons,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub placed: Vec<Placement>,
    /// Files whose type could not be determined; resolve with `add_classified`
    pub unresolved: Vec<PathBuf>,
    /// Background loads started for placed drawables
    pub loads_started: usize,
}

#[derive(Debug, Default)]
pub struct DeleteReport {
    pub removed: Vec<DrawableId>,
    /// Ids not owned by any addon, or outside the selected addon
    pub skipped: Vec<DrawableId>,
    /// Addons dropped because they became empty
    pub pruned_addons: usize,
    pub file_failures: Vec<(PathBuf, String)>,
}

/// Owns the addon set and every allocation decision
///
/// Not internally synchronized: callers serialize mutating calls.
pub struct AllocationManager {
    addons: Vec<Addon>,
    selected: usize,
    config: AllocatorConfig,
    loader: Option<DetailsLoader>,
}

impl AllocationManager {
    /// Create a manager holding a single empty addon
    pub fn new(config: AllocatorConfig) -> Self {
        let first = Addon::new(addon_name(0), config.max_drawables_per_partition);
        Self {
            addons: vec![first],
            selected: 0,
            config,
            loader: None,
        }
    }

    /// Rebuild from restored addons; an empty set gets one empty addon
    pub fn from_addons(addons: Vec<Addon>, config: AllocatorConfig) -> Self {
        let mut manager = Self::new(config);
        if !addons.is_empty() {
            manager.addons = addons;
        }
        let capacity = manager.config.max_drawables_per_partition;
        for addon in &mut manager.addons {
            addon.set_capacity(capacity);
        }
        manager
    }

    pub fn with_loader(mut self, loader: DetailsLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn loader(&self) -> Option<&DetailsLoader> {
        self.loader.as_ref()
    }

    pub fn addons(&self) -> &[Addon] {
        &self.addons
    }

    pub fn addon(&self, index: usize) -> Result<&Addon> {
        self.addons.get(index).ok_or(Error::AddonNotFound(index))
    }

    pub fn selected_addon(&self) -> usize {
        self.selected
    }

    pub fn select_addon(&mut self, index: usize) -> Result<()> {
        self.addon(index)?;
        self.selected = index;
        Ok(())
    }

    /// Total drawables across all addons, placeholders included
    pub fn total_count(&self) -> usize {
        self.addons.iter().map(Addon::len).sum()
    }

    /// Locate a drawable: (addon index, drawable)
    pub fn find(&self, id: DrawableId) -> Option<(usize, &Drawable)> {
        self.addons
            .iter()
            .enumerate()
            .find_map(|(i, addon)| addon.get(id).map(|d| (i, d)))
    }

    pub fn drawable_mut(&mut self, id: DrawableId) -> Result<&mut Drawable> {
        self.addons
            .iter_mut()
            .find_map(|addon| addon.get_mut(id))
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))
    }

    pub fn details_handle(&self, id: DrawableId) -> Result<DetailsHandle> {
        self.find(id)
            .map(|(_, d)| d.details_handle())
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))
    }

    /// Place a new drawable into the first addon with room for its partition
    ///
    /// This is the interactive "new" path: with a loader attached, details
    /// start loading in the background right away.
    pub fn add_drawable(&mut self, drawable: Drawable) -> Placement {
        let placement = self.place(drawable, true);
        self.start_background_loads(std::iter::once(placement.id));
        placement
    }

    /// Classify and place a batch of files in input order
    pub fn add_drawables(&mut self, paths: &[PathBuf], sex: Sex, policy: LoadPolicy) -> ImportReport {
        let mut report = ImportReport::default();
        let classified = classify_all(paths, sex, self.config.parallel_classify_threshold);

        for (path, result) in classified {
            match result {
                Ok(Classification { key, has_skin }) => {
                    let placement = self.place(Drawable::new(path, key, has_skin), true);
                    report.placed.push(placement);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Drawable type needs manual resolution");
                    report.unresolved.push(path);
                }
            }
        }

        let touched: BTreeSet<usize> = report.placed.iter().map(|p| p.addon).collect();
        for &index in &touched {
            self.addons[index].sort(true);
        }
        // Sorting may have moved numbers; report what stuck
        for placement in &mut report.placed {
            if let Some((_, drawable)) = self.find(placement.id) {
                placement.number = drawable.number();
            }
        }

        if policy == LoadPolicy::Eager {
            report.loads_started = self.start_background_loads(report.placed.iter().map(|p| p.id));
        }

        info!(
            placed = report.placed.len(),
            unresolved = report.unresolved.len(),
            addons = self.addons.len(),
            "Imported drawables"
        );
        report
    }

    /// Place a file whose type was resolved by the caller
    pub fn add_classified<P: Into<PathBuf>>(
        &mut self,
        path: P,
        key: PartitionKey,
        has_skin: bool,
        policy: LoadPolicy,
    ) -> Placement {
        let placement = self.place(Drawable::new(path, key, has_skin), true);
        if policy == LoadPolicy::Eager {
            self.start_background_loads(std::iter::once(placement.id));
        }
        placement
    }

    /// Reserve a slot in `key` without backing content
    pub fn reserve_slot(&mut self, key: PartitionKey) -> Placement {
        self.place(Drawable::reserved(key), false)
    }

    /// Back a reserved placeholder with a real file, keeping its number
    pub fn fill_reserved<P: Into<PathBuf>>(
        &mut self,
        id: DrawableId,
        path: P,
        has_skin: bool,
    ) -> Result<Placement> {
        let (addon, _) = self
            .find(id)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        let drawable = self.drawable_mut(id)?;
        if !drawable.is_reserved() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a reserved slot",
                drawable.name()
            )));
        }
        drawable.fill(path.into(), has_skin);
        drawable.set_new(true);
        Ok(Placement {
            id,
            addon,
            number: drawable.number(),
        })
    }

    /// Move a drawable to another addon, closing the gap it leaves behind
    pub fn move_drawable(&mut self, id: DrawableId, target: usize) -> Result<Placement> {
        let (source, drawable) = self
            .find(id)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        let key = drawable.key();
        let target_addon = self.addon(target)?;

        if source == target {
            return Ok(Placement {
                id,
                addon: target,
                number: drawable.number(),
            });
        }
        if !target_addon.can_fit(key, 1) {
            return Err(Error::CapacityExceeded {
                addon: target_addon.name().to_string(),
                key: key.to_string(),
                requested: 1,
                limit: target_addon.capacity(),
            });
        }

        let mut drawable = self.addons[source]
            .remove(id)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        self.addons[source].reassign_numbers(key);

        let number = self.addons[target].next_number(key);
        drawable.set_number(number);
        self.addons[target].add(drawable);

        debug!(%id, from = source, to = target, number, "Moved drawable");
        Ok(Placement {
            id,
            addon: target,
            number,
        })
    }

    /// Reorder a drawable inside its addon and renumber its partition
    pub fn reorder_drawable(&mut self, addon: usize, id: DrawableId, position: usize) -> Result<()> {
        let key = self
            .addon(addon)?
            .get(id)
            .map(Drawable::key)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        let target = &mut self.addons[addon];
        target
            .reorder(id, position)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        target.reassign_numbers(key);
        Ok(())
    }

    /// Delete drawables, repacking numbers once per touched addon
    pub fn delete_drawables(
        &mut self,
        ids: &[DrawableId],
        scope: DeleteScope,
        delete_files: bool,
    ) -> DeleteReport {
        let mut report = DeleteReport::default();

        let mut groups: BTreeMap<usize, Vec<DrawableId>> = BTreeMap::new();
        for &id in ids {
            let owner = match scope {
                DeleteScope::SelectedAddon => self
                    .addons
                    .get(self.selected)
                    .filter(|a| a.contains(id))
                    .map(|_| self.selected),
                DeleteScope::AllAddons => self.find(id).map(|(i, _)| i),
            };
            match owner {
                Some(index) => groups.entry(index).or_default().push(id),
                None => report.skipped.push(id),
            }
        }

        let mut removed = Vec::new();
        for (&index, group) in &groups {
            let addon = &mut self.addons[index];
            for &id in group {
                match addon.remove(id) {
                    Some(drawable) => {
                        report.removed.push(id);
                        removed.push(drawable);
                    }
                    // Listed twice; the first copy already removed it
                    None => report.skipped.push(id),
                }
            }
            addon.sort(true);
        }

        if delete_files {
            for drawable in &removed {
                delete_backing_files(drawable, &mut report.file_failures);
            }
        }

        report.pruned_addons = self.prune_empty(groups.keys().copied().collect());

        if !report.skipped.is_empty() {
            warn!(skipped = report.skipped.len(), "Some drawables were not deleted");
        }
        info!(
            removed = report.removed.len(),
            pruned = report.pruned_addons,
            "Deleted drawables"
        );
        report
    }

    /// Re-pack every drawable into the minimal set of addons
    ///
    /// Deterministic: a second call yields the same partitioning and
    /// per-partition numbering.
    pub fn recalculate(&mut self) {
        let capacity = self.config.max_drawables_per_partition;
        let before = self.addons.len();

        let mut flat: Vec<Drawable> = Vec::with_capacity(self.total_count());
        for addon in &mut self.addons {
            flat.extend(addon.take_drawables());
        }

        // Stable: equal numbers keep collection order (addon, then storage)
        flat.sort_by_key(|d| (d.is_prop(), d.sex(), d.type_code(), d.number()));

        self.addons.truncate(1);
        self.addons[0].set_capacity(capacity);
        for drawable in flat {
            self.place(drawable, false);
        }
        for (index, addon) in self.addons.iter_mut().enumerate() {
            addon.set_name(addon_name(index));
        }
        self.selected = 0;

        info!(
            before,
            after = self.addons.len(),
            drawables = self.total_count(),
            "Recalculated addons"
        );
    }

    /// Move a drawable to a new partition, leaving a placeholder in its old slot
    pub fn change_partition(&mut self, id: DrawableId, key: PartitionKey) -> Result<Placement> {
        let (source, drawable) = self
            .find(id)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;
        let old_key = drawable.key();
        if old_key == key {
            return Ok(Placement {
                id,
                addon: source,
                number: drawable.number(),
            });
        }

        let mut placeholder = Drawable::reserved(old_key);
        placeholder.set_number(drawable.number());
        let mut drawable = self.addons[source]
            .replace(id, placeholder)
            .ok_or_else(|| Error::DrawableNotFound(id.to_string()))?;

        drawable.set_key(key);
        let placement = self.place(drawable, true);

        for addon in &mut self.addons {
            addon.sort(false);
        }

        debug!(%id, from = %old_key, to = %key, addon = placement.addon, "Changed drawable partition");
        Ok(placement)
    }

    /// Renumber one partition of one addon by its current order
    pub fn reassign_numbers(&mut self, addon: usize, key: PartitionKey) -> Result<usize> {
        self.addon(addon)?;
        Ok(self.addons[addon].reassign_numbers(key))
    }

    pub fn sort(&mut self, addon: usize, reassign: bool) -> Result<()> {
        self.addon(addon)?;
        self.addons[addon].sort(reassign);
        Ok(())
    }

    /// Every contiguity or capacity violation across all addons
    pub fn validate(&self) -> Vec<InvariantViolation> {
        self.addons.iter().flat_map(Addon::violations).collect()
    }

    fn place(&mut self, mut drawable: Drawable, mark_new: bool) -> Placement {
        let key = drawable.key();
        let index = match self.addons.iter().position(|a| a.can_fit(key, 1)) {
            Some(index) => index,
            None => {
                let index = self.addons.len();
                self.addons
                    .push(Addon::new(addon_name(index), self.config.max_drawables_per_partition));
                info!(addon = %addon_name(index), key = %key, "Created addon");
                index
            }
        };

        let addon = &mut self.addons[index];
        let number = addon.next_number(key);
        drawable.set_number(number);
        if mark_new {
            drawable.set_new(true);
        }
        let id = drawable.id();
        addon.add(drawable);

        debug!(%id, addon = %addon.name(), key = %key, number, "Placed drawable");
        Placement {
            id,
            addon: index,
            number,
        }
    }

    /// Drop empty addons among `candidates`, always keeping at least one
    fn prune_empty(&mut self, candidates: Vec<usize>) -> usize {
        let mut pruned = 0;
        for index in candidates.into_iter().rev() {
            if self.addons.len() <= 1 {
                break;
            }
            if index < self.addons.len() && self.addons[index].is_empty() {
                let addon = self.addons.remove(index);
                info!(addon = %addon.name(), "Removed empty addon");
                if self.selected > index {
                    self.selected -= 1;
                }
                pruned += 1;
            }
        }
        self.selected = self.selected.min(self.addons.len() - 1);
        pruned
    }

    fn start_background_loads(&self, ids: impl Iterator<Item = DrawableId>) -> usize {
        let Some(loader) = &self.loader else {
            return 0;
        };
        let mut started = 0;
        for id in ids {
            if let Some((_, drawable)) = self.find(id) {
                if loader.spawn_background(&drawable.details_handle()) {
                    started += 1;
                }
            }
        }
        started
    }
}

impl std::fmt::Debug for AllocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocationManager")
            .field("addons", &self.addons.len())
            .field("drawables", &self.total_count())
            .field("selected", &self.selected)
            .finish()
    }
}

fn addon_name(index: usize) -> String {
    format!("Addon {}", index + 1)
}

/// Best-effort removal of a drawable's files; failures are collected, not fatal
fn delete_backing_files(drawable: &Drawable, failures: &mut Vec<(PathBuf, String)>) {
    let paths = drawable
        .file_path()
        .into_iter()
        .chain(drawable.textures().iter().map(|t| t.file_path.as_path()));
    for path in paths {
        if let Err(e) = remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to delete drawable file");
            failures.push((path.to_path_buf(), e.to_string()));
        }
    }
}

fn remove_file(path: &Path) -> Result<()> {
    std::fs::remove_file(path)
        .map_err(|e| Error::Io(format!("Failed to delete {}: {}", path.display(), e)))
}
