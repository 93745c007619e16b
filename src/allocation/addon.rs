//! Addon container
//!
//! Ordered, capacity-bounded storage of drawables. Mutation never
//! renumbers; callers renumber explicitly once a batch is applied.

use super::drawable::{Drawable, DrawableId};
use super::numbering::{self, InvariantViolation};
use super::partition::PartitionKey;
use crate::config::MAX_DRAWABLES_PER_PARTITION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_capacity() -> usize {
    MAX_DRAWABLES_PER_PARTITION
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Addon {
    name: String,
    drawables: Vec<Drawable>,
    /// Per-partition capacity
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

impl Addon {
    pub fn new<S: Into<String>>(name: S, capacity: usize) -> Self {
        Self {
            name: name.into(),
            drawables: Vec::new(),
            capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Number of drawables sharing `key`
    pub fn count(&self, key: PartitionKey) -> usize {
        self.drawables.iter().filter(|d| d.key() == key).count()
    }

    /// Whether `n` more drawables of `key` fit
    pub fn can_fit(&self, key: PartitionKey, n: usize) -> bool {
        self.count(key) + n <= self.capacity
    }

    /// Whether every partition present in `drawables` fits its sub-count
    pub fn can_fit_drawables<'a, I>(&self, drawables: I) -> bool
    where
        I: IntoIterator<Item = &'a Drawable>,
    {
        let mut requested: BTreeMap<PartitionKey, usize> = BTreeMap::new();
        for drawable in drawables {
            *requested.entry(drawable.key()).or_insert(0) += 1;
        }
        requested.into_iter().all(|(key, n)| self.can_fit(key, n))
    }

    /// First free contiguous slot of `key`
    pub fn next_number(&self, key: PartitionKey) -> usize {
        self.count(key)
    }

    /// Per-partition drawable counts
    pub fn partitions(&self) -> BTreeMap<PartitionKey, usize> {
        numbering::partition_counts(&self.drawables)
    }

    pub fn contains(&self, id: DrawableId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: DrawableId) -> Option<usize> {
        self.drawables.iter().position(|d| d.id() == id)
    }

    pub fn get(&self, id: DrawableId) -> Option<&Drawable> {
        self.drawables.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: DrawableId) -> Option<&mut Drawable> {
        self.drawables.iter_mut().find(|d| d.id() == id)
    }

    /// Append without renumbering
    pub fn add(&mut self, drawable: Drawable) {
        self.drawables.push(drawable);
    }

    /// Remove without renumbering
    pub fn remove(&mut self, id: DrawableId) -> Option<Drawable> {
        let index = self.position(id)?;
        Some(self.drawables.remove(index))
    }

    /// Swap the drawable at `id` for `replacement` in place
    pub(crate) fn replace(&mut self, id: DrawableId, replacement: Drawable) -> Option<Drawable> {
        let index = self.position(id)?;
        Some(std::mem::replace(&mut self.drawables[index], replacement))
    }

    /// Move a drawable to `position` in display order, without renumbering
    pub(crate) fn reorder(&mut self, id: DrawableId, position: usize) -> Option<()> {
        let from = self.position(id)?;
        let drawable = self.drawables.remove(from);
        let to = position.min(self.drawables.len());
        self.drawables.insert(to, drawable);
        Some(())
    }

    /// Renumber `key` by current relative order
    pub fn reassign_numbers(&mut self, key: PartitionKey) -> usize {
        numbering::reassign_numbers(&mut self.drawables, key)
    }

    /// Canonical order (sex, name), optionally renumbering to match it
    pub fn sort(&mut self, reassign: bool) {
        numbering::sort_canonical(&mut self.drawables);
        if reassign {
            numbering::reassign_all(&mut self.drawables);
        }
    }

    pub fn violations(&self) -> Vec<InvariantViolation> {
        numbering::find_violations(&self.name, &self.drawables, self.capacity)
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub(crate) fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub(crate) fn take_drawables(&mut self) -> Vec<Drawable> {
        std::mem::take(&mut self.drawables)
    }
}
