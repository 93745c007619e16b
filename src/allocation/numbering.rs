//! Contiguous numbering over a partition
//!
//! Within one addon, the drawables sharing a [`PartitionKey`] must be
//! numbered exactly `0..count`. The downstream format indexes variations
//! by position, so a gap shifts every later variation.

use super::drawable::Drawable;
use super::partition::PartitionKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Number the drawables of `key` by their current relative order
///
/// Returns how many numbers changed. Calling it again without a reorder
/// changes nothing.
pub fn reassign_numbers(drawables: &mut [Drawable], key: PartitionKey) -> usize {
    let mut changed = 0;
    for (number, drawable) in drawables
        .iter_mut()
        .filter(|d| d.key() == key)
        .enumerate()
    {
        if drawable.number() != number {
            drawable.set_number(number);
            changed += 1;
        }
    }
    changed
}

/// Reassign every partition present in `drawables`
pub fn reassign_all(drawables: &mut [Drawable]) -> usize {
    let keys: Vec<PartitionKey> = partition_counts(drawables).into_keys().collect();
    keys.into_iter()
        .map(|key| reassign_numbers(drawables, key))
        .sum()
}

/// Canonical display order: sex first, then derived name
pub fn sort_canonical(drawables: &mut [Drawable]) {
    drawables.sort_by_cached_key(|d| (d.sex(), d.name()));
}

pub fn partition_counts(drawables: &[Drawable]) -> BTreeMap<PartitionKey, usize> {
    let mut counts = BTreeMap::new();
    for drawable in drawables {
        *counts.entry(drawable.key()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ViolationKind {
    /// Numbers are not exactly `0..count`
    NonContiguous { numbers: Vec<usize> },
    OverCapacity { count: usize, limit: usize },
}

/// An invariant violation found in one addon partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    pub addon: String,
    pub key: PartitionKey,
    pub kind: ViolationKind,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::NonContiguous { numbers } => write!(
                f,
                "{} {}: numbers {:?} are not contiguous from 0",
                self.addon, self.key, numbers
            ),
            ViolationKind::OverCapacity { count, limit } => write!(
                f,
                "{} {}: {} drawables exceed limit {}",
                self.addon, self.key, count, limit
            ),
        }
    }
}

/// Check contiguity and capacity of every partition in one addon
pub fn find_violations(
    addon: &str,
    drawables: &[Drawable],
    limit: usize,
) -> Vec<InvariantViolation> {
    let mut numbers: BTreeMap<PartitionKey, Vec<usize>> = BTreeMap::new();
    for drawable in drawables {
        numbers
            .entry(drawable.key())
            .or_default()
            .push(drawable.number());
    }

    let mut violations = Vec::new();
    for (key, mut nums) in numbers {
        if nums.len() > limit {
            violations.push(InvariantViolation {
                addon: addon.to_string(),
                key,
                kind: ViolationKind::OverCapacity {
                    count: nums.len(),
                    limit,
                },
            });
        }
        nums.sort_unstable();
        if nums.iter().enumerate().any(|(i, &n)| i != n) {
            violations.push(InvariantViolation {
                addon: addon.to_string(),
                key,
                kind: ViolationKind::NonContiguous { numbers: nums },
            });
        }
    }
    violations
}
