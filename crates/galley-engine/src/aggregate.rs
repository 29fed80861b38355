//! Summing per-cohort allocations into per-group meal counts.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cohort::Cohort;
use crate::protein::ProteinCounts;

/// Predicted counts for one group, with optional reference counts carried
/// alongside for comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupCounts {
    pub predicted: ProteinCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<ProteinCounts>,
}

/// Per-protein counts grouped by a caller-chosen key.
///
/// The usual key is the meal time; batch runs use a (flight, date, cabin,
/// meal time) tuple. Groups appear only once something was added to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Aggregation<K: Ord> {
    groups: BTreeMap<K, GroupCounts>,
}

impl<K: Ord> Default for Aggregation<K> {
    fn default() -> Self {
        Self { groups: BTreeMap::new() }
    }
}

impl<K: Ord> Aggregation<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: K, counts: &ProteinCounts) {
        self.groups.entry(key).or_default().predicted.accumulate(counts);
    }

    /// Attach reference counts to an existing group. Predicted counts are
    /// left as they are. Returns false when the group does not exist.
    pub fn annotate_reference(&mut self, key: &K, reference: ProteinCounts) -> bool {
        match self.groups.get_mut(key) {
            Some(group) => {
                group.reference = Some(reference);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &K) -> Option<&GroupCounts> {
        self.groups.get(key)
    }

    pub fn predicted(&self, key: &K) -> Option<&ProteinCounts> {
        self.groups.get(key).map(|g| &g.predicted)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &GroupCounts)> {
        self.groups.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.keys()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Meals across every group.
    pub fn total(&self) -> u32 {
        self.groups.values().map(|g| g.predicted.total()).sum()
    }

    /// Drop reference annotations, keeping only the predicted counts.
    pub fn into_predicted(self) -> BTreeMap<K, ProteinCounts> {
        self.groups.into_iter().map(|(k, g)| (k, g.predicted)).collect()
    }
}

/// Sum `(cohort, allocation)` pairs by `key_of(cohort)`.
pub fn aggregate<'a, K, I, F>(pairs: I, key_of: F) -> Aggregation<K>
where
    K: Ord,
    I: IntoIterator<Item = (&'a Cohort, &'a ProteinCounts)>,
    F: Fn(&Cohort) -> K,
{
    let mut out = Aggregation::new();
    for (cohort, counts) in pairs {
        out.add(key_of(cohort), counts);
    }
    out
}
