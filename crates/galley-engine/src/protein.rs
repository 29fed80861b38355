//! Protein identifiers and fixed-shape per-protein maps.
//!
//! A [`ProteinMap`] has one optional slot per [`Protein`]. An empty slot means
//! "not part of this set", which is different from a populated zero; the
//! restricted normalisation in [`crate::normalise`] depends on that.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Meal category used as the allocation unit.
///
/// Declaration order is alphabetical, so the derived `Ord` is the canonical
/// ordering used for [`AvailableProteins::canonical`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Protein {
    Beef,
    Chicken,
    Lamb,
    Pork,
    Seafood,
    Vegetarian,
}

impl Protein {
    pub const ALL: [Protein; 6] = [
        Protein::Beef,
        Protein::Chicken,
        Protein::Lamb,
        Protein::Pork,
        Protein::Seafood,
        Protein::Vegetarian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protein::Beef => "Beef",
            Protein::Chicken => "Chicken",
            Protein::Lamb => "Lamb",
            Protein::Pork => "Pork",
            Protein::Seafood => "Seafood",
            Protein::Vegetarian => "Vegetarian",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Protein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protein {
    type Err = EngineError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Protein::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| EngineError::UnknownProtein(trimmed.to_string()))
    }
}

// ── ProteinMap ────────────────────────────────────────────────────────────────

/// Fixed-shape map from [`Protein`] to `T`, iterated in [`Protein`] order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProteinMap<T: Copy> {
    slots: [Option<T>; 6],
}

/// Probability (or weight) per protein.
pub type ProteinVector = ProteinMap<f64>;

/// Integer meal count per protein.
pub type ProteinCounts = ProteinMap<u32>;

impl<T: Copy> Default for ProteinMap<T> {
    fn default() -> Self {
        Self { slots: [None; 6] }
    }
}

impl<T: Copy> ProteinMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, protein: Protein, value: T) -> Option<T> {
        self.slots[protein.index()].replace(value)
    }

    pub fn get(&self, protein: Protein) -> Option<T> {
        self.slots[protein.index()]
    }

    pub fn remove(&mut self, protein: Protein) -> Option<T> {
        self.slots[protein.index()].take()
    }

    pub fn contains(&self, protein: Protein) -> bool {
        self.slots[protein.index()].is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Populated entries in [`Protein`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Protein, T)> + '_ {
        Protein::ALL
            .into_iter()
            .filter_map(move |p| self.get(p).map(|v| (p, v)))
    }

    pub fn proteins(&self) -> impl Iterator<Item = Protein> + '_ {
        self.iter().map(|(p, _)| p)
    }

    /// Apply `f` to every populated entry, keeping the populated set.
    pub fn map<U: Copy>(&self, mut f: impl FnMut(Protein, T) -> U) -> ProteinMap<U> {
        self.iter().map(|(p, v)| (p, f(p, v))).collect()
    }
}

impl<T: Copy> FromIterator<(Protein, T)> for ProteinMap<T> {
    fn from_iter<I: IntoIterator<Item = (Protein, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (p, v) in iter {
            map.insert(p, v);
        }
        map
    }
}

impl ProteinVector {
    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, v)| v).sum()
    }

    /// Every populated value is finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        for (protein, value) in self.iter() {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::InvalidProbability { protein, value });
            }
        }
        Ok(())
    }

    /// Sums to 1.0 within `tolerance`.
    pub fn is_normalised(&self, tolerance: f64) -> bool {
        (self.sum() - 1.0).abs() <= tolerance
    }

    /// Largest per-protein absolute difference over the union of populated
    /// slots. An entry missing on one side counts as 0.
    pub fn max_abs_diff(&self, other: &ProteinVector) -> f64 {
        Protein::ALL
            .into_iter()
            .filter(|p| self.contains(*p) || other.contains(*p))
            .map(|p| (self.get(p).unwrap_or(0.0) - other.get(p).unwrap_or(0.0)).abs())
            .fold(0.0, f64::max)
    }
}

impl ProteinCounts {
    pub fn total(&self) -> u32 {
        self.iter().map(|(_, v)| v).sum()
    }

    /// Add `other` entry-wise; entries only in `other` are inserted.
    pub fn accumulate(&mut self, other: &ProteinCounts) {
        for (p, v) in other.iter() {
            let current = self.get(p).unwrap_or(0);
            self.insert(p, current + v);
        }
    }
}

impl<T: Copy + Serialize> Serialize for ProteinMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (p, v) in self.iter() {
            map.serialize_entry(p.as_str(), &v)?;
        }
        map.end()
    }
}

impl<'de, T: Copy + Deserialize<'de>> Deserialize<'de> for ProteinMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<Protein, T>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

// ── AvailableProteins ─────────────────────────────────────────────────────────

/// Ordered, de-duplicated set of proteins catered for one
/// (flight, date, cabin, meal time).
///
/// The order is the allocator's tie-break basis: on equal remainders the
/// protein listed first receives the extra meal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailableProteins(Vec<Protein>);

impl AvailableProteins {
    /// Alphabetical, de-duplicated. This is the ordering used by prediction.
    pub fn canonical(proteins: impl IntoIterator<Item = Protein>) -> Self {
        let mut list: Vec<Protein> = proteins.into_iter().collect();
        list.sort();
        list.dedup();
        Self(list)
    }

    /// Keeps first-seen order (e.g. catalog order), dropping repeats.
    pub fn in_given_order(proteins: impl IntoIterator<Item = Protein>) -> Self {
        let mut list: Vec<Protein> = Vec::new();
        for p in proteins {
            if !list.contains(&p) {
                list.push(p);
            }
        }
        Self(list)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, protein: Protein) -> bool {
        self.0.contains(&protein)
    }

    pub fn iter(&self) -> impl Iterator<Item = Protein> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Protein] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" chicken ".parse::<Protein>().unwrap(), Protein::Chicken);
        assert_eq!("VEGETARIAN".parse::<Protein>().unwrap(), Protein::Vegetarian);
        assert!("Tofu".parse::<Protein>().is_err());
    }

    #[test]
    fn test_missing_differs_from_zero() {
        let mut v = ProteinVector::new();
        v.insert(Protein::Beef, 0.0);
        assert!(v.contains(Protein::Beef));
        assert!(!v.contains(Protein::Pork));
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        let v: ProteinVector = [(Protein::Beef, -0.1)].into_iter().collect();
        assert!(matches!(v.validate(), Err(EngineError::InvalidProbability { protein: Protein::Beef, .. })));
        let v: ProteinVector = [(Protein::Lamb, f64::NAN)].into_iter().collect();
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_canonical_is_alphabetical_and_deduped() {
        let set = AvailableProteins::canonical([Protein::Vegetarian, Protein::Beef, Protein::Chicken, Protein::Beef]);
        assert_eq!(set.as_slice(), &[Protein::Beef, Protein::Chicken, Protein::Vegetarian]);
        let given = AvailableProteins::in_given_order([Protein::Vegetarian, Protein::Beef, Protein::Vegetarian]);
        assert_eq!(given.as_slice(), &[Protein::Vegetarian, Protein::Beef]);
    }

    #[test]
    fn test_counts_accumulate() {
        let mut a: ProteinCounts = [(Protein::Beef, 3)].into_iter().collect();
        let b: ProteinCounts = [(Protein::Beef, 2), (Protein::Chicken, 4)].into_iter().collect();
        a.accumulate(&b);
        assert_eq!(a.get(Protein::Beef), Some(5));
        assert_eq!(a.get(Protein::Chicken), Some(4));
        assert_eq!(a.total(), 9);
    }

    #[test]
    fn test_serializes_as_named_map() {
        let v: ProteinCounts = [(Protein::Chicken, 6), (Protein::Beef, 4)].into_iter().collect();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"Beef":4,"Chicken":6}"#);
        let back: ProteinCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
