//! Probability tables and the signal lookup seam.
//!
//! A [`ProbabilityTable`] is immutable after load. Per-session overrides live
//! in [`crate::overlay`] and shadow a table through the same
//! [`ProbabilityProvider`] trait, so the prediction pipeline never knows
//! which one it is reading.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::normalise::{equal_distribution, normalise_restricted, restrict};
use crate::protein::{AvailableProteins, ProteinVector};
use crate::signal::{Signal, SignalKey};

/// One row of a probability table. `reasoning` and `sources` are carried
/// through to the summary writer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRow {
    pub probabilities: ProteinVector,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub sources: Option<String>,
}

impl ProbabilityRow {
    /// Fails on negative or non-finite values.
    pub fn new(probabilities: ProteinVector) -> Result<Self> {
        probabilities.validate()?;
        Ok(Self { probabilities, reasoning: None, sources: None })
    }

    pub fn with_notes(mut self, reasoning: Option<String>, sources: Option<String>) -> Self {
        self.reasoning = reasoning.filter(|s| !s.trim().is_empty());
        self.sources = sources.filter(|s| !s.trim().is_empty());
        self
    }
}

// ── ProbabilityTable ──────────────────────────────────────────────────────────

/// Rows of a single signal, keyed by [`SignalKey`].
#[derive(Debug, Clone)]
pub struct ProbabilityTable {
    signal: Signal,
    rows: HashMap<SignalKey, ProbabilityRow>,
}

impl ProbabilityTable {
    pub fn new(signal: Signal) -> Self {
        Self { signal, rows: HashMap::new() }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Insert a row, replacing any earlier row for the same key.
    pub fn insert(&mut self, key: SignalKey, row: ProbabilityRow) -> Result<Option<ProbabilityRow>> {
        if key.signal() != self.signal {
            return Err(EngineError::SignalMismatch { expected: self.signal, key });
        }
        row.probabilities.validate()?;
        Ok(self.rows.insert(key, row))
    }

    /// Exact-key lookup.
    pub fn get(&self, key: &SignalKey) -> Option<&ProbabilityRow> {
        self.rows.get(key)
    }

    /// Qualified key first, then its base form.
    pub fn resolve(&self, key: &SignalKey) -> Option<&ProbabilityRow> {
        self.rows.get(key).or_else(|| {
            if key.qualifier().is_some() {
                self.rows.get(&key.base())
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SignalKey, &ProbabilityRow)> {
        self.rows.iter()
    }
}

// ── Lookup seam ───────────────────────────────────────────────────────────────

/// Where a signal vector came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Overlay,
    Table,
    /// Key missing, or its restricted row summed to zero.
    Fallback,
}

/// A signal vector restricted to the cohort's available proteins and
/// summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalLookup {
    pub vector: ProteinVector,
    pub source: LookupSource,
}

impl SignalLookup {
    pub fn fallback(available: &AvailableProteins) -> Self {
        Self { vector: equal_distribution(available), source: LookupSource::Fallback }
    }

    pub(crate) fn from_row(row: &ProteinVector, available: &AvailableProteins, source: LookupSource) -> Self {
        if restrict(row, available).sum() > 0.0 {
            Self { vector: normalise_restricted(Some(row), available), source }
        } else {
            Self::fallback(available)
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == LookupSource::Fallback
    }
}

/// Resolves a signal key against the cohort's available proteins.
///
/// Implementations:
/// - [`SignalTables`]: the immutable snapshot loaded at start
/// - [`crate::overlay::OverlayView`]: a session overlay shadowing a snapshot
pub trait ProbabilityProvider: Send + Sync {
    /// Never fails: missing keys resolve to the equal-probability fallback.
    fn lookup(&self, key: &SignalKey, available: &AvailableProteins) -> SignalLookup;

    /// The underlying table row (with its notes), if one resolves for `key`.
    fn row(&self, key: &SignalKey) -> Option<&ProbabilityRow>;
}

// ── SignalTables ──────────────────────────────────────────────────────────────

/// The four probability tables, one per signal.
#[derive(Debug, Clone)]
pub struct SignalTables {
    pub nationality: ProbabilityTable,
    pub age: ProbabilityTable,
    pub destination: ProbabilityTable,
    pub meal_time: ProbabilityTable,
}

impl Default for SignalTables {
    fn default() -> Self {
        Self {
            nationality: ProbabilityTable::new(Signal::Nationality),
            age: ProbabilityTable::new(Signal::Age),
            destination: ProbabilityTable::new(Signal::Destination),
            meal_time: ProbabilityTable::new(Signal::MealTime),
        }
    }
}

impl SignalTables {
    pub fn table(&self, signal: Signal) -> &ProbabilityTable {
        match signal {
            Signal::Nationality => &self.nationality,
            Signal::Age => &self.age,
            Signal::Destination => &self.destination,
            Signal::MealTime => &self.meal_time,
        }
    }

    pub fn table_mut(&mut self, signal: Signal) -> &mut ProbabilityTable {
        match signal {
            Signal::Nationality => &mut self.nationality,
            Signal::Age => &mut self.age,
            Signal::Destination => &mut self.destination,
            Signal::MealTime => &mut self.meal_time,
        }
    }

    /// Route a row to the table of its key's signal.
    pub fn insert(&mut self, key: SignalKey, row: ProbabilityRow) -> Result<Option<ProbabilityRow>> {
        self.table_mut(key.signal()).insert(key, row)
    }
}

impl ProbabilityProvider for SignalTables {
    fn lookup(&self, key: &SignalKey, available: &AvailableProteins) -> SignalLookup {
        match self.row(key) {
            Some(row) => SignalLookup::from_row(&row.probabilities, available, LookupSource::Table),
            None => SignalLookup::fallback(available),
        }
    }

    fn row(&self, key: &SignalKey) -> Option<&ProbabilityRow> {
        self.table(key.signal()).resolve(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protein::Protein;

    fn row(values: &[(Protein, f64)]) -> ProbabilityRow {
        ProbabilityRow::new(values.iter().copied().collect()).unwrap()
    }

    fn beef_chicken() -> AvailableProteins {
        AvailableProteins::canonical([Protein::Beef, Protein::Chicken])
    }

    #[test]
    fn test_insert_rejects_wrong_signal_and_bad_values() {
        let mut table = ProbabilityTable::new(Signal::Age);
        let err = table.insert(SignalKey::destination("Asia"), row(&[(Protein::Beef, 1.0)]));
        assert!(matches!(err, Err(EngineError::SignalMismatch { expected: Signal::Age, .. })));

        let bad = ProbabilityRow { probabilities: [(Protein::Beef, -1.0)].into_iter().collect(), reasoning: None, sources: None };
        assert!(table.insert(SignalKey::age("19-30"), bad).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_qualified_then_base_resolution() {
        let mut tables = SignalTables::default();
        tables.insert(SignalKey::age("19-30"), row(&[(Protein::Beef, 1.0)])).unwrap();
        tables
            .insert(SignalKey::age("19-30").qualified("Lunch"), row(&[(Protein::Chicken, 1.0)]))
            .unwrap();

        let lunch = tables.lookup(&SignalKey::age("19-30").qualified("Lunch"), &beef_chicken());
        assert_eq!(lunch.source, LookupSource::Table);
        assert_eq!(lunch.vector.get(Protein::Chicken), Some(1.0));

        let dinner = tables.lookup(&SignalKey::age("19-30").qualified("Dinner"), &beef_chicken());
        assert_eq!(dinner.source, LookupSource::Table);
        assert_eq!(dinner.vector.get(Protein::Beef), Some(1.0));
    }

    #[test]
    fn test_missing_key_falls_back() {
        let tables = SignalTables::default();
        let first = tables.lookup(&SignalKey::meal_time("Supper"), &beef_chicken());
        let second = tables.lookup(&SignalKey::meal_time("Supper"), &beef_chicken());
        assert!(first.is_fallback());
        assert_eq!(first, second);
        assert_eq!(first.vector.get(Protein::Beef), Some(0.5));
    }

    #[test]
    fn test_row_with_only_unavailable_mass_falls_back() {
        let mut tables = SignalTables::default();
        tables.insert(SignalKey::meal_time("Lunch"), row(&[(Protein::Pork, 1.0)])).unwrap();
        let out = tables.lookup(&SignalKey::meal_time("Lunch"), &beef_chicken());
        assert!(out.is_fallback());
    }

    #[test]
    fn test_notes_are_trimmed_to_none_when_blank() {
        let r = row(&[(Protein::Beef, 1.0)]).with_notes(Some("  ".into()), Some("survey 2023".into()));
        assert_eq!(r.reasoning, None);
        assert_eq!(r.sources.as_deref(), Some("survey 2023"));
    }
}
