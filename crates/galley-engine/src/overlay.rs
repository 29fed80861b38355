//! Per-session probability overrides.
//!
//! A [`SessionOverlay`] shadows the base [`SignalTables`] with meal-time
//! qualified rows for one flight and date. Overlays live in a [`SessionStore`]; each one is
//! locked on its own, so concurrent sessions never touch each other's rows.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::protein::{AvailableProteins, ProteinVector};
use crate::table::{LookupSource, ProbabilityProvider, ProbabilityRow, SignalLookup, SignalTables};
use crate::signal::{Signal, SignalKey};

/// A row counts as modified once any protein moves more than this from its default.
pub const MODIFIED_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayRow {
    /// Restricted, normalised table value at initialisation
    pub default: ProteinVector,
    pub current: ProteinVector,
    pub available: AvailableProteins,
    pub modified: bool,
    /// Where `default` came from when the row was seeded
    pub default_source: LookupSource,
}

impl OverlayRow {
    fn refresh_modified(&mut self) {
        self.modified = self.current.max_abs_diff(&self.default) > MODIFIED_TOLERANCE;
    }

    /// An untouched row seeded from the equal split still reads as a fallback.
    pub fn source(&self) -> LookupSource {
        if !self.modified && self.default_source == LookupSource::Fallback {
            LookupSource::Fallback
        } else {
            LookupSource::Overlay
        }
    }
}

/// Overrides for one analysis session.
#[derive(Debug, Clone, Default)]
pub struct SessionOverlay {
    rows: BTreeMap<SignalKey, OverlayRow>,
    version: u64,
}

impl SessionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// One row per table row and available meal time, holding the
    /// restricted, normalised value a prediction would read from `tables`.
    ///
    /// Unqualified rows are seeded once per meal time in `availability`;
    /// meal-time-qualified rows and `MealTime` rows only for their own meal time.
    pub fn seed(tables: &SignalTables, availability: &BTreeMap<String, AvailableProteins>) -> Self {
        let mut overlay = Self::new();
        for signal in Signal::ALL {
            for (key, _) in tables.table(signal).iter() {
                let own_meal_time = match key {
                    SignalKey::MealTime { meal_time } => Some(meal_time.as_str()),
                    other => other.qualifier(),
                };
                match own_meal_time {
                    Some(meal_time) => {
                        if let Some(available) = availability.get(meal_time) {
                            overlay.seed_row(tables, key.clone(), available);
                        }
                    }
                    None => {
                        for (meal_time, available) in availability {
                            overlay.seed_row(tables, key.qualified(meal_time), available);
                        }
                    }
                }
            }
        }
        tracing::debug!(rows = overlay.rows.len(), "Seeded session overlay");
        overlay
    }

    fn seed_row(&mut self, tables: &SignalTables, key: SignalKey, available: &AvailableProteins) {
        if available.is_empty() || self.rows.contains_key(&key) {
            return;
        }
        let seeded = tables.lookup(&key, available);
        self.rows.insert(
            key,
            OverlayRow {
                current: seeded.vector,
                default: seeded.vector,
                available: available.clone(),
                modified: false,
                default_source: seeded.source,
            },
        );
    }

    /// Set some or all proteins of a row. Proteins not named keep their
    /// current value.
    pub fn update(&mut self, key: &SignalKey, values: &ProteinVector) -> Result<&OverlayRow> {
        values.validate()?;
        let row = self.rows.get_mut(key).ok_or_else(|| EngineError::RowNotFound(key.clone()))?;
        if let Some(protein) = values.proteins().find(|p| !row.available.contains(*p)) {
            return Err(EngineError::ProteinNotAvailable { key: key.clone(), protein });
        }
        for (protein, value) in values.iter() {
            row.current.insert(protein, value);
        }
        row.refresh_modified();
        self.version += 1;
        Ok(row)
    }

    /// Restore a row to its default.
    pub fn reset(&mut self, key: &SignalKey) -> Result<()> {
        let row = self.rows.get_mut(key).ok_or_else(|| EngineError::RowNotFound(key.clone()))?;
        row.current = row.default;
        row.modified = false;
        self.version += 1;
        Ok(())
    }

    pub fn row(&self, key: &SignalKey) -> Option<&OverlayRow> {
        self.rows.get(key)
    }

    pub fn current(&self, key: &SignalKey) -> Option<&ProteinVector> {
        self.rows.get(key).map(|r| &r.current)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&SignalKey, &OverlayRow)> {
        self.rows.iter()
    }

    pub fn modified_rows(&self) -> impl Iterator<Item = (&SignalKey, &OverlayRow)> {
        self.rows.iter().filter(|(_, r)| r.modified)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bumped on every successful write.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Read this overlay on top of `tables`.
    pub fn view<'a>(&'a self, tables: &'a SignalTables) -> OverlayView<'a> {
        OverlayView { overlay: self, tables }
    }
}

/// A [`SessionOverlay`] shadowing a [`SignalTables`] snapshot.
#[derive(Debug, Clone, Copy)]
pub struct OverlayView<'a> {
    overlay: &'a SessionOverlay,
    tables: &'a SignalTables,
}

impl ProbabilityProvider for OverlayView<'_> {
    fn lookup(&self, key: &SignalKey, available: &AvailableProteins) -> SignalLookup {
        match self.overlay.row(key) {
            Some(row) => SignalLookup::from_row(&row.current, available, row.source()),
            None => self.tables.lookup(key, available),
        }
    }

    fn row(&self, key: &SignalKey) -> Option<&ProbabilityRow> {
        self.tables.row(key)
    }
}

// ── Sessions ──────────────────────────────────────────────────────────────────

/// Identifies one analysis session: a flight on a date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub flight_number: String,
    pub flight_date: NaiveDate,
}

impl SessionKey {
    pub fn new(flight_number: impl Into<String>, flight_date: NaiveDate) -> Self {
        Self { flight_number: flight_number.into(), flight_date }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flight_number, self.flight_date)
    }
}

pub type SharedOverlay = Arc<Mutex<SessionOverlay>>;

/// All live sessions. The map lock is held only to find or swap a session;
/// row reads and writes take that session's own lock.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, SharedOverlay>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `overlay` for `key`, replacing any earlier session.
    pub fn initialize(&self, key: SessionKey, overlay: SessionOverlay) {
        let rows = overlay.len();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = sessions.insert(key.clone(), Arc::new(Mutex::new(overlay))).is_some();
        tracing::info!(session = %key, rows, replaced, "Session initialised");
    }

    pub fn get(&self, key: &SessionKey) -> Option<SharedOverlay> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions.get(key).cloned()
    }

    /// Run `f` with exclusive access to one session's overlay.
    pub fn with_session<R>(&self, key: &SessionKey, f: impl FnOnce(&mut SessionOverlay) -> R) -> Result<R> {
        let overlay = self.get(key).ok_or_else(|| EngineError::SessionNotFound(key.to_string()))?;
        let mut guard = overlay.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut guard))
    }

    /// Remove one session. Returns whether it existed.
    pub fn clear(&self, key: &SessionKey) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(key).is_some();
        if removed {
            tracing::info!(session = %key, "Session cleared");
        }
        removed
    }

    /// Remove every session, returning how many there were.
    pub fn clear_all(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let n = sessions.len();
        sessions.clear();
        tracing::info!(sessions = n, "All sessions cleared");
        n
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protein::Protein::{Beef, Chicken, Pork};

    fn row(values: &[(crate::protein::Protein, f64)]) -> ProbabilityRow {
        ProbabilityRow::new(values.iter().copied().collect()).unwrap()
    }

    fn setup() -> (SignalTables, BTreeMap<String, AvailableProteins>) {
        let mut tables = SignalTables::default();
        tables.insert(SignalKey::meal_time("Lunch"), row(&[(Beef, 0.3), (Chicken, 0.7)])).unwrap();
        tables.insert(SignalKey::meal_time("Breakfast"), row(&[(Beef, 0.5), (Chicken, 0.5)])).unwrap();
        tables.insert(SignalKey::age("19-30"), row(&[(Beef, 0.2), (Chicken, 0.2), (Pork, 0.6)])).unwrap();
        let availability = BTreeMap::from([
            ("Lunch".to_string(), AvailableProteins::canonical([Beef, Chicken])),
            ("Dinner".to_string(), AvailableProteins::canonical([Beef, Pork])),
        ]);
        (tables, availability)
    }

    #[test]
    fn test_seed_holds_table_defaults() {
        let (tables, availability) = setup();
        let overlay = SessionOverlay::seed(&tables, &availability);
        // Lunch meal-time row, plus the age row for Lunch and Dinner.
        // Breakfast is not catered.
        assert_eq!(overlay.len(), 3);
        let lunch = overlay.row(&SignalKey::meal_time("Lunch")).unwrap();
        assert_eq!(lunch.default.get(Chicken), Some(0.7));
        assert!(!lunch.modified);

        let age_dinner = overlay.row(&SignalKey::age("19-30").qualified("Dinner")).unwrap();
        assert!((age_dinner.default.get(Pork).unwrap() - 0.75).abs() < 1e-12);
        assert!(!age_dinner.default.contains(Chicken));
        assert_eq!(overlay.modified_rows().count(), 0);
    }

    #[test]
    fn test_update_tracks_modified_flag() {
        let (tables, availability) = setup();
        let mut overlay = SessionOverlay::seed(&tables, &availability);
        let key = SignalKey::meal_time("Lunch");

        let tiny: ProteinVector = [(Chicken, 0.7005)].into_iter().collect();
        assert!(!overlay.update(&key, &tiny).unwrap().modified);

        let real: ProteinVector = [(Beef, 0.6), (Chicken, 0.4)].into_iter().collect();
        assert!(overlay.update(&key, &real).unwrap().modified);
        assert_eq!(overlay.modified_rows().count(), 1);
        assert_eq!(overlay.version(), 2);

        overlay.reset(&key).unwrap();
        assert_eq!(overlay.modified_rows().count(), 0);
    }

    #[test]
    fn test_update_rejects_unknown_row_and_unavailable_protein() {
        let (tables, availability) = setup();
        let mut overlay = SessionOverlay::seed(&tables, &availability);
        let pork: ProteinVector = [(Pork, 1.0)].into_iter().collect();
        assert!(matches!(
            overlay.update(&SignalKey::meal_time("Lunch"), &pork),
            Err(EngineError::ProteinNotAvailable { .. })
        ));
        assert!(matches!(
            overlay.update(&SignalKey::meal_time("Breakfast"), &pork),
            Err(EngineError::RowNotFound(_))
        ));
    }

    #[test]
    fn test_view_prefers_overlay() {
        let (tables, availability) = setup();
        let mut overlay = SessionOverlay::seed(&tables, &availability);
        let key = SignalKey::meal_time("Lunch");
        overlay.update(&key, &[(Beef, 0.9), (Chicken, 0.1)].into_iter().collect()).unwrap();

        let available = &availability["Lunch"];
        let view = overlay.view(&tables);
        let out = view.lookup(&key, available);
        assert_eq!(out.source, LookupSource::Overlay);
        assert!((out.vector.get(Beef).unwrap() - 0.9).abs() < 1e-12);
        assert_eq!(tables.lookup(&key, available).source, LookupSource::Table);
    }

    #[test]
    fn test_view_keeps_fallback_until_row_is_edited() {
        let mut tables = SignalTables::default();
        tables.insert(SignalKey::meal_time("Lunch"), row(&[(Pork, 1.0)])).unwrap();
        let availability =
            BTreeMap::from([("Lunch".to_string(), AvailableProteins::canonical([Beef, Chicken]))]);
        let available = &availability["Lunch"];
        let key = SignalKey::meal_time("Lunch");

        let mut overlay = SessionOverlay::seed(&tables, &availability);
        assert_eq!(overlay.row(&key).unwrap().default_source, LookupSource::Fallback);
        let seeded = overlay.view(&tables).lookup(&key, available);
        assert_eq!(seeded, tables.lookup(&key, available));
        assert!(seeded.is_fallback());

        overlay.update(&key, &[(Beef, 0.8), (Chicken, 0.2)].into_iter().collect()).unwrap();
        assert_eq!(overlay.view(&tables).lookup(&key, available).source, LookupSource::Overlay);

        overlay.reset(&key).unwrap();
        assert!(overlay.view(&tables).lookup(&key, available).is_fallback());
    }

    #[test]
    fn test_store_sessions_are_independent() {
        let (tables, availability) = setup();
        let store = SessionStore::new();
        let day = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let a = SessionKey::new("SQ 0024", day);
        let b = SessionKey::new("SQ 0026", day);
        store.initialize(a.clone(), SessionOverlay::seed(&tables, &availability));
        store.initialize(b.clone(), SessionOverlay::seed(&tables, &availability));

        let key = SignalKey::meal_time("Lunch");
        let values: ProteinVector = [(Beef, 1.0), (Chicken, 0.0)].into_iter().collect();
        store.with_session(&a, |o| o.update(&key, &values).map(|_| ())).unwrap().unwrap();

        assert_eq!(store.with_session(&a, |o| o.modified_rows().count()).unwrap(), 1);
        assert_eq!(store.with_session(&b, |o| o.modified_rows().count()).unwrap(), 0);

        assert!(store.clear(&a));
        assert!(matches!(store.with_session(&a, |_| ()), Err(EngineError::SessionNotFound(_))));
        assert_eq!(store.clear_all(), 1);
        assert!(store.is_empty());
    }
}
