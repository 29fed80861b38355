//! Cohort formation from passenger records.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::signal::{DayOfWeek, Signal, SignalKey};

/// One passenger as handed over by the manifest loader, after flight, date,
/// cabin and age-bucket filtering. Any dimension may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassengerRecord {
    pub nationality_code: Option<String>,
    pub age_group: Option<String>,
    pub destination_region: Option<String>,
    pub meal_time: Option<String>,
    /// Local departure timestamp; the weekday for nationality lookups comes from here.
    pub departure: Option<NaiveDateTime>,
    pub cabin_class: Option<String>,
}

/// Grouping tuple. Ordering is the iteration order of a [`CohortSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CohortKey {
    pub meal_time: String,
    pub nationality_code: String,
    pub age_group: String,
    pub destination_region: String,
    pub day_of_week: DayOfWeek,
}

/// Passengers sharing one [`CohortKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    pub key: CohortKey,
    pub passenger_count: u32,
    /// Signal keys carry the cohort's meal time as a qualifier.
    #[serde(default = "default_qualified")]
    pub qualified: bool,
}

fn default_qualified() -> bool {
    true
}

impl Cohort {
    pub fn meal_time(&self) -> &str {
        &self.key.meal_time
    }

    /// Lookup key for one signal.
    pub fn signal_key(&self, signal: Signal) -> SignalKey {
        let k = &self.key;
        let base = match signal {
            Signal::Nationality => SignalKey::nationality(&k.nationality_code, k.day_of_week),
            Signal::Age => SignalKey::age(&k.age_group),
            Signal::Destination => SignalKey::destination(&k.destination_region),
            Signal::MealTime => return SignalKey::meal_time(&k.meal_time),
        };
        if self.qualified {
            base.qualified(&k.meal_time)
        } else {
            base
        }
    }

    /// Keys in [`Signal::ALL`] order.
    pub fn signal_keys(&self) -> [SignalKey; 4] {
        Signal::ALL.map(|s| self.signal_key(s))
    }
}

/// Output of [`CohortBuilder::build`]: cohorts sorted by key, plus the number
/// of records dropped for a missing dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortSet {
    pub cohorts: Vec<Cohort>,
    pub dropped: usize,
}

impl CohortSet {
    pub fn total_passengers(&self) -> u32 {
        self.cohorts.iter().map(|c| c.passenger_count).sum()
    }

    /// Distinct meal times, sorted.
    pub fn meal_times(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.cohorts.iter().map(Cohort::meal_time).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cohort> {
        self.cohorts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }
}

/// Partitions passenger records into cohorts.
#[derive(Debug, Clone, Copy)]
pub struct CohortBuilder {
    qualify_by_meal_time: bool,
}

impl Default for CohortBuilder {
    fn default() -> Self {
        Self { qualify_by_meal_time: true }
    }
}

impl CohortBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// When false, signal keys are the plain category keys.
    pub fn qualify_by_meal_time(mut self, yes: bool) -> Self {
        self.qualify_by_meal_time = yes;
        self
    }

    pub fn build<'a>(&self, records: impl IntoIterator<Item = &'a PassengerRecord>) -> CohortSet {
        let mut counts: BTreeMap<CohortKey, u32> = BTreeMap::new();
        let mut dropped = 0usize;

        for record in records {
            match cohort_key(record) {
                Some(key) => *counts.entry(key).or_insert(0) += 1,
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::debug!(dropped, "Passenger records missing a cohort dimension were excluded");
        }

        let cohorts = counts
            .into_iter()
            .map(|(key, passenger_count)| Cohort { key, passenger_count, qualified: self.qualify_by_meal_time })
            .collect();

        CohortSet { cohorts, dropped }
    }
}

fn dimension(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn cohort_key(record: &PassengerRecord) -> Option<CohortKey> {
    Some(CohortKey {
        meal_time: dimension(&record.meal_time)?,
        nationality_code: dimension(&record.nationality_code)?,
        age_group: dimension(&record.age_group)?,
        destination_region: dimension(&record.destination_region)?,
        day_of_week: DayOfWeek::of(record.departure.as_ref()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};
    use pretty_assertions::assert_eq;

    fn record(nat: &str, age: &str, dest: &str, meal: &str) -> PassengerRecord {
        PassengerRecord {
            nationality_code: Some(nat.into()),
            age_group: Some(age.into()),
            destination_region: Some(dest.into()),
            meal_time: Some(meal.into()),
            // 2025-03-17 is a Monday
            departure: NaiveDate::from_ymd_opt(2025, 3, 17).and_then(|d| d.and_hms_opt(9, 40, 0)),
            cabin_class: Some("Y".into()),
        }
    }

    #[test]
    fn test_groups_identical_tuples() {
        let records = vec![
            record("SG", "19-30", "North America", "Lunch"),
            record("SG", "19-30", "North America", "Lunch"),
            record("IN", "31-45", "North America", "Lunch"),
            record("SG", "19-30", "North America", "Dinner"),
        ];
        let set = CohortBuilder::new().build(&records);
        assert_eq!(set.cohorts.len(), 3);
        assert_eq!(set.total_passengers(), 4);
        assert_eq!(set.dropped, 0);
        assert_eq!(set.meal_times(), vec!["Dinner", "Lunch"]);

        let sg_lunch = set
            .iter()
            .find(|c| c.key.nationality_code == "SG" && c.meal_time() == "Lunch")
            .unwrap();
        assert_eq!(sg_lunch.passenger_count, 2);
        assert_eq!(sg_lunch.key.day_of_week, DayOfWeek(Weekday::Mon));
    }

    #[test]
    fn test_incomplete_records_are_dropped() {
        let mut blank_age = record("SG", "", "Asia", "Lunch");
        blank_age.age_group = Some("   ".into());
        let mut no_time = record("SG", "19-30", "Asia", "Lunch");
        no_time.departure = None;
        let mut no_meal = record("SG", "19-30", "Asia", "Lunch");
        no_meal.meal_time = None;

        let set = CohortBuilder::new().build(&[blank_age, no_time, no_meal, record("SG", "19-30", "Asia", "Lunch")]);
        assert_eq!(set.dropped, 3);
        assert_eq!(set.total_passengers(), 1);
    }

    #[test]
    fn test_order_is_deterministic() {
        let a = vec![record("US", "60+", "Asia", "Lunch"), record("AU", "19-30", "Asia", "Breakfast")];
        let b: Vec<_> = a.iter().rev().cloned().collect();
        assert_eq!(CohortBuilder::new().build(&a), CohortBuilder::new().build(&b));
        assert_eq!(CohortBuilder::new().build(&a).cohorts[0].meal_time(), "Breakfast");
    }

    #[test]
    fn test_signal_keys_follow_qualification() {
        let set = CohortBuilder::new().build(&[record("SG", "19-30", "Asia", "Lunch")]);
        let keys = set.cohorts[0].signal_keys();
        assert_eq!(keys[1], SignalKey::age("19-30").qualified("Lunch"));
        assert_eq!(keys[3], SignalKey::meal_time("Lunch"));

        let plain = CohortBuilder::new()
            .qualify_by_meal_time(false)
            .build(&[record("SG", "19-30", "Asia", "Lunch")]);
        assert_eq!(plain.cohorts[0].signal_key(Signal::Destination), SignalKey::destination("Asia"));
    }
}
