//! End-to-end prediction: cohorts → lookups → blend → allocate → aggregate.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::aggregate::Aggregation;
use crate::allocate::allocate;
use crate::blend::{blend, SignalVectors};
use crate::cohort::{Cohort, CohortSet};
use crate::protein::{AvailableProteins, ProteinCounts, ProteinVector};
use crate::signal::{Signal, SignalKey};
use crate::table::{LookupSource, ProbabilityProvider};
use crate::weights::WeightSet;

/// How one signal resolved for one cohort.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDetail {
    pub key: SignalKey,
    pub vector: ProteinVector,
    pub source: LookupSource,
}

/// Everything computed for one cohort, kept for introspection and for the
/// summary writer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortBreakdown {
    pub cohort: Cohort,
    pub available: AvailableProteins,
    pub signals: BTreeMap<Signal, SignalDetail>,
    /// Each signal's weighted share, per protein
    pub contributions: BTreeMap<Signal, ProteinVector>,
    pub weighted: ProteinVector,
    pub final_distribution: ProteinVector,
    pub counts: ProteinCounts,
}

/// Data-quality counters for one run. None of these abort a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Lookups that fell back to the equal split, per signal
    pub fallbacks: BTreeMap<Signal, usize>,
    /// Records dropped by the cohort builder
    pub dropped_records: usize,
    /// Cohorts whose meal time had no available proteins
    pub skipped_cohorts: usize,
    pub skipped_passengers: u32,
    pub skipped_meal_times: BTreeSet<String>,
}

impl Diagnostics {
    pub fn total_fallbacks(&self) -> usize {
        self.fallbacks.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Meal counts per meal time. Meal times with nothing available are absent.
    pub meal_counts: Aggregation<String>,
    pub breakdowns: Vec<CohortBreakdown>,
    pub diagnostics: Diagnostics,
}

impl Prediction {
    /// `{meal_time: {protein: count}}`
    pub fn counts(&self) -> BTreeMap<String, ProteinCounts> {
        self.meal_counts.clone().into_predicted()
    }

    pub fn total_meals(&self) -> u32 {
        self.meal_counts.total()
    }
}

/// Predict meal counts for `cohorts`.
///
/// `availability` maps meal time → available proteins. Cohorts whose meal
/// time is missing from it, or maps to an empty set, are skipped and counted
/// in [`Diagnostics`].
pub fn predict<P>(
    cohorts: &CohortSet,
    provider: &P,
    availability: &BTreeMap<String, AvailableProteins>,
    weights: &WeightSet,
) -> Prediction
where
    P: ProbabilityProvider + ?Sized,
{
    let mut diagnostics = Diagnostics { dropped_records: cohorts.dropped, ..Diagnostics::default() };
    let mut meal_counts = Aggregation::new();
    let mut breakdowns = Vec::with_capacity(cohorts.cohorts.len());

    for cohort in cohorts.iter() {
        let available = match availability.get(cohort.meal_time()) {
            Some(set) if !set.is_empty() => set,
            _ => {
                diagnostics.skipped_cohorts += 1;
                diagnostics.skipped_passengers += cohort.passenger_count;
                diagnostics.skipped_meal_times.insert(cohort.meal_time().to_string());
                continue;
            }
        };

        let mut vectors = SignalVectors::default();
        let mut signals = BTreeMap::new();
        for signal in Signal::ALL {
            let key = cohort.signal_key(signal);
            let lookup = provider.lookup(&key, available);
            if lookup.is_fallback() {
                *diagnostics.fallbacks.entry(signal).or_insert(0) += 1;
                tracing::debug!(%key, "No usable probability row, using equal split");
            }
            vectors.set(signal, lookup.vector);
            signals.insert(signal, SignalDetail { key, vector: lookup.vector, source: lookup.source });
        }

        let blended = blend(&vectors, weights, available);
        let counts = allocate(cohort.passenger_count, &blended.final_distribution, available);
        meal_counts.add(cohort.meal_time().to_string(), &counts);

        breakdowns.push(CohortBreakdown {
            cohort: cohort.clone(),
            available: available.clone(),
            signals,
            contributions: blended.contributions,
            weighted: blended.weighted,
            final_distribution: blended.final_distribution,
            counts,
        });
    }

    if !diagnostics.skipped_meal_times.is_empty() {
        tracing::warn!(
            meal_times = ?diagnostics.skipped_meal_times,
            passengers = diagnostics.skipped_passengers,
            "Skipped meal times with no available proteins"
        );
    }
    tracing::info!(
        cohorts = breakdowns.len(),
        meals = meal_counts.total(),
        fallbacks = diagnostics.total_fallbacks(),
        dropped = diagnostics.dropped_records,
        "Prediction complete"
    );

    Prediction { meal_counts, breakdowns, diagnostics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::{CohortBuilder, PassengerRecord};
    use crate::protein::Protein::{Beef, Chicken};
    use crate::table::{ProbabilityRow, SignalTables};
    use chrono::NaiveDate;

    fn passenger(nat: &str, meal: &str) -> PassengerRecord {
        PassengerRecord {
            nationality_code: Some(nat.into()),
            age_group: Some("31-45".into()),
            destination_region: Some("North America".into()),
            meal_time: Some(meal.into()),
            departure: NaiveDate::from_ymd_opt(2025, 3, 17).and_then(|d| d.and_hms_opt(9, 0, 0)),
            cabin_class: Some("Y".into()),
        }
    }

    #[test]
    fn test_missing_meal_time_is_skipped_not_zero_filled() {
        let records = vec![passenger("SG", "Lunch"), passenger("SG", "Supper"), passenger("SG", "Supper")];
        let cohorts = CohortBuilder::new().build(&records);
        let availability = BTreeMap::from([
            ("Lunch".to_string(), AvailableProteins::canonical([Beef, Chicken])),
            ("Supper".to_string(), AvailableProteins::default()),
        ]);
        let out = predict(&cohorts, &SignalTables::default(), &availability, &WeightSet::default());

        assert_eq!(out.counts().keys().collect::<Vec<_>>(), vec!["Lunch"]);
        assert_eq!(out.diagnostics.skipped_cohorts, 1);
        assert_eq!(out.diagnostics.skipped_passengers, 2);
        assert_eq!(out.total_meals(), 1);
    }

    #[test]
    fn test_fallbacks_are_counted_per_signal() {
        let mut tables = SignalTables::default();
        tables
            .insert(SignalKey::meal_time("Lunch"), ProbabilityRow::new([(Beef, 1.0)].into_iter().collect()).unwrap())
            .unwrap();
        let cohorts = CohortBuilder::new().build(&[passenger("SG", "Lunch")]);
        let availability = BTreeMap::from([("Lunch".to_string(), AvailableProteins::canonical([Beef, Chicken]))]);
        let out = predict(&cohorts, &tables, &availability, &WeightSet::default());

        assert_eq!(out.diagnostics.fallbacks.get(&Signal::MealTime), None);
        assert_eq!(out.diagnostics.fallbacks.get(&Signal::Nationality), Some(&1));
        assert_eq!(out.diagnostics.total_fallbacks(), 3);
        let detail = &out.breakdowns[0].signals[&Signal::MealTime];
        assert_eq!(detail.source, LookupSource::Table);
    }
}
