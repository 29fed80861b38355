//! Signal importance weights W1..W4.

use galley_common::config::ImportanceWeights;
use serde::{Deserialize, Serialize};

use crate::signal::Signal;

/// Importance of each signal as fractions.
///
/// The blender uses these as given and renormalises its output, so only the
/// ratios between the four values matter. [`WeightSet::validate`] is for
/// callers that want to reject mis-summed input up front.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub nationality: f64,
    pub age: f64,
    pub destination: f64,
    pub meal_time: f64,
}

impl Default for WeightSet {
    fn default() -> Self {
        Self {
            nationality: 0.40,
            age:         0.20,
            destination: 0.25,
            meal_time:   0.15,
        }
    }
}

impl From<&ImportanceWeights> for WeightSet {
    fn from(w: &ImportanceWeights) -> Self {
        let [nationality, age, destination, meal_time] = w.as_fractions();
        Self { nationality, age, destination, meal_time }
    }
}

impl WeightSet {
    /// Build from percentages (e.g. 40/20/25/15).
    pub fn from_percentages(nationality: f64, age: f64, destination: f64, meal_time: f64) -> Self {
        Self {
            nationality: nationality / 100.0,
            age:         age / 100.0,
            destination: destination / 100.0,
            meal_time:   meal_time / 100.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// All weights finite, non-negative, and summing to ~1.0
    pub fn validate(&self) -> bool {
        self.as_array().iter().all(|w| w.is_finite() && *w >= 0.0) && (self.sum() - 1.0).abs() < 1e-6
    }

    /// Rescale so the weights sum to 1.0. A zero sum is left untouched.
    pub fn normalise(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.nationality /= sum;
            self.age         /= sum;
            self.destination /= sum;
            self.meal_time   /= sum;
        }
    }

    pub fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Nationality => self.nationality,
            Signal::Age => self.age,
            Signal::Destination => self.destination,
            Signal::MealTime => self.meal_time,
        }
    }

    /// In [`Signal::ALL`] order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.nationality, self.age, self.destination, self.meal_time]
    }
}
