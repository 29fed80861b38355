//! Weighted blending of the four signal vectors.
//!
//! ```text
//! weighted[p] = nat[p]*W1 + age[p]*W2 + dest[p]*W3 + meal[p]*W4
//! final[p]    = weighted[p] / Σ weighted      (equal split when Σ == 0)
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalise::equal_distribution;
use crate::protein::{AvailableProteins, ProteinVector};
use crate::signal::Signal;
use crate::weights::WeightSet;

/// Per-signal vectors of one cohort, each restricted to its available proteins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalVectors {
    pub nationality: ProteinVector,
    pub age: ProteinVector,
    pub destination: ProteinVector,
    pub meal_time: ProteinVector,
}

impl SignalVectors {
    pub fn get(&self, signal: Signal) -> &ProteinVector {
        match signal {
            Signal::Nationality => &self.nationality,
            Signal::Age => &self.age,
            Signal::Destination => &self.destination,
            Signal::MealTime => &self.meal_time,
        }
    }

    pub fn set(&mut self, signal: Signal, vector: ProteinVector) {
        match signal {
            Signal::Nationality => self.nationality = vector,
            Signal::Age => self.age = vector,
            Signal::Destination => self.destination = vector,
            Signal::MealTime => self.meal_time = vector,
        }
    }
}

/// Result of [`blend`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blend {
    /// Σ signal·weight before renormalisation
    pub weighted: ProteinVector,
    /// Sums to 1 over the available proteins
    pub final_distribution: ProteinVector,
    /// Each signal's weighted share of `weighted`
    pub contributions: BTreeMap<Signal, ProteinVector>,
}

/// Blend a cohort's signal vectors. Pure; weights are used as given.
pub fn blend(vectors: &SignalVectors, weights: &WeightSet, available: &AvailableProteins) -> Blend {
    let contributions: BTreeMap<Signal, ProteinVector> = Signal::ALL
        .into_iter()
        .map(|signal| {
            let w = weights.weight(signal);
            let v = vectors.get(signal);
            let contribution = available.iter().map(|p| (p, v.get(p).unwrap_or(0.0) * w)).collect();
            (signal, contribution)
        })
        .collect();

    let weighted: ProteinVector = available
        .iter()
        .map(|p| {
            let total = contributions.values().map(|c| c.get(p).unwrap_or(0.0)).sum::<f64>();
            (p, total)
        })
        .collect();

    let sum = weighted.sum();
    let final_distribution = if sum > 0.0 {
        weighted.map(|_, v| v / sum)
    } else {
        equal_distribution(available)
    };

    Blend { weighted, final_distribution, contributions }
}
