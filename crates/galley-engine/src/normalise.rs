//! Restricted normalisation of probability rows.
//!
//! Values are first restricted to the available proteins and only then
//! divided by their sum. Normalising over every protein and discarding the
//! unavailable ones afterwards would bias the totals.

use crate::protein::{AvailableProteins, ProteinVector};

/// Equal probability `1 / |available|` for every available protein.
/// Empty when `available` is empty.
pub fn equal_distribution(available: &AvailableProteins) -> ProteinVector {
    if available.is_empty() {
        return ProteinVector::new();
    }
    let share = 1.0 / available.len() as f64;
    available.iter().map(|p| (p, share)).collect()
}

/// Raw values of `row` for the available proteins only. A protein absent from
/// the row reads as 0.
pub fn restrict(row: &ProteinVector, available: &AvailableProteins) -> ProteinVector {
    available.iter().map(|p| (p, row.get(p).unwrap_or(0.0))).collect()
}

/// Restrict `row` to `available` and scale it to sum to 1.
///
/// A missing row (`None`) or a zero restricted sum yields
/// [`equal_distribution`]. Rows are validated when they enter a table, so a
/// negative value here is a broken precondition.
pub fn normalise_restricted(row: Option<&ProteinVector>, available: &AvailableProteins) -> ProteinVector {
    let Some(row) = row else {
        return equal_distribution(available);
    };
    debug_assert!(row.validate().is_ok(), "probability rows must be validated on ingestion");

    let restricted = restrict(row, available);
    let total = restricted.sum();
    if total > 0.0 {
        restricted.map(|_, v| v / total)
    } else {
        equal_distribution(available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protein::Protein;

    fn available(ps: &[Protein]) -> AvailableProteins {
        AvailableProteins::canonical(ps.iter().copied())
    }

    #[test]
    fn test_restricts_before_normalising() {
        let row: ProteinVector = [
            (Protein::Beef, 0.2),
            (Protein::Chicken, 0.2),
            (Protein::Pork, 0.6),
        ]
        .into_iter()
        .collect();
        let out = normalise_restricted(Some(&row), &available(&[Protein::Beef, Protein::Chicken]));
        assert_eq!(out.len(), 2);
        assert!(!out.contains(Protein::Pork));
        assert!((out.get(Protein::Beef).unwrap() - 0.5).abs() < 1e-12);
        assert!((out.get(Protein::Chicken).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_row_is_equal_split() {
        let set = available(&[Protein::Beef, Protein::Lamb, Protein::Vegetarian]);
        let out = normalise_restricted(None, &set);
        for (_, v) in out.iter() {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_zero_restricted_sum_is_equal_split() {
        let row: ProteinVector = [(Protein::Pork, 1.0)].into_iter().collect();
        let out = normalise_restricted(Some(&row), &available(&[Protein::Beef, Protein::Chicken]));
        assert_eq!(out.get(Protein::Beef), Some(0.5));
        assert_eq!(out.get(Protein::Chicken), Some(0.5));
    }

    #[test]
    fn test_empty_available_gives_empty_vector() {
        let row: ProteinVector = [(Protein::Beef, 1.0)].into_iter().collect();
        assert!(normalise_restricted(Some(&row), &AvailableProteins::default()).is_empty());
        assert!(equal_distribution(&AvailableProteins::default()).is_empty());
    }
}
