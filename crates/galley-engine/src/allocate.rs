//! Largest-remainder (Hare–Niemeyer) allocation of whole meals.

use std::cmp::Ordering;

use crate::protein::{AvailableProteins, Protein, ProteinCounts, ProteinVector};

struct Share {
    protein: Protein,
    floor: u32,
    remainder: f64,
}

/// Split `passenger_count` across `available` in proportion to
/// `final_distribution`. The result always sums to `passenger_count` and
/// carries an entry (possibly 0) for every available protein.
///
/// Equal remainders are broken by position in `available`: the earlier
/// protein gets the extra meal. If the distribution does not sum to 1 the
/// total is still exact: a large deficit cycles through the remainder order,
/// and an overshoot is taken back from the smallest remainders, latest
/// position first.
///
/// Returns an empty map when `available` is empty.
pub fn allocate(passenger_count: u32, final_distribution: &ProteinVector, available: &AvailableProteins) -> ProteinCounts {
    if available.is_empty() {
        return ProteinCounts::new();
    }

    let total = f64::from(passenger_count);
    let mut shares: Vec<Share> = available
        .iter()
        .map(|protein| {
            let p = final_distribution.get(protein).unwrap_or(0.0);
            debug_assert!(p.is_finite() && p >= 0.0, "distribution must be finite and non-negative");
            let exact = if p.is_finite() && p > 0.0 { total * p } else { 0.0 };
            let floor = exact.floor();
            Share { protein, floor: floor as u32, remainder: exact - floor }
        })
        .collect();

    let allocated: u64 = shares.iter().map(|s| u64::from(s.floor)).sum();
    let target = u64::from(passenger_count);

    match allocated.cmp(&target) {
        Ordering::Less => {
            // Stable sort: equal remainders keep AvailableProteins order.
            let mut order: Vec<usize> = (0..shares.len()).collect();
            order.sort_by(|&a, &b| {
                shares[b].remainder.partial_cmp(&shares[a].remainder).unwrap_or(Ordering::Equal)
            });
            let deficit = (target - allocated) as usize;
            for i in 0..deficit {
                shares[order[i % order.len()]].floor += 1;
            }
        }
        Ordering::Greater => {
            let mut order: Vec<usize> = (0..shares.len()).collect();
            order.sort_by(|&a, &b| {
                shares[a]
                    .remainder
                    .partial_cmp(&shares[b].remainder)
                    .unwrap_or(Ordering::Equal)
                    .then(b.cmp(&a))
            });
            let mut excess = allocated - target;
            while excess > 0 {
                for &i in &order {
                    if excess == 0 {
                        break;
                    }
                    if shares[i].floor > 0 {
                        shares[i].floor -= 1;
                        excess -= 1;
                    }
                }
            }
        }
        Ordering::Equal => {}
    }

    shares.into_iter().map(|s| (s.protein, s.floor)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protein::Protein::{Beef, Chicken, Lamb, Vegetarian};

    fn dist(values: &[(Protein, f64)]) -> ProteinVector {
        values.iter().copied().collect()
    }

    #[test]
    fn test_reference_allocation() {
        let available = AvailableProteins::canonical([Chicken, Beef]);
        let out = allocate(10, &dist(&[(Chicken, 0.59), (Beef, 0.41)]), &available);
        assert_eq!(out.get(Chicken), Some(6));
        assert_eq!(out.get(Beef), Some(4));
    }

    #[test]
    fn test_tie_goes_to_earlier_protein() {
        let available = AvailableProteins::canonical([Beef, Chicken]);
        let out = allocate(3, &dist(&[(Beef, 0.5), (Chicken, 0.5)]), &available);
        assert_eq!(out.get(Beef), Some(2));
        assert_eq!(out.get(Chicken), Some(1));

        // Reversing the given order flips the winner.
        let reversed = AvailableProteins::in_given_order([Chicken, Beef]);
        let out = allocate(3, &dist(&[(Beef, 0.5), (Chicken, 0.5)]), &reversed);
        assert_eq!(out.get(Chicken), Some(2));
    }

    #[test]
    fn test_zero_passengers_is_all_zero() {
        let available = AvailableProteins::canonical([Beef, Lamb]);
        let out = allocate(0, &dist(&[(Beef, 0.3), (Lamb, 0.7)]), &available);
        assert_eq!(out.get(Beef), Some(0));
        assert_eq!(out.get(Lamb), Some(0));
        assert_eq!(out.total(), 0);
    }

    #[test]
    fn test_single_protein_takes_everything() {
        let available = AvailableProteins::canonical([Vegetarian]);
        let out = allocate(17, &dist(&[(Vegetarian, 1.0)]), &available);
        assert_eq!(out.get(Vegetarian), Some(17));
    }

    #[test]
    fn test_unnormalised_distribution_still_sums() {
        let available = AvailableProteins::canonical([Beef, Chicken, Lamb]);
        // Under: floors sum to 0, deficit 7 cycles through three proteins.
        let under = allocate(7, &dist(&[(Beef, 0.01), (Chicken, 0.02), (Lamb, 0.0)]), &available);
        assert_eq!(under.total(), 7);
        assert_eq!(under.get(Chicken), Some(3));

        // Over: floors sum to 11, one meal taken back from the latest tie.
        let over = allocate(10, &dist(&[(Beef, 0.55), (Chicken, 0.45), (Lamb, 0.25)]), &available);
        assert_eq!(over.total(), 10);
        assert_eq!(over.get(Beef), Some(5));
    }

    #[test]
    fn test_missing_entries_count_as_zero() {
        let available = AvailableProteins::canonical([Beef, Chicken]);
        let out = allocate(4, &dist(&[(Chicken, 1.0)]), &available);
        assert_eq!(out.get(Beef), Some(0));
        assert_eq!(out.get(Chicken), Some(4));
    }

    #[test]
    fn test_empty_available_is_empty() {
        assert!(allocate(5, &ProteinVector::new(), &AvailableProteins::default()).is_empty());
    }
}
