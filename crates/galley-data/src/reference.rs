//! Historical meal counts (`<ORIG>_<DEST>_PredictionResults.csv`), shown
//! next to predictions for comparison. They never change a prediction.

use std::io::Read;

use chrono::NaiveDate;
use galley_engine::{Protein, ProteinCounts};
use serde::Deserialize;
use tracing::{debug, info};

use crate::dates::parse_iso_date;
use crate::error::{DataError, Result};

/// Reference file name for a segment such as `SIN JFK`.
pub fn reference_file_name(segment: &str) -> String {
    let parts: Vec<&str> = segment.split_whitespace().collect();
    format!("{}_PredictionResults.csv", parts.join("_"))
}

#[derive(Debug, Deserialize)]
struct RawReference {
    #[serde(default)]
    segment_local_departure_date: String,
    #[serde(default)]
    cabin_class: String,
    #[serde(default)]
    meal_time: String,
    #[serde(default)]
    protein_type: String,
    #[serde(default)]
    original_meal_count: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct ReferenceRow {
    date: NaiveDate,
    cabin_class: String,
    meal_time: String,
    protein: Protein,
    count: u32,
}

/// Reference counts for one segment.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    /// Rows with an unknown protein, a bad date or no count are skipped.
    pub fn from_reader<R: Read>(file: &str, reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for result in rdr.deserialize::<RawReference>() {
            let raw = result.map_err(|e| DataError::csv(file, e))?;
            let parsed = (
                parse_iso_date(&raw.segment_local_departure_date),
                raw.protein_type.parse::<Protein>().ok(),
                raw.original_meal_count.filter(|c| c.is_finite() && *c >= 0.0),
            );
            match parsed {
                (Some(date), Some(protein), Some(count)) => rows.push(ReferenceRow {
                    date,
                    cabin_class: raw.cabin_class.trim().to_string(),
                    meal_time: raw.meal_time.trim().to_string(),
                    protein,
                    count: count.round() as u32,
                }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(file, skipped, "Unusable reference rows skipped");
        }
        info!("Loaded {} reference rows from {}", rows.len(), file);
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Counts for one date, cabin and meal time. The first row per protein wins.
    pub fn counts_for(&self, date: NaiveDate, cabin: &str, meal_time: &str) -> Option<ProteinCounts> {
        let mut out = ProteinCounts::new();
        for row in self
            .rows
            .iter()
            .filter(|r| r.date == date && r.cabin_class == cabin && r.meal_time == meal_time)
        {
            if !out.contains(row.protein) {
                out.insert(row.protein, row.count);
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_engine::Protein::{Beef, Chicken};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_file_name_from_segment() {
        assert_eq!(reference_file_name("SIN JFK"), "SIN_JFK_PredictionResults.csv");
    }

    #[test]
    fn test_first_row_per_protein_wins() {
        let csv = "\
segment_local_departure_date,cabin_class,meal_time,protein_type,original_meal_count
2025-03-15,S,Dinner,Beef,12
2025-03-15,S,Dinner,Beef,99
2025-03-15,S,Dinner,Chicken,7.0
2025-03-15,Y,Dinner,Chicken,40
2025-03-15,S,Dinner,Tofu,3
2025-03-15,S,Dinner,Lamb,
";
        let table = ReferenceTable::from_reader("SIN_JFK_PredictionResults.csv", csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 4);

        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let dinner = table.counts_for(date, "S", "Dinner").unwrap();
        assert_eq!(dinner.get(Beef), Some(12));
        assert_eq!(dinner.get(Chicken), Some(7));
        assert_eq!(dinner.len(), 2);
        assert_eq!(table.counts_for(date, "S", "Lunch"), None);
    }
}
