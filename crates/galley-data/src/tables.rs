//! Loaders for the four probability tables.
//!
//! Each table is a CSV with one row per key. Protein columns are found by
//! header name, so a file may carry any subset of the known proteins and in
//! any order. An optional `meal_time` column turns a row into a
//! meal-time-qualified override for the non-meal-time signals.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use csv::StringRecord;
use galley_engine::{DayOfWeek, ProbabilityRow, ProbabilityTable, Protein, ProteinVector, Signal, SignalKey};
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};

pub const NATIONALITY_FILE: &str = "Nationality.csv";
pub const AGE_FILE: &str = "Age.csv";
pub const DESTINATION_FILE: &str = "Destination.csv";
pub const MEAL_TIME_FILE: &str = "MealTime.csv";

/// File name of the table backing `signal`.
pub fn file_name(signal: Signal) -> &'static str {
    match signal {
        Signal::Nationality => NATIONALITY_FILE,
        Signal::Age => AGE_FILE,
        Signal::Destination => DESTINATION_FILE,
        Signal::MealTime => MEAL_TIME_FILE,
    }
}

/// Header lookup for one CSV file.
pub(crate) struct Columns {
    file: String,
    index: HashMap<String, usize>,
}

impl Columns {
    pub(crate) fn new(file: &str, headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_string(), i))
            .collect();
        Self { file: file.to_string(), index }
    }

    pub(crate) fn find(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn require(&self, name: &str) -> Result<usize> {
        self.find(name).ok_or_else(|| DataError::MissingColumn {
            file: self.file.clone(),
            column: name.to_string(),
        })
    }

    /// Trimmed cell, `None` when the column is absent or the cell blank.
    pub(crate) fn cell<'r>(&self, record: &'r StringRecord, column: Option<usize>) -> Option<&'r str> {
        column
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A loaded table plus the airport → region map that only the destination
/// table carries.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: ProbabilityTable,
    pub airport_regions: BTreeMap<String, String>,
}

/// Read one probability table. Duplicate keys keep the first row.
pub fn read_table<R: Read>(signal: Signal, reader: R) -> Result<LoadedTable> {
    let file = file_name(signal);
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers().map_err(|e| DataError::csv(file, e))?.clone();
    let columns = Columns::new(file, &headers);

    let key_columns: Vec<usize> = match signal {
        Signal::Nationality => vec![columns.require("nationality_code")?, columns.require("day_of_week")?],
        Signal::Age => vec![columns.require("age_group")?],
        Signal::Destination => vec![columns.require("destination_region")?],
        Signal::MealTime => vec![columns.require("meal_time")?],
    };
    let meal_time_col = columns.find("meal_time");
    let airport_col = columns.find("airport_code");
    let reasoning_col = columns.find("reasoning");
    let sources_col = columns.find("sources");

    let protein_cols: Vec<(Protein, usize)> = Protein::ALL
        .into_iter()
        .filter_map(|p| columns.find(p.as_str()).map(|i| (p, i)))
        .collect();
    if protein_cols.is_empty() {
        return Err(DataError::MissingColumn { file: file.to_string(), column: "<protein>".to_string() });
    }

    let mut table = ProbabilityTable::new(signal);
    let mut airport_regions = BTreeMap::new();
    let mut skipped = 0usize;
    let mut duplicates = 0usize;

    for (i, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| DataError::csv(file, e))?;
        let line = i as u64 + 2;

        let parts: Vec<Option<&str>> = key_columns.iter().map(|&c| columns.cell(&record, Some(c))).collect();
        if parts.iter().any(Option::is_none) {
            skipped += 1;
            continue;
        }
        let parts: Vec<&str> = parts.into_iter().flatten().collect();

        let mut key = match signal {
            Signal::Nationality => {
                let day: DayOfWeek = parts[1]
                    .parse()
                    .map_err(|_| DataError::invalid(file, line, format!("unknown day_of_week '{}'", parts[1])))?;
                SignalKey::nationality(parts[0], day)
            }
            Signal::Age => SignalKey::age(repair_age_group(parts[0])),
            Signal::Destination => SignalKey::destination(parts[0]),
            Signal::MealTime => SignalKey::meal_time(parts[0]),
        };
        if signal != Signal::MealTime {
            if let Some(meal_time) = columns.cell(&record, meal_time_col) {
                key = key.qualified(meal_time);
            }
        }

        if let (Some(airport), Some(region)) = (columns.cell(&record, airport_col), parts.first()) {
            airport_regions.entry(airport.to_string()).or_insert_with(|| region.to_string());
        }

        if table.get(&key).is_some() {
            duplicates += 1;
            debug!(file, line, %key, "Duplicate row ignored");
            continue;
        }

        let mut probabilities = ProteinVector::new();
        for &(protein, col) in &protein_cols {
            if let Some(raw) = columns.cell(&record, Some(col)) {
                let value: f64 = raw
                    .parse()
                    .map_err(|_| DataError::invalid(file, line, format!("{protein}: '{raw}' is not a number")))?;
                probabilities.insert(protein, value);
            }
        }
        let row = ProbabilityRow::new(probabilities)
            .map_err(|e| DataError::invalid(file, line, e.to_string()))?
            .with_notes(
                columns.cell(&record, reasoning_col).map(str::to_string),
                columns.cell(&record, sources_col).map(str::to_string),
            );
        table.insert(key, row)?;
    }

    if skipped > 0 {
        warn!(file, skipped, "Rows with a blank key were skipped");
    }
    info!("Loaded {} {} rows ({} duplicates ignored)", table.len(), signal, duplicates);

    Ok(LoadedTable { table, airport_regions })
}

/// Spreadsheet exports turn the `2-18` bucket into a date.
pub fn repair_age_group(raw: &str) -> &str {
    if raw == "Feb-18" { "2-18" } else { raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_engine::Protein::{Beef, Chicken, Lamb, Pork};
    use galley_engine::ProbabilityProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reads_nationality_with_weekday_key() {
        let csv = "nationality_code,day_of_week,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian,reasoning,sources\n\
                   SG,Monday,0.1,0.4,0.2,0.2,0.05,0.05,Chicken rice,survey\n\
                   SG,Monday,0.9,0.1,0,0,0,0,,\n";
        let loaded = read_table(Signal::Nationality, csv.as_bytes()).unwrap();
        assert_eq!(loaded.table.len(), 1);

        let key = SignalKey::nationality("SG", "Monday".parse().unwrap());
        let row = loaded.table.get(&key).unwrap();
        assert_eq!(row.probabilities.get(Chicken), Some(0.4));
        assert_eq!(row.reasoning.as_deref(), Some("Chicken rice"));
        assert_eq!(row.sources.as_deref(), Some("survey"));
    }

    #[test]
    fn test_protein_columns_found_by_header() {
        let csv = "Vegetarian,age_group,Beef\n0.25,19-30,0.75\nFeb-18,Feb-18,\n";
        // second line has a non-numeric Vegetarian cell
        let err = read_table(Signal::Age, csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { line: 3, .. }), "{err}");

        let csv = "Vegetarian,age_group,Beef\n0.25,19-30,0.75\n1,Feb-18,\n";
        let loaded = read_table(Signal::Age, csv.as_bytes()).unwrap();
        let row = loaded.table.get(&SignalKey::age("19-30")).unwrap();
        assert_eq!(row.probabilities.get(Beef), Some(0.75));
        assert_eq!(row.probabilities.get(Pork), None);
        assert!(loaded.table.get(&SignalKey::age("2-18")).is_some());
    }

    #[test]
    fn test_destination_builds_airport_map() {
        let csv = "destination_region,airport_code,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian\n\
                   South Asia,MAA,0,0.3,0,0.2,0.2,0.3\n\
                   South Asia,DEL,0,0.3,0,0.2,0.2,0.3\n\
                   North America,JFK,0.1,0.3,0.3,0.2,0,0.1\n";
        let loaded = read_table(Signal::Destination, csv.as_bytes()).unwrap();
        assert_eq!(loaded.table.len(), 2);
        assert_eq!(loaded.airport_regions.get("DEL").map(String::as_str), Some("South Asia"));
        assert_eq!(loaded.airport_regions.get("JFK").map(String::as_str), Some("North America"));
    }

    #[test]
    fn test_meal_time_column_qualifies_rows() {
        let csv = "age_group,meal_time,Beef,Lamb\n19-30,,0.5,0.5\n19-30,Dinner,0.2,0.8\n";
        let loaded = read_table(Signal::Age, csv.as_bytes()).unwrap();
        let mut tables = galley_engine::SignalTables::default();
        *tables.table_mut(Signal::Age) = loaded.table;

        let available = galley_engine::AvailableProteins::canonical([Beef, Lamb]);
        let dinner = tables.lookup(&SignalKey::age("19-30").qualified("Dinner"), &available);
        let lunch = tables.lookup(&SignalKey::age("19-30").qualified("Lunch"), &available);
        assert_eq!(dinner.vector.get(Lamb), Some(0.8));
        assert_eq!(lunch.vector.get(Lamb), Some(0.5));
    }

    #[test]
    fn test_negative_probability_rejected() {
        let csv = "meal_time,Seafood,Vegetarian\nBreakfast,-0.1,1.1\n";
        let err = read_table(Signal::MealTime, csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { line: 2, .. }));
    }

    #[test]
    fn test_missing_key_column() {
        let err = read_table(Signal::Nationality, "nationality_code,Beef\nSG,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn { ref column, .. } if column == "day_of_week"));
    }
}
