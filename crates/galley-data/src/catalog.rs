//! Meal catalog (`meal_df_new.csv`): which meals are loaded on which
//! segment, date, cabin and meal service.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use galley_engine::{AvailableProteins, Protein, ProteinCounts};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dates::parse_iso_date;
use crate::error::{DataError, Result};

pub const CATALOG_FILE: &str = "meal_df_new.csv";

#[derive(Debug, Deserialize)]
struct RawMeal {
    #[serde(default)]
    segment: String,
    #[serde(default)]
    cabin_class: String,
    #[serde(default)]
    segment_local_departure_date: String,
    #[serde(default)]
    meal_time: String,
    #[serde(default)]
    meal_name: String,
    #[serde(default)]
    meal_pref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealEntry {
    pub segment: String,
    pub cabin_class: String,
    pub date: NaiveDate,
    pub meal_time: String,
    pub meal_name: String,
    /// Protein label as written in the file
    pub meal_pref: String,
    /// `None` when `meal_pref` is not a known protein
    #[serde(skip)]
    pub protein: Option<Protein>,
}

#[derive(Debug, Clone, Default)]
pub struct MealCatalog {
    entries: Vec<MealEntry>,
}

impl MealCatalog {
    pub fn new(entries: Vec<MealEntry>) -> Self {
        Self { entries }
    }

    /// Rows with an unparseable date are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        let mut undated = 0usize;
        let mut unknown = 0usize;

        for result in rdr.deserialize::<RawMeal>() {
            let raw = result.map_err(|e| DataError::csv(CATALOG_FILE, e))?;
            let Some(date) = parse_iso_date(&raw.segment_local_departure_date) else {
                undated += 1;
                continue;
            };
            let meal_pref = raw.meal_pref.trim().to_string();
            let protein = meal_pref.parse::<Protein>().ok();
            if protein.is_none() {
                unknown += 1;
            }
            entries.push(MealEntry {
                segment: raw.segment.trim().to_string(),
                cabin_class: raw.cabin_class.trim().to_string(),
                date,
                meal_time: raw.meal_time.trim().to_string(),
                meal_name: raw.meal_name.trim().to_string(),
                meal_pref,
                protein,
            });
        }

        if undated > 0 {
            warn!(undated, "Catalog rows without a parseable date were dropped");
        }
        if unknown > 0 {
            warn!(unknown, "Catalog rows with an unknown protein are listed but never allocated");
        }
        info!("Loaded {} catalog meals", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Meals for one segment and date, across cabins.
    pub fn entries_for(&self, segment: &str, date: NaiveDate) -> Vec<&MealEntry> {
        self.entries.iter().filter(|m| m.segment == segment && m.date == date).collect()
    }

    /// Meals for one segment, date and cabin, grouped by meal time.
    pub fn meals_for_cabin(&self, segment: &str, date: NaiveDate, cabin: &str) -> BTreeMap<String, Vec<&MealEntry>> {
        let mut out: BTreeMap<String, Vec<&MealEntry>> = BTreeMap::new();
        for meal in self.entries_for(segment, date).into_iter().filter(|m| m.cabin_class == cabin) {
            out.entry(meal.meal_time.clone()).or_default().push(meal);
        }
        out
    }

    /// Available proteins per meal time for one cabin, in canonical order.
    /// Meal times whose meals carry no known protein are left out.
    pub fn availability(&self, segment: &str, date: NaiveDate, cabin: &str) -> BTreeMap<String, AvailableProteins> {
        self.meals_for_cabin(segment, date, cabin)
            .into_iter()
            .filter_map(|(meal_time, meals)| {
                let set = AvailableProteins::canonical(meals.iter().filter_map(|m| m.protein));
                (!set.is_empty()).then_some((meal_time, set))
            })
            .collect()
    }

    /// Meals per meal time, taking each meal time from the first cabin in
    /// `preference` that serves it.
    pub fn meals_by_time(&self, segment: &str, date: NaiveDate, preference: &[&str]) -> BTreeMap<String, Vec<&MealEntry>> {
        let mut by_time: BTreeMap<&str, Vec<&MealEntry>> = BTreeMap::new();
        for meal in self.entries_for(segment, date) {
            by_time.entry(meal.meal_time.as_str()).or_default().push(meal);
        }

        by_time
            .into_iter()
            .filter_map(|(meal_time, meals)| {
                preference.iter().find_map(|cabin| {
                    let chosen: Vec<&MealEntry> = meals.iter().copied().filter(|m| m.cabin_class == *cabin).collect();
                    (!chosen.is_empty()).then(|| (meal_time.to_string(), chosen))
                })
            })
            .collect()
    }
}

// ── Meal-level view ───────────────────────────────────────────────────────────

/// One catalog meal with the count predicted for its protein.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealLine {
    pub meal_name: String,
    pub protein_type: String,
    pub count: u32,
    /// Share of the meal time's passengers, rounded to two decimals
    pub percentage: f64,
    /// Another meal in the same service has the same protein, so `count`
    /// is shared between them
    pub protein_repeated: bool,
}

/// Spread protein counts back over the meals of one service.
pub fn meal_lines(meals: &[&MealEntry], counts: &ProteinCounts, passenger_count: u32) -> Vec<MealLine> {
    meals
        .iter()
        .map(|meal| {
            let count = meal.protein.and_then(|p| counts.get(p)).unwrap_or(0);
            let percentage = if passenger_count > 0 && count > 0 {
                (f64::from(count) / f64::from(passenger_count) * 10_000.0).round() / 100.0
            } else {
                0.0
            };
            let same_protein = meals
                .iter()
                .filter(|other| other.meal_pref.eq_ignore_ascii_case(&meal.meal_pref))
                .count();
            MealLine {
                meal_name: meal.meal_name.clone(),
                protein_type: meal.protein.map(|p| p.to_string()).unwrap_or_else(|| meal.meal_pref.clone()),
                count,
                percentage,
                protein_repeated: same_protein > 1,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use galley_engine::Protein::{Beef, Chicken, Seafood};
    use pretty_assertions::assert_eq;

    const CSV: &str = "\
segment,cabin_class,segment_local_departure_date,meal_time,meal_name,meal_pref
SIN JFK,S,2025-03-15,Dinner,Braised beef,Beef
SIN JFK,S,2025-03-15,Dinner,Chicken satay,chicken
SIN JFK,S,2025-03-15,Dinner,Wagyu,Beef
SIN JFK,Y,2025-03-15,Breakfast,Congee,Seafood
SIN JFK,S,2025-03-15,Breakfast,Omelette,Egg
SIN JFK,S,2025-03-16,Dinner,Lamb rack,Lamb
SIN JFK,S,not a date,Dinner,Lamb rack,Lamb
";

    fn catalog() -> MealCatalog {
        MealCatalog::from_reader(CSV.as_bytes()).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
    }

    #[test]
    fn test_availability_per_cabin() {
        let cat = catalog();
        assert_eq!(cat.len(), 6);
        let business = cat.availability("SIN JFK", date(), "S");
        assert_eq!(business["Dinner"].as_slice(), &[Beef, Chicken]);
        // only an unknown protein on the business breakfast
        assert!(!business.contains_key("Breakfast"));

        let economy = cat.availability("SIN JFK", date(), "Y");
        assert_eq!(economy["Breakfast"].as_slice(), &[Seafood]);
        assert!(!economy.contains_key("Dinner"));
    }

    #[test]
    fn test_meals_by_time_prefers_cabins_in_order() {
        let cat = catalog();
        let meals = cat.meals_by_time("SIN JFK", date(), &["Y", "S"]);
        assert_eq!(meals["Breakfast"].len(), 1);
        assert_eq!(meals["Breakfast"][0].cabin_class, "Y");
        assert_eq!(meals["Dinner"].len(), 3);
        assert_eq!(meals["Dinner"][0].cabin_class, "S");
    }

    #[test]
    fn test_meal_lines_share_repeated_protein() {
        let cat = catalog();
        let business = cat.meals_for_cabin("SIN JFK", date(), "S");
        let dinner = &business["Dinner"];
        let counts: ProteinCounts = [(Beef, 4), (Chicken, 3)].into_iter().collect();
        let lines = meal_lines(dinner, &counts, 7);

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].count, 4);
        assert_eq!(lines[0].percentage, 57.14);
        assert!(lines[0].protein_repeated);
        assert_eq!(lines[1].protein_type, "Chicken");
        assert_eq!(lines[1].percentage, 42.86);
        assert!(!lines[1].protein_repeated);
    }

    #[test]
    fn test_meal_lines_zero_passengers() {
        let cat = catalog();
        let business = cat.meals_for_cabin("SIN JFK", date(), "S");
        let dinner = &business["Dinner"];
        let lines = meal_lines(dinner, &ProteinCounts::new(), 0);
        assert!(lines.iter().all(|l| l.count == 0 && l.percentage == 0.0));
    }
}
