//! Shared fixtures: a small but complete data directory.
//!
//! The fixture flight is `SQ 0024 (SIN → JFK)` on Saturday 2025-03-15. Ten
//! business-class passengers (SG, 19-30) take Lunch and Dinner; one infant
//! and two economy passengers are on board but never predicted for, since
//! the route is overridden to cabin `S`. With default weights the Lunch
//! prediction is Chicken 6, Beef 4.
//!
//! `SQ 0328 (SIN → MAA)` on Sunday 2025-03-16 only caters Seafood and
//! Vegetarian for Lunch, and the `Lunch` meal-time row has no mass on
//! either, so both of its cohorts read that row as the equal split.

use std::fs;
use std::path::Path;

use anyhow::Result;
use galley_common::GalleyConfig;
use tempfile::TempDir;

pub const FLIGHT_LABEL: &str = "SQ 0024 (SIN → JFK)";
pub const FLIGHT_NUMBER: &str = "SQ 0024";
pub const FLIGHT_DATE: &str = "2025-03-15";

pub const SPARSE_FLIGHT_LABEL: &str = "SQ 0328 (SIN → MAA)";
pub const SPARSE_FLIGHT_DATE: &str = "2025-03-16";

pub const NATIONALITY_CSV: &str = "\
nationality_code,day_of_week,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian,reasoning,sources
SG,Saturday,0,0.6,0.4,0,0,0,Weekend chicken rice,Cabin crew survey
IN,Saturday,0,0.3,0,0.2,0.2,0.3,Vegetarian share,
IN,Sunday,0,0.3,0,0.2,0.2,0.3,Vegetarian share,
US,Saturday,0.1,0.3,0.4,0.1,0.05,0.05,,
";

pub const AGE_CSV: &str = "\
age_group,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian,reasoning
19-30,0,0.5,0.5,0,0,0,Even split
31-45,0.1,0.3,0.3,0.1,0.1,0.1,
Feb-18,0,0.7,0.1,0,0,0.2,Children prefer chicken
";

pub const DESTINATION_CSV: &str = "\
destination_region,airport_code,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian,reasoning
North America,JFK,0,0.7,0.3,0,0,0,Comfort food on arrival
South Asia,MAA,0,0.3,0,0.2,0.2,0.3,
";

pub const MEAL_TIME_CSV: &str = "\
meal_time,Pork,Chicken,Beef,Seafood,Lamb,Vegetarian,reasoning
Lunch,0,0.5,0.5,0,0,0,
Dinner,0,0.2,0.4,0.3,0,0.1,Heavier evening meal
Breakfast,0,0.4,0,0.2,0,0.4,
";

pub const CATALOG_CSV: &str = "\
segment,cabin_class,segment_local_departure_date,meal_time,meal_name,meal_pref
SIN JFK,S,2025-03-15,Lunch,Hainanese chicken rice,Chicken
SIN JFK,S,2025-03-15,Lunch,Beef rendang,Beef
SIN JFK,S,2025-03-15,Dinner,Braised beef cheek,Beef
SIN JFK,S,2025-03-15,Dinner,Miso cod,Seafood
SIN JFK,S,2025-03-15,Dinner,Mushroom risotto,Vegetarian
SIN JFK,Y,2025-03-15,Lunch,Chicken curry,Chicken
SIN MAA,Y,2025-03-16,Lunch,Paneer tikka,Vegetarian
SIN MAA,Y,2025-03-16,Lunch,Fish curry,Seafood
";

pub const REFERENCE_CSV: &str = "\
segment_local_departure_date,cabin_class,meal_time,protein_type,original_meal_count
2025-03-15,S,Lunch,Chicken,7
2025-03-15,S,Lunch,Beef,3
";

const MANIFEST_HEADER: &str = "operating_flight_number,segment,departure_airport,arrival_airport,cabin_class,\
nationality_code,age_group,destination_region,meal_time,segment_local_departure_datetime,customer_number\n";

/// Manifest rows for the fixture flights.
pub fn manifest_csv() -> String {
    let mut out = String::from(MANIFEST_HEADER);
    let row = |out: &mut String, cabin: &str, nat: &str, age: &str, meal: &str, customer: &str| {
        out.push_str(&format!(
            "SQ 0024,SIN JFK,SIN,JFK,{cabin},{nat},{age},North America,{meal},15/03/2025 23:55,{customer}\n"
        ));
    };
    for i in 1..=10 {
        let customer = format!("C{i:03}");
        row(&mut out, "S", "SG", "19-30", "Lunch", &customer);
        row(&mut out, "S", "SG", "19-30", "Dinner", &customer);
    }
    row(&mut out, "S", "SG", "Under 2", "Lunch", "C011");
    row(&mut out, "Y", "US", "31-45", "Lunch", "C012");
    row(&mut out, "Y", "US", "31-45", "Lunch", "C013");
    out.push_str("SQ 0328,SIN MAA,SIN,MAA,Y,IN,31-45,South Asia,Lunch,16/03/2025 11:05,C100\n");
    out.push_str("SQ 0328,SIN MAA,SIN,MAA,Y,IN,Feb-18,South Asia,Lunch,16/03/2025 11:05,C101\n");
    out
}

/// Write the fixture data directory under `dir`.
pub fn write_fixture_data(dir: &Path) -> Result<()> {
    fs::write(dir.join("Nationality.csv"), NATIONALITY_CSV)?;
    fs::write(dir.join("Age.csv"), AGE_CSV)?;
    fs::write(dir.join("Destination.csv"), DESTINATION_CSV)?;
    fs::write(dir.join("MealTime.csv"), MEAL_TIME_CSV)?;
    fs::write(dir.join("meal_df_new.csv"), CATALOG_CSV)?;
    fs::write(dir.join("customers.csv"), manifest_csv())?;
    let results = dir.join("PredictionResults");
    fs::create_dir_all(&results)?;
    fs::write(results.join("SIN_JFK_PredictionResults.csv"), REFERENCE_CSV)?;
    Ok(())
}

/// A temp directory holding the fixture data, plus a config pointing at it.
/// Keep the [`TempDir`] alive for as long as the config is used.
pub fn fixture_config() -> Result<(TempDir, GalleyConfig)> {
    let dir = tempfile::tempdir()?;
    write_fixture_data(dir.path())?;
    let mut config = GalleyConfig::default();
    config.data.dir = dir.path().to_path_buf();
    Ok((dir, config))
}
