//! Passenger manifest (`customers.csv`).
//!
//! One row per passenger per meal service, so a passenger on a two-meal
//! flight appears twice. Unique passengers are counted by `customer_number`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::Read;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use galley_engine::{DayOfWeek, PassengerRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cabin::CabinPolicy;
use crate::dates::parse_manifest_datetime;
use crate::error::{DataError, Result};
use crate::tables::repair_age_group;

pub const MANIFEST_FILE: &str = "customers.csv";

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    operating_flight_number: String,
    #[serde(default)]
    segment: String,
    #[serde(default)]
    departure_airport: String,
    #[serde(default)]
    arrival_airport: String,
    #[serde(default)]
    cabin_class: String,
    #[serde(default)]
    nationality_code: String,
    #[serde(default)]
    age_group: String,
    #[serde(default)]
    destination_region: String,
    #[serde(default)]
    meal_time: String,
    #[serde(default)]
    segment_local_departure_datetime: String,
    #[serde(default)]
    customer_number: Option<String>,
}

/// One manifest row, trimmed, with the departure parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    pub flight_number: String,
    pub segment: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub cabin_class: String,
    pub nationality_code: String,
    pub age_group: String,
    pub destination_region: String,
    pub meal_time: String,
    pub departure: Option<NaiveDateTime>,
    pub customer_number: Option<String>,
}

impl ManifestEntry {
    fn from_raw(raw: RawRow) -> Self {
        let departure_raw = raw.segment_local_departure_datetime.trim();
        Self {
            flight_number: raw.operating_flight_number.trim().to_string(),
            segment: raw.segment.trim().to_string(),
            departure_airport: raw.departure_airport.trim().to_string(),
            arrival_airport: raw.arrival_airport.trim().to_string(),
            cabin_class: raw.cabin_class.trim().to_string(),
            nationality_code: raw.nationality_code.trim().to_string(),
            age_group: repair_age_group(raw.age_group.trim()).to_string(),
            destination_region: raw.destination_region.trim().to_string(),
            meal_time: raw.meal_time.trim().to_string(),
            departure: parse_manifest_datetime(departure_raw),
            customer_number: raw
                .customer_number
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.departure.map(|d| d.date())
    }

    /// Identity used to count passengers once across meal services.
    fn passenger_identity(&self) -> String {
        match &self.customer_number {
            Some(c) => c.clone(),
            None => format!(
                "{}|{}|{}|{}|{}|{:?}",
                self.segment, self.cabin_class, self.nationality_code, self.age_group, self.destination_region, self.departure
            ),
        }
    }

    fn to_record(&self, destination_region: &str) -> PassengerRecord {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        PassengerRecord {
            nationality_code: non_empty(&self.nationality_code),
            age_group: non_empty(&self.age_group),
            destination_region: non_empty(destination_region),
            meal_time: non_empty(&self.meal_time),
            departure: self.departure,
            cabin_class: non_empty(&self.cabin_class),
        }
    }
}

/// Airport code at the end of a segment such as `SIN MAA`.
pub fn segment_destination(segment: &str) -> &str {
    segment.split_whitespace().last().unwrap_or(segment)
}

// ── Flight selection ──────────────────────────────────────────────────────────

/// Passengers of one flight on one date, ready for cohort formation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassengerSelection {
    pub flight_number: String,
    pub date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub segment: String,
    pub cabin_class: String,
    pub destination_airport: String,
    /// Region every passenger is predicted with, taken from the segment's
    /// arrival airport
    pub destination_region: String,
    pub records: Vec<PassengerRecord>,
    /// Distinct passengers behind `records`
    pub unique_passengers: usize,
    /// Distinct passengers per nationality code; records without one are left out
    pub nationality_counts: BTreeMap<String, usize>,
}

// ── Summaries ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub flight_number: String,
    pub flight_date: NaiveDate,
    pub day_of_week: DayOfWeek,
    pub total_customers: usize,
    pub cabin_distribution: BTreeMap<String, usize>,
    pub destination_airport: String,
    pub meal_times: Vec<String>,
    /// Cabin the breakdowns below are computed for
    pub analysis_cabin: Option<String>,
    pub nationality_breakdown: BTreeMap<String, usize>,
    pub age_breakdown: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightInfo {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub route: String,
    pub category: String,
    pub available_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightListing {
    pub flights: Vec<FlightInfo>,
    /// Distinct destination regions across the manifest
    pub categories: Vec<String>,
}

// ── Manifest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        let mut undated = 0usize;
        for result in rdr.deserialize::<RawRow>() {
            let raw = result.map_err(|e| DataError::csv(MANIFEST_FILE, e))?;
            let entry = ManifestEntry::from_raw(raw);
            if entry.departure.is_none() {
                undated += 1;
            }
            entries.push(entry);
        }
        if undated > 0 {
            debug!(undated, "Manifest rows without a parseable departure");
        }
        info!("Loaded {} manifest rows", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    fn flight_entries(&self, flight_number: &str, date: NaiveDate) -> Vec<&ManifestEntry> {
        let flight_number = flight_number.trim();
        self.entries
            .iter()
            .filter(|e| e.flight_number == flight_number && e.date() == Some(date))
            .collect()
    }

    /// Passengers of `flight_number` on `date`, minus `excluded_age_group`,
    /// restricted to the cabin `policy` picks for the flight's segment.
    ///
    /// Every passenger gets the region of the segment's arrival airport
    /// (looked up in `airport_regions`, or the airport code itself when
    /// unmapped). `None` when nobody is left.
    pub fn select(
        &self,
        flight_number: &str,
        date: NaiveDate,
        excluded_age_group: &str,
        policy: &CabinPolicy,
        airport_regions: &BTreeMap<String, String>,
    ) -> Option<PassengerSelection> {
        let candidates: Vec<&ManifestEntry> = self
            .flight_entries(flight_number, date)
            .into_iter()
            .filter(|e| e.age_group != excluded_age_group)
            .collect();
        let segment = candidates.first()?.segment.clone();

        let cabins: HashSet<&str> = candidates.iter().map(|e| e.cabin_class.as_str()).collect();
        let cabin = policy.select(&segment, |c| cabins.contains(c))?;

        let passengers: Vec<&ManifestEntry> = candidates.into_iter().filter(|e| e.cabin_class == cabin).collect();
        if passengers.is_empty() {
            debug!(flight_number, %date, cabin, "No passengers in selected cabin");
            return None;
        }

        let destination_airport = segment_destination(&segment).to_string();
        let destination_region = airport_regions
            .get(&destination_airport)
            .cloned()
            .unwrap_or_else(|| destination_airport.clone());

        let identities: HashSet<(String, &str)> = passengers
            .iter()
            .map(|e| (e.passenger_identity(), e.nationality_code.as_str()))
            .collect();
        let unique_passengers = identities.iter().map(|(id, _)| id).collect::<HashSet<_>>().len();
        let mut nationality_counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, code) in identities.iter().filter(|(_, code)| !code.is_empty()) {
            *nationality_counts.entry(code.to_string()).or_insert(0) += 1;
        }
        let records = passengers.iter().map(|e| e.to_record(&destination_region)).collect();

        Some(PassengerSelection {
            flight_number: flight_number.trim().to_string(),
            date,
            day_of_week: DayOfWeek(date.weekday()),
            segment,
            cabin_class: cabin,
            destination_airport,
            destination_region,
            records,
            unique_passengers,
            nationality_counts,
        })
    }

    /// Headcounts for one flight and date, across all cabins and ages.
    pub fn customer_summary(&self, flight_number: &str, date: NaiveDate, policy: &CabinPolicy) -> Option<CustomerSummary> {
        let rows = self.flight_entries(flight_number, date);
        if rows.is_empty() {
            return None;
        }

        let mut seen = HashSet::new();
        let unique: Vec<&ManifestEntry> = rows
            .iter()
            .copied()
            .filter(|e| seen.insert(e.passenger_identity()))
            .collect();

        let mut cabin_distribution = BTreeMap::new();
        for e in &unique {
            *cabin_distribution.entry(e.cabin_class.clone()).or_insert(0) += 1;
        }

        let destination_airport = unique
            .iter()
            .map(|e| e.arrival_airport.as_str())
            .find(|a| !a.is_empty())
            .or_else(|| unique.first().map(|e| segment_destination(&e.segment)))
            .unwrap_or("Unknown")
            .to_string();

        let meal_times: BTreeSet<String> = rows
            .iter()
            .filter(|e| !e.meal_time.is_empty())
            .map(|e| e.meal_time.clone())
            .collect();

        let analysis_cabin = policy
            .preference()
            .into_iter()
            .find(|c| cabin_distribution.contains_key(*c))
            .map(str::to_string);

        let mut nationality_breakdown = BTreeMap::new();
        let mut age_breakdown = BTreeMap::new();
        if let Some(cabin) = &analysis_cabin {
            for e in unique.iter().filter(|e| &e.cabin_class == cabin) {
                *nationality_breakdown.entry(e.nationality_code.clone()).or_insert(0) += 1;
                *age_breakdown.entry(e.age_group.clone()).or_insert(0) += 1;
            }
        }

        Some(CustomerSummary {
            flight_number: flight_number.trim().to_string(),
            flight_date: date,
            day_of_week: DayOfWeek(date.weekday()),
            total_customers: unique.len(),
            cabin_distribution,
            destination_airport,
            meal_times: meal_times.into_iter().collect(),
            analysis_cabin,
            nationality_breakdown,
            age_breakdown,
        })
    }

    /// Every flight in the manifest with the dates it operates on.
    pub fn flights(&self) -> FlightListing {
        let mut grouped: BTreeMap<&str, (&ManifestEntry, BTreeSet<NaiveDate>)> = BTreeMap::new();
        for e in self.entries.iter().filter(|e| !e.flight_number.is_empty()) {
            let slot = grouped.entry(e.flight_number.as_str()).or_insert_with(|| (e, BTreeSet::new()));
            if let Some(date) = e.date() {
                slot.1.insert(date);
            }
        }

        let flights = grouped
            .into_iter()
            .map(|(number, (first, dates))| FlightInfo {
                flight_number: number.to_string(),
                origin: first.departure_airport.clone(),
                destination: first.arrival_airport.clone(),
                route: format!("{}-{}", first.departure_airport, first.arrival_airport),
                category: if first.destination_region.is_empty() {
                    "Unknown".to_string()
                } else {
                    first.destination_region.clone()
                },
                available_dates: dates.into_iter().collect(),
            })
            .collect();

        let categories: BTreeSet<String> = self
            .entries
            .iter()
            .filter(|e| !e.destination_region.is_empty())
            .map(|e| e.destination_region.clone())
            .collect();

        FlightListing { flights, categories: categories.into_iter().collect() }
    }
}
