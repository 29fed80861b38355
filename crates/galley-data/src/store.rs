//! Everything read from the data directory, loaded once at startup and
//! shared read-only afterwards.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use galley_common::config::{CabinConfig, DataConfig};
use galley_engine::{AvailableProteins, Signal, SignalTables};
use tracing::{info, warn};

use crate::cabin::CabinPolicy;
use crate::catalog::{MealCatalog, MealEntry, CATALOG_FILE};
use crate::manifest::{CustomerSummary, FlightListing, Manifest, PassengerSelection, MANIFEST_FILE};
use crate::reference::{reference_file_name, ReferenceTable};
use crate::tables::{file_name, read_table};

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// A flight's passengers together with the meals loaded for them.
#[derive(Debug, Clone)]
pub struct FlightContext<'a> {
    pub selection: PassengerSelection,
    /// Proteins per meal time in the selected cabin
    pub availability: BTreeMap<String, AvailableProteins>,
    pub meals: BTreeMap<String, Vec<&'a MealEntry>>,
    pub reference: Option<&'a ReferenceTable>,
}

impl FlightContext<'_> {
    pub fn reference_counts(&self, meal_time: &str) -> Option<galley_engine::ProteinCounts> {
        self.reference?
            .counts_for(self.selection.date, &self.selection.cabin_class, meal_time)
    }
}

#[derive(Debug, Clone)]
pub struct DataStore {
    pub tables: SignalTables,
    /// Airport code → destination region, from the destination table
    pub airport_regions: BTreeMap<String, String>,
    pub manifest: Manifest,
    pub catalog: MealCatalog,
    /// Keyed by segment, e.g. `SIN JFK`
    pub references: BTreeMap<String, ReferenceTable>,
    pub cabin_policy: CabinPolicy,
    pub excluded_age_group: String,
}

impl DataStore {
    /// Read the four tables, the manifest and the catalog from `data.dir`.
    /// Reference files are optional.
    pub fn load(data: &DataConfig, cabin: &CabinConfig) -> Result<Self> {
        let cabin_policy = CabinPolicy::from_config(cabin);

        let mut tables = SignalTables::default();
        let mut airport_regions = BTreeMap::new();
        for signal in Signal::ALL {
            let path = data.dir.join(file_name(signal));
            let loaded = read_table(signal, open(&path)?)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            if signal == Signal::Destination {
                airport_regions = loaded.airport_regions;
            }
            *tables.table_mut(signal) = loaded.table;
        }

        let manifest_path = data.dir.join(MANIFEST_FILE);
        let manifest = Manifest::from_reader(open(&manifest_path)?)
            .with_context(|| format!("Failed to load {}", manifest_path.display()))?;

        let catalog_path = data.dir.join(CATALOG_FILE);
        let catalog = MealCatalog::from_reader(open(&catalog_path)?)
            .with_context(|| format!("Failed to load {}", catalog_path.display()))?;

        let references = load_references(&data.prediction_results_dir(), &manifest)?;

        let store = Self {
            tables,
            airport_regions,
            manifest,
            catalog,
            references,
            cabin_policy,
            excluded_age_group: data.excluded_age_group.clone(),
        };
        info!(
            dir = %data.dir.display(),
            manifest_rows = store.manifest.len(),
            meals = store.catalog.len(),
            references = store.references.len(),
            "Data store ready"
        );
        Ok(store)
    }

    /// Passengers, availability and reference counts for one flight.
    /// `None` when no passenger is left after filtering.
    pub fn flight_context(&self, flight_number: &str, date: NaiveDate) -> Option<FlightContext<'_>> {
        let selection = self.manifest.select(
            flight_number,
            date,
            &self.excluded_age_group,
            &self.cabin_policy,
            &self.airport_regions,
        )?;
        let availability = self.catalog.availability(&selection.segment, date, &selection.cabin_class);
        let meals = self.catalog.meals_for_cabin(&selection.segment, date, &selection.cabin_class);
        let reference = self.references.get(&selection.segment);
        Some(FlightContext { selection, availability, meals, reference })
    }

    pub fn customer_summary(&self, flight_number: &str, date: NaiveDate) -> Option<CustomerSummary> {
        self.manifest.customer_summary(flight_number, date, &self.cabin_policy)
    }

    pub fn flights(&self) -> FlightListing {
        self.manifest.flights()
    }

    /// Catalog meals for a segment, one cabin per meal time.
    pub fn meals_by_time(&self, segment: &str, date: NaiveDate) -> BTreeMap<String, Vec<&MealEntry>> {
        self.catalog.meals_by_time(segment, date, &self.cabin_policy.preference())
    }
}

/// One reference file per segment seen in the manifest, where present.
fn load_references(dir: &Path, manifest: &Manifest) -> Result<BTreeMap<String, ReferenceTable>> {
    let mut out = BTreeMap::new();
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "No reference directory, comparisons disabled");
        return Ok(out);
    }
    for entry in manifest.entries() {
        if entry.segment.is_empty() || out.contains_key(&entry.segment) {
            continue;
        }
        let name = reference_file_name(&entry.segment);
        let path = dir.join(&name);
        if !path.is_file() {
            continue;
        }
        let table = ReferenceTable::from_reader(&name, open(&path)?)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        out.insert(entry.segment.clone(), table);
    }
    Ok(out)
}
