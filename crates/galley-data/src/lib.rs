//! Loaders for the prediction inputs: the four probability tables, the
//! passenger manifest, the meal catalog and historical reference counts.
//!
//! All sources are CSV files in one data directory (see
//! [`galley_common::config::DataConfig`]). [`DataStore::load`] reads them
//! once; requests only ever read from the loaded snapshot.

pub mod cabin;
pub mod catalog;
pub mod dates;
pub mod error;
pub mod flight;
pub mod manifest;
pub mod reference;
pub mod store;
pub mod tables;

pub use cabin::CabinPolicy;
pub use catalog::{meal_lines, MealCatalog, MealEntry, MealLine};
pub use error::{DataError, Result};
pub use flight::{FlightLabel, Route};
pub use manifest::{CustomerSummary, FlightInfo, FlightListing, Manifest, ManifestEntry, PassengerSelection};
pub use reference::ReferenceTable;
pub use store::{DataStore, FlightContext};
pub use tables::{read_table, LoadedTable};
