//! galley-engine: Weighted-probability meal allocation engine.
//!
//! Pipeline: passenger records → [`cohort`] → signal lookups against
//! [`table`] (optionally shadowed by an [`overlay`]) → [`blend`] →
//! [`allocate`] → [`aggregate`]. [`predict`] wires the stages together.

pub mod error;
pub mod protein;
pub mod signal;
pub mod normalise;
pub mod table;
pub mod cohort;
pub mod weights;
pub mod blend;
pub mod allocate;
pub mod aggregate;
pub mod overlay;
pub mod predict;

pub use error::{EngineError, Result};
pub use protein::{AvailableProteins, Protein, ProteinCounts, ProteinMap, ProteinVector};
pub use signal::{DayOfWeek, Signal, SignalKey};
pub use table::{LookupSource, ProbabilityProvider, ProbabilityRow, ProbabilityTable, SignalLookup, SignalTables};
pub use cohort::{Cohort, CohortBuilder, CohortKey, CohortSet, PassengerRecord};
pub use weights::WeightSet;
pub use blend::{blend, Blend, SignalVectors};
pub use allocate::allocate;
pub use aggregate::{aggregate, Aggregation, GroupCounts};
pub use overlay::{OverlayRow, OverlayView, SessionKey, SessionOverlay, SessionStore, MODIFIED_TOLERANCE};
pub use predict::{predict, CohortBreakdown, Diagnostics, Prediction, SignalDetail};
