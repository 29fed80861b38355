//! Flight labels as shown in the UI, e.g. `SQ 0024 (SIN → JFK)`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    /// Segment code as used in the manifest and catalog, e.g. `SIN JFK`.
    pub fn segment(&self) -> String {
        format!("{} {}", self.origin, self.destination)
    }
}

/// A flight number with an optional route. Plain flight numbers such as
/// `SQ 0024` parse too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightLabel {
    pub flight_number: String,
    pub route: Option<Route>,
}

impl FlightLabel {
    pub fn segment(&self) -> Option<String> {
        self.route.as_ref().map(Route::segment)
    }
}

impl FromStr for FlightLabel {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DataError::InvalidFlightLabel(s.to_string());
        let (number, rest) = match s.split_once('(') {
            Some((number, rest)) => (number.trim(), Some(rest)),
            None => (s.trim(), None),
        };
        if number.is_empty() {
            return Err(invalid());
        }

        let route = match rest {
            None => None,
            Some(rest) => {
                let inner = rest.trim_end().strip_suffix(')').ok_or_else(invalid)?;
                let (origin, destination) = inner
                    .split_once('→')
                    .or_else(|| inner.split_once("->"))
                    .ok_or_else(invalid)?;
                let (origin, destination) = (origin.trim(), destination.trim());
                if origin.is_empty() || destination.is_empty() {
                    return Err(invalid());
                }
                Some(Route { origin: origin.to_string(), destination: destination.to_string() })
            }
        };

        Ok(FlightLabel { flight_number: number.to_string(), route })
    }
}

impl fmt::Display for FlightLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.route {
            Some(r) => write!(f, "{} ({} → {})", self.flight_number, r.origin, r.destination),
            None => f.write_str(&self.flight_number),
        }
    }
}
