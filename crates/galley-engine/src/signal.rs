//! The four preference signals and their lookup keys.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the four independent probability sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Nationality,
    Age,
    Destination,
    MealTime,
}

impl Signal {
    pub const ALL: [Signal; 4] = [Signal::Nationality, Signal::Age, Signal::Destination, Signal::MealTime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Nationality => "nationality",
            Signal::Age => "age",
            Signal::Destination => "destination",
            Signal::MealTime => "meal_time",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DayOfWeek ─────────────────────────────────────────────────────────────────

/// Weekday with a fixed English day-name rendering ("Monday" … "Sunday"),
/// ordered Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DayOfWeek(pub Weekday);

impl DayOfWeek {
    /// Weekday of a local departure timestamp.
    pub fn of(departure: &NaiveDateTime) -> Self {
        Self(departure.weekday())
    }

    pub fn name(&self) -> &'static str {
        match self.0 {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }
}

impl PartialOrd for DayOfWeek {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DayOfWeek {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.num_days_from_monday().cmp(&other.0.num_days_from_monday())
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = chrono::ParseWeekdayError;

    /// Accepts full English names and chrono's short forms, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<Weekday>().map(DayOfWeek)
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for DayOfWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|_| serde::de::Error::custom(format!("invalid weekday: {raw}")))
    }
}

// ── SignalKey ─────────────────────────────────────────────────────────────────

/// Identifies one probability row for one signal.
///
/// The optional `meal_time` is a refinement: a qualified key is tried first,
/// then its [`SignalKey::base`] form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum SignalKey {
    Nationality {
        nationality_code: String,
        day_of_week: DayOfWeek,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meal_time: Option<String>,
    },
    Age {
        age_group: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meal_time: Option<String>,
    },
    Destination {
        destination_region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meal_time: Option<String>,
    },
    MealTime {
        meal_time: String,
    },
}

impl SignalKey {
    pub fn nationality(code: impl Into<String>, day: DayOfWeek) -> Self {
        SignalKey::Nationality { nationality_code: code.into(), day_of_week: day, meal_time: None }
    }

    pub fn age(group: impl Into<String>) -> Self {
        SignalKey::Age { age_group: group.into(), meal_time: None }
    }

    pub fn destination(region: impl Into<String>) -> Self {
        SignalKey::Destination { destination_region: region.into(), meal_time: None }
    }

    pub fn meal_time(meal_time: impl Into<String>) -> Self {
        SignalKey::MealTime { meal_time: meal_time.into() }
    }

    pub fn signal(&self) -> Signal {
        match self {
            SignalKey::Nationality { .. } => Signal::Nationality,
            SignalKey::Age { .. } => Signal::Age,
            SignalKey::Destination { .. } => Signal::Destination,
            SignalKey::MealTime { .. } => Signal::MealTime,
        }
    }

    /// The meal-time qualifier, if any. A `MealTime` key is its own category.
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            SignalKey::Nationality { meal_time, .. }
            | SignalKey::Age { meal_time, .. }
            | SignalKey::Destination { meal_time, .. } => meal_time.as_deref(),
            SignalKey::MealTime { .. } => None,
        }
    }

    /// Same key refined by `meal_time`. `MealTime` keys are returned unchanged.
    pub fn qualified(&self, meal_time: &str) -> Self {
        let mut key = self.clone();
        match &mut key {
            SignalKey::Nationality { meal_time: mt, .. }
            | SignalKey::Age { meal_time: mt, .. }
            | SignalKey::Destination { meal_time: mt, .. } => *mt = Some(meal_time.to_string()),
            SignalKey::MealTime { .. } => {}
        }
        key
    }

    /// Same key without the meal-time qualifier.
    pub fn base(&self) -> Self {
        let mut key = self.clone();
        match &mut key {
            SignalKey::Nationality { meal_time, .. }
            | SignalKey::Age { meal_time, .. }
            | SignalKey::Destination { meal_time, .. } => *meal_time = None,
            SignalKey::MealTime { .. } => {}
        }
        key
    }
}

impl fmt::Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKey::Nationality { nationality_code, day_of_week, .. } => {
                write!(f, "nationality {nationality_code}/{day_of_week}")?
            }
            SignalKey::Age { age_group, .. } => write!(f, "age {age_group}")?,
            SignalKey::Destination { destination_region, .. } => write!(f, "destination {destination_region}")?,
            SignalKey::MealTime { meal_time } => return write!(f, "meal_time {meal_time}"),
        }
        match self.qualifier() {
            Some(mt) => write!(f, " @{mt}"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_day_name_is_english() {
        let departure = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap().and_hms_opt(23, 55, 0).unwrap();
        assert_eq!(DayOfWeek::of(&departure).name(), "Saturday");
        assert_eq!("monday".parse::<DayOfWeek>().unwrap(), DayOfWeek(Weekday::Mon));
    }

    #[test]
    fn test_qualified_and_base_round_trip() {
        let key = SignalKey::age("19-30");
        let q = key.qualified("Lunch");
        assert_eq!(q.qualifier(), Some("Lunch"));
        assert_ne!(q, key);
        assert_eq!(q.base(), key);

        let meal = SignalKey::meal_time("Dinner");
        assert_eq!(meal.qualified("Lunch"), meal);
    }

    #[test]
    fn test_keys_of_different_signals_never_collide() {
        // Same label in two signals must stay distinct keys.
        let a = SignalKey::age("Asia");
        let b = SignalKey::destination("Asia");
        assert_ne!(a, b);
    }

    #[test]
    fn test_json_shape() {
        let key = SignalKey::nationality("IN", DayOfWeek(Weekday::Sat)).qualified("Lunch");
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["signal"], "nationality");
        assert_eq!(json["day_of_week"], "Saturday");
        assert_eq!(json["meal_time"], "Lunch");
        let back: SignalKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }
}
