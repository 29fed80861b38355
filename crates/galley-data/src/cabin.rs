//! Which cabin's passengers and meals a flight prediction uses.

use std::collections::BTreeMap;

use galley_common::{CabinConfig, CabinPolicyKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum CabinPolicy {
    /// Per-segment exceptions, `default` everywhere else. The chosen cabin
    /// is used even when nobody on the flight sits in it.
    RouteOverride { overrides: BTreeMap<String, String>, default: String },
    /// `primary` when anyone sits in it, else `fallback` when anyone does.
    PreferEconomy { primary: String, fallback: String },
}

impl Default for CabinPolicy {
    fn default() -> Self {
        Self::from_config(&CabinConfig::default())
    }
}

impl CabinPolicy {
    pub fn from_config(config: &CabinConfig) -> Self {
        match config.policy {
            CabinPolicyKind::RouteOverride => CabinPolicy::RouteOverride {
                overrides: config.route_overrides.clone(),
                default: config.primary.clone(),
            },
            CabinPolicyKind::PreferEconomy => CabinPolicy::PreferEconomy {
                primary: config.primary.clone(),
                fallback: config.fallback.clone(),
            },
        }
    }

    /// Cabins in order of preference, for views that are not tied to one
    /// segment. Route overrides rank after the default cabin.
    pub fn preference(&self) -> Vec<&str> {
        match self {
            CabinPolicy::RouteOverride { overrides, default } => {
                let mut out = vec![default.as_str()];
                for cabin in overrides.values() {
                    if !out.contains(&cabin.as_str()) {
                        out.push(cabin.as_str());
                    }
                }
                out
            }
            CabinPolicy::PreferEconomy { primary, fallback } => vec![primary.as_str(), fallback.as_str()],
        }
    }

    /// Pick the cabin for `segment`. `present` reports whether any passenger
    /// sits in a cabin.
    pub fn select(&self, segment: &str, present: impl Fn(&str) -> bool) -> Option<String> {
        match self {
            CabinPolicy::RouteOverride { overrides, default } => {
                Some(overrides.get(segment).unwrap_or(default).clone())
            }
            CabinPolicy::PreferEconomy { primary, fallback } => [primary, fallback]
                .into_iter()
                .find(|cabin| present(cabin.as_str()))
                .cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_override_ignores_presence() {
        let policy = CabinPolicy::default();
        assert_eq!(policy.select("SIN JFK", |_| false).as_deref(), Some("S"));
        assert_eq!(policy.select("SIN MAA", |c| c == "S").as_deref(), Some("Y"));
        assert_eq!(policy.preference(), vec!["Y", "S"]);
    }

    #[test]
    fn test_prefer_economy_falls_back() {
        let config = CabinConfig { policy: CabinPolicyKind::PreferEconomy, ..CabinConfig::default() };
        let policy = CabinPolicy::from_config(&config);
        assert_eq!(policy.select("SIN JFK", |c| c == "Y").as_deref(), Some("Y"));
        assert_eq!(policy.select("SIN JFK", |c| c == "S").as_deref(), Some("S"));
        assert_eq!(policy.select("SIN JFK", |_| false), None);
        assert_eq!(policy.preference(), vec!["Y", "S"]);
    }
}
