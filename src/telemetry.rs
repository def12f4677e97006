//! Telemetry input: the fixed-core-schema energy sample fed to the engine.
//!
//! `TelemetryInput` is a timestamped snapshot of site measurements with a
//! fixed core schema plus a closed-enum, string-keyed extension map
//! (`ExtensionValue`) for forward compatibility (spec.md §9 design note).
//! It is immutable once received. `feature_value` is the feature-by-name
//! lookup the inference engine uses to build model input vectors.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A primitive value carried in the forward-compatible extension map.
///
/// Closed enum of primitives so the schema stays type-safe while still
/// accepting fields not in the fixed core schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

/// A timestamped snapshot of device/site energy measurements used as
/// inference input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryInput {
    pub timestamp: DateTime<Utc>,
    pub site_id: String,
    pub power_consumption: f64,
    pub solar_production: Option<f64>,
    pub battery_soc: Option<f64>,
    pub grid_power: Option<f64>,
    pub temperature: Option<f64>,
    #[serde(default)]
    pub extensions: HashMap<String, ExtensionValue>,
}

impl TelemetryInput {
    /// Look up a feature by name to assemble the model input vector.
    ///
    /// Core fields resolve directly; optional fields that are absent and
    /// unknown names resolve to `0.0`. Extension lookups coerce numeric and
    /// flag primitives; text has no numeric value and resolves to `0.0`.
    pub fn feature_value(&self, name: &str) -> f64 {
        match name {
            "power_consumption" => self.power_consumption,
            "solar_production" => self.solar_production.unwrap_or(0.0),
            "battery_soc" => self.battery_soc.unwrap_or(0.0),
            "grid_power" => self.grid_power.unwrap_or(0.0),
            "temperature" => self.temperature.unwrap_or(0.0),
            other => match self.extensions.get(other) {
                Some(ExtensionValue::Number(n)) => *n,
                Some(ExtensionValue::Flag(b)) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                _ => 0.0,
            },
        }
    }
}
