use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

mod store;

pub use store::SettingsStore;

/// Live anomaly-detection settings. Loaded once from the KV store at startup
/// and swapped at runtime via PUT /api/settings/update; every aggregator
/// reads the current value on each evaluation, so changes take effect
/// without restart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalySettings {
    /// Tumbling window length in milliseconds
    #[serde(default = "default_window_time")]
    pub window_time: u64,
    /// Per-device deviation threshold, percent
    #[serde(default = "default_device_threshold")]
    pub device_threshold: f64,
    /// Area-vs-household deviation threshold, percent
    #[serde(default = "default_area_threshold")]
    pub area_threshold: f64,
    /// Absolute-magnitude guard for device anomalies, kWh
    #[serde(default = "default_min_delta_consumption")]
    pub min_delta_consumption: f64,
}

fn default_window_time() -> u64 {
    300_000
}

fn default_device_threshold() -> f64 {
    50.0
}

fn default_area_threshold() -> f64 {
    5.0
}

fn default_min_delta_consumption() -> f64 {
    100.0
}

impl Default for AnomalySettings {
    fn default() -> Self {
        Self {
            window_time: default_window_time(),
            device_threshold: default_device_threshold(),
            area_threshold: default_area_threshold(),
            min_delta_consumption: default_min_delta_consumption(),
        }
    }
}

/// Shared settings cell. Writers replace the whole value under the lock, so
/// readers always observe a fully-written configuration.
pub type SharedSettings = Arc<RwLock<AnomalySettings>>;

pub fn new_shared_settings(settings: AnomalySettings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

/// Read the current settings out of the cell.
///
/// A poisoned lock only occurs if a writer panicked mid-swap; the value is a
/// plain Copy struct, so the last written state is still usable.
pub fn current(cell: &SharedSettings) -> AnomalySettings {
    match cell.read() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn replace(cell: &SharedSettings, settings: AnomalySettings) {
    match cell.write() {
        Ok(mut guard) => *guard = settings,
        Err(poisoned) => *poisoned.into_inner() = settings,
    }
}

/// Partial settings update, merged into the stored blob after validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub window_time: Option<u64>,
    pub device_threshold: Option<f64>,
    pub area_threshold: Option<f64>,
    pub min_delta_consumption: Option<f64>,
}

/// Settings validation error: one message per rejected field.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsValidationError {
    pub errors: Vec<String>,
}

impl fmt::Display for SettingsValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join(", "))
    }
}

impl std::error::Error for SettingsValidationError {}

impl SettingsUpdate {
    /// Validate the partial update and merge it over `base`.
    ///
    /// window_time and device_threshold must be positive, area_threshold
    /// and min_delta_consumption must be non-negative. All violations are
    /// reported together.
    pub fn apply(&self, base: AnomalySettings) -> Result<AnomalySettings, SettingsValidationError> {
        let mut errors = Vec::new();
        let mut merged = base;

        if let Some(window_time) = self.window_time {
            if window_time == 0 {
                errors.push("window_time must be a positive number".to_string());
            } else {
                merged.window_time = window_time;
            }
        }
        if let Some(device_threshold) = self.device_threshold {
            if !device_threshold.is_finite() || device_threshold <= 0.0 {
                errors.push("device_threshold must be a positive number".to_string());
            } else {
                merged.device_threshold = device_threshold;
            }
        }
        if let Some(area_threshold) = self.area_threshold {
            if !area_threshold.is_finite() || area_threshold < 0.0 {
                errors.push("area_threshold must be a non-negative number".to_string());
            } else {
                merged.area_threshold = area_threshold;
            }
        }
        if let Some(min_delta) = self.min_delta_consumption {
            if !min_delta.is_finite() || min_delta < 0.0 {
                errors.push("min_delta_consumption must be a non-negative number".to_string());
            } else {
                merged.min_delta_consumption = min_delta;
            }
        }

        if errors.is_empty() {
            Ok(merged)
        } else {
            Err(SettingsValidationError { errors })
        }
    }
}
