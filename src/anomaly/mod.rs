use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// Fixed severity cut-point in percent, independent of the configurable
/// detection thresholds.
const HIGH_SEVERITY_PCT: f64 = 5.0;

/// Anomaly class: area aggregate vs. household sum, or a single device
/// deviating from its own rolling baseline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyKind {
    Area,
    Device,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Medium,
}

impl Severity {
    /// HIGH above the fixed 5% cut-point, MEDIUM otherwise.
    pub fn from_deviation(percentage_deviation: f64) -> Self {
        if percentage_deviation > HIGH_SEVERITY_PCT {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

/// An emitted anomaly. Immutable once constructed; the alert and persistence
/// sinks each serialize their own copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "typeof")]
    pub kind: AnomalyKind,
    #[serde(rename = "areaId")]
    pub area_id: String,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    /// Area window delta (AREA) or the device's interval delta (DEVICE), kWh
    #[serde(rename = "observedValue")]
    pub observed: f64,
    /// Household window sum (AREA) or the device's rolling baseline (DEVICE)
    #[serde(rename = "comparisonValue")]
    pub comparison: f64,
    #[serde(rename = "absoluteDifference")]
    pub absolute_difference: f64,
    #[serde(rename = "percentageDeviation")]
    pub percentage_deviation: f64,
    #[serde(rename = "windowSizeMs")]
    pub window_size_ms: u64,
    pub severity: Severity,
}

impl AnomalyRecord {
    /// Area-level record: the window's aggregate delta disagrees with the
    /// summed household consumption.
    pub fn area(
        area_id: impl Into<String>,
        area_delta: f64,
        household_sum: f64,
        percentage_deviation: f64,
        window_size_ms: u64,
    ) -> Self {
        Self {
            kind: AnomalyKind::Area,
            area_id: area_id.into(),
            device_id: None,
            timestamp: Utc::now().timestamp_millis(),
            observed: area_delta,
            comparison: household_sum,
            absolute_difference: (area_delta - household_sum).abs(),
            percentage_deviation,
            window_size_ms,
            severity: Severity::from_deviation(percentage_deviation),
        }
    }

    /// Device-level record: one device's delta deviates from its rolling
    /// baseline.
    pub fn device(
        area_id: impl Into<String>,
        device_id: impl Into<String>,
        delta: f64,
        baseline: f64,
        percentage_deviation: f64,
        window_size_ms: u64,
    ) -> Self {
        Self {
            kind: AnomalyKind::Device,
            area_id: area_id.into(),
            device_id: Some(device_id.into()),
            timestamp: Utc::now().timestamp_millis(),
            observed: delta,
            comparison: baseline,
            absolute_difference: (delta - baseline).abs(),
            percentage_deviation,
            window_size_ms,
            severity: Severity::from_deviation(percentage_deviation),
        }
    }

    /// Human-readable message carried by the alert sink.
    pub fn alert_message(&self) -> String {
        format!(
            "Anomaly detected in area {}: {:.2}% difference",
            self.area_id, self.percentage_deviation
        )
    }

    /// Message stored alongside the persisted record.
    pub fn stored_message(&self) -> String {
        match self.kind {
            AnomalyKind::Area => format!(
                "[DISTRICT][WARNING] - {}: {:.2}% difference",
                self.area_id, self.percentage_deviation
            ),
            AnomalyKind::Device => format!(
                "[DEVICE][WARNING] - {}: {:.2}% difference",
                self.device_id.as_deref().unwrap_or("unknown"),
                self.percentage_deviation
            ),
        }
    }

    /// Object-store key for the persisted record.
    ///
    /// AREA:   anomalies/{areaId}/district-level/{date}/anomaly_{ts}.json
    /// DEVICE: anomalies/{areaId}/{deviceId}/{date}/anomaly_{ts}.json
    pub fn object_key(&self) -> String {
        let date = DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d");
        match self.kind {
            AnomalyKind::Area => format!(
                "anomalies/{}/district-level/{}/anomaly_{}.json",
                self.area_id, date, self.timestamp
            ),
            AnomalyKind::Device => format!(
                "anomalies/{}/{}/{}/anomaly_{}.json",
                self.area_id,
                self.device_id.as_deref().unwrap_or("unknown"),
                date,
                self.timestamp
            ),
        }
    }
}
