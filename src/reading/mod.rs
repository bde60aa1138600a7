use serde::Deserialize;

mod validation;
#[cfg(test)]
mod tests;

pub use validation::ValidationError;

/// A single cumulative meter reading, normalized from either wire payload.
///
/// `value` is the meter's lifetime counter in kWh, not an interval delta.
/// Physically it is non-decreasing except on a hardware reset; the
/// aggregators own the reset policies, so no monotonicity is enforced here.
#[derive(Clone, Debug, PartialEq)]
pub struct MeterReading {
    pub device_id: String,
    /// Unix epoch milliseconds (producer time)
    pub timestamp: i64,
    /// Cumulative consumption in kWh
    pub value: f64,
}

/// Wire payload on an area-level subject
#[derive(Debug, Deserialize)]
pub struct AreaPayload {
    pub device_id: String,
    pub timestamp: i64,
    pub total_electricity_usage_kwh: f64,
}

/// Wire payload on a household-level subject
#[derive(Debug, Deserialize)]
pub struct HouseholdPayload {
    pub device_id: String,
    pub timestamp: i64,
    pub electricity_usage_kwh: f64,
}

impl MeterReading {
    /// Parse and validate an area-level payload.
    pub fn from_area_payload(bytes: &[u8]) -> Result<Self, ValidationError> {
        let payload: AreaPayload =
            serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let reading = Self {
            device_id: payload.device_id,
            timestamp: payload.timestamp,
            value: payload.total_electricity_usage_kwh,
        };
        reading.validate()?;
        Ok(reading)
    }

    /// Parse and validate a household-level payload.
    pub fn from_household_payload(bytes: &[u8]) -> Result<Self, ValidationError> {
        let payload: HouseholdPayload =
            serde_json::from_slice(bytes).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        let reading = Self {
            device_id: payload.device_id,
            timestamp: payload.timestamp,
            value: payload.electricity_usage_kwh,
        };
        reading.validate()?;
        Ok(reading)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}
