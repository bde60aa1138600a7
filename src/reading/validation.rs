use super::MeterReading;
use std::fmt;

/// Validation errors for meter readings
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Malformed(String),
    MissingDeviceId,
    InvalidTimestamp(i64),
    NonFiniteValue,
    NegativeValue(f64),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Malformed(e) => write!(f, "malformed payload: {}", e),
            ValidationError::MissingDeviceId => write!(f, "device_id is required"),
            ValidationError::InvalidTimestamp(ts) => {
                write!(f, "timestamp must be positive, got {}", ts)
            }
            ValidationError::NonFiniteValue => write!(f, "usage value must be a finite number"),
            ValidationError::NegativeValue(v) => {
                write!(f, "cumulative usage must be non-negative, got {}", v)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates a normalized reading.
///
/// Rules:
/// - device_id must be non-empty
/// - timestamp must be positive (Unix epoch milliseconds)
/// - value must be finite and non-negative (cumulative counters never go
///   below zero, even across a reset)
pub fn validate(reading: &MeterReading) -> Result<(), ValidationError> {
    if reading.device_id.is_empty() {
        return Err(ValidationError::MissingDeviceId);
    }
    if reading.timestamp <= 0 {
        return Err(ValidationError::InvalidTimestamp(reading.timestamp));
    }
    if !reading.value.is_finite() {
        return Err(ValidationError::NonFiniteValue);
    }
    if reading.value < 0.0 {
        return Err(ValidationError::NegativeValue(reading.value));
    }
    Ok(())
}
