use super::*;

#[test]
fn parses_area_payload() {
    let bytes = br#"{"device_id":"area-meter-1","timestamp":1700000000000,"total_electricity_usage_kwh":1234.5}"#;
    let reading = MeterReading::from_area_payload(bytes).unwrap();
    assert_eq!(reading.device_id, "area-meter-1");
    assert_eq!(reading.timestamp, 1_700_000_000_000);
    assert_eq!(reading.value, 1234.5);
}

#[test]
fn parses_household_payload() {
    let bytes =
        br#"{"device_id":"hh-7","timestamp":1700000000000,"electricity_usage_kwh":88.25}"#;
    let reading = MeterReading::from_household_payload(bytes).unwrap();
    assert_eq!(reading.device_id, "hh-7");
    assert_eq!(reading.value, 88.25);
}

#[test]
fn rejects_missing_usage_field() {
    let bytes = br#"{"device_id":"hh-7","timestamp":1700000000000}"#;
    let err = MeterReading::from_household_payload(bytes).unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
}

#[test]
fn rejects_non_numeric_usage() {
    let bytes =
        br#"{"device_id":"hh-7","timestamp":1700000000000,"electricity_usage_kwh":"lots"}"#;
    let err = MeterReading::from_household_payload(bytes).unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
}

#[test]
fn rejects_negative_value() {
    let bytes =
        br#"{"device_id":"hh-7","timestamp":1700000000000,"electricity_usage_kwh":-4.0}"#;
    let err = MeterReading::from_household_payload(bytes).unwrap_err();
    assert_eq!(err, ValidationError::NegativeValue(-4.0));
}

#[test]
fn rejects_empty_device_id() {
    let bytes = br#"{"device_id":"","timestamp":1700000000000,"electricity_usage_kwh":4.0}"#;
    let err = MeterReading::from_household_payload(bytes).unwrap_err();
    assert_eq!(err, ValidationError::MissingDeviceId);
}

#[test]
fn rejects_zero_timestamp() {
    let bytes = br#"{"device_id":"hh-7","timestamp":0,"electricity_usage_kwh":4.0}"#;
    let err = MeterReading::from_household_payload(bytes).unwrap_err();
    assert_eq!(err, ValidationError::InvalidTimestamp(0));
}

#[test]
fn rejects_garbage_bytes() {
    let err = MeterReading::from_area_payload(b"not json").unwrap_err();
    assert!(matches!(err, ValidationError::Malformed(_)));
}
