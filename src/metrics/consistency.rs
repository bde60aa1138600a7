use crate::anomaly::AnomalyRecord;
use crate::settings::AnomalySettings;
use tracing::debug;

/// Compare a just-closed area window delta against the most recently
/// completed household window sum.
///
/// The two aggregators' windows are anchored independently, so the compared
/// values correspond approximately, not exactly. Skips when both sides are
/// zero; the deviation ratio is defined as 0 when the area delta (the
/// denominator) is zero, so a reset-clamped area window never flags.
pub fn check_consistency(
    area_id: &str,
    area_delta: f64,
    household_sum: f64,
    settings: &AnomalySettings,
) -> Option<AnomalyRecord> {
    if area_delta == 0.0 && household_sum == 0.0 {
        debug!(area_id, "Area and household consumption both zero, skipping comparison");
        return None;
    }

    let absolute_difference = (area_delta - household_sum).abs();
    let percentage_deviation = if area_delta != 0.0 {
        absolute_difference / area_delta.abs() * 100.0
    } else {
        0.0
    };

    debug!(
        area_id,
        area_delta,
        household_sum,
        percentage_deviation,
        "Window analysis"
    );

    if percentage_deviation > settings.area_threshold {
        Some(AnomalyRecord::area(
            area_id,
            area_delta,
            household_sum,
            percentage_deviation,
            settings.window_time,
        ))
    } else {
        None
    }
}
