use crate::reading::MeterReading;
use crate::settings::AnomalySettings;
use std::collections::{HashMap, VecDeque};

/// Bounded per-device delta history used for the rolling baseline.
const HISTORY_CAPACITY: usize = 100;

/// A device delta that deviated sharply from the device's rolling baseline.
/// The worker wraps it into an [`crate::anomaly::AnomalyRecord`].
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceAnomaly {
    pub device_id: String,
    pub delta: f64,
    pub baseline: f64,
    pub percentage_deviation: f64,
}

/// Per-device tracking state. Created on the first reading from an unseen
/// device and kept for the aggregator's lifetime.
struct DeviceState {
    last_cumulative: f64,
    /// Recent interval deltas, oldest evicted at capacity
    history: VecDeque<f64>,
    /// First and last cumulative values observed in the current window
    first_in_window: Option<f64>,
    last_in_window: Option<f64>,
    /// Last cumulative value known at the close of the previous window
    prev_window_last: Option<f64>,
}

impl DeviceState {
    fn new(value: f64) -> Self {
        Self {
            last_cumulative: value,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            first_in_window: Some(value),
            last_in_window: Some(value),
            prev_window_last: None,
        }
    }

    fn push_delta(&mut self, delta: f64) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(delta);
    }

    /// Rolling baseline: arithmetic mean of past deltas, excluding the one
    /// currently being evaluated.
    fn baseline(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        self.history.iter().sum::<f64>() / self.history.len() as f64
    }
}

/// Tracks every sub-meter in one area: per-device cumulative counters, delta
/// histories and the immediate per-reading anomaly check, plus the tumbling
/// household window sum.
///
/// Reset policy: a counter decrease treats the new cumulative value as
/// freshly accumulated consumption (`delta = current`), unlike the area
/// aggregator which clamps the interval to zero.
pub struct HouseholdAggregator {
    devices: HashMap<String, DeviceState>,
    /// Most recently completed window sum, 0.0 before the first completion
    last_sum: f64,
}

impl HouseholdAggregator {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            last_sum: 0.0,
        }
    }

    /// Record a device reading and run the immediate anomaly check.
    ///
    /// The first reading from a device only establishes its counter; no
    /// delta is derivable. The check itself requires at least two past
    /// deltas, so a device's first two deltas can never trigger. Fires only
    /// when the percentage deviation exceeds the device threshold AND the
    /// delta clears the absolute-magnitude guard.
    pub fn add_reading(
        &mut self,
        reading: MeterReading,
        settings: &AnomalySettings,
    ) -> Option<DeviceAnomaly> {
        let state = match self.devices.get_mut(&reading.device_id) {
            Some(state) => state,
            None => {
                self.devices
                    .insert(reading.device_id.clone(), DeviceState::new(reading.value));
                return None;
            }
        };

        let prev = state.last_cumulative;
        let delta = if reading.value >= prev {
            reading.value - prev
        } else {
            // reset: the new counter value is fresh consumption
            reading.value
        };

        state.last_cumulative = reading.value;
        if state.first_in_window.is_none() {
            state.first_in_window = Some(reading.value);
        }
        state.last_in_window = Some(reading.value);

        let anomaly = if state.history.len() >= 2 {
            let baseline = state.baseline();
            let percentage_deviation = if baseline == 0.0 {
                0.0
            } else {
                (delta - baseline).abs() / baseline * 100.0
            };
            if percentage_deviation > settings.device_threshold
                && delta > settings.min_delta_consumption
            {
                Some(DeviceAnomaly {
                    device_id: reading.device_id.clone(),
                    delta,
                    baseline,
                    percentage_deviation,
                })
            } else {
                None
            }
        } else {
            None
        };

        state.push_delta(delta);
        anomaly
    }

    /// Close the current household window.
    ///
    /// Sums, over every device with in-window readings, the device's last
    /// in-window cumulative minus its last-known value from the previous
    /// window (or its first in-window value when none is recorded).
    /// Negative per-device results are excluded from the sum entirely.
    /// Returns `None` when no device had readings in the interval; the
    /// previous sum then stays current.
    pub fn close_window(&mut self) -> Option<f64> {
        let mut sum = 0.0;
        let mut any = false;

        for state in self.devices.values_mut() {
            let last = match state.last_in_window.take() {
                Some(last) => last,
                None => continue,
            };
            any = true;

            let base = state
                .prev_window_last
                .or(state.first_in_window)
                .unwrap_or(last);
            let delta = last - base;
            if delta >= 0.0 {
                sum += delta;
            }

            state.prev_window_last = Some(last);
            state.first_in_window = None;
        }

        if !any {
            return None;
        }

        self.last_sum = sum;
        Some(sum)
    }

    /// Most recently completed window sum (0 before the first completion).
    pub fn sum_window(&self) -> f64 {
        self.last_sum
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl Default for HouseholdAggregator {
    fn default() -> Self {
        Self::new()
    }
}
