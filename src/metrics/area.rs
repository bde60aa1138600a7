use crate::reading::MeterReading;

/// A closed area window: the aggregate meter's consumption over one
/// tumbling interval. Ephemeral, consumed by the consistency check.
#[derive(Clone, Debug, PartialEq)]
pub struct AreaWindow {
    pub opened_at: i64,
    pub closed_at: i64,
    /// Consumption over the interval, kWh
    pub delta: f64,
}

/// Tracks one area's cumulative meter and closes tumbling windows over it.
///
/// The aggregator is a pure state machine; the owning worker drives
/// `close_window` on its timer cadence. Reset policy: a counter decrease
/// yields a zero delta for the interval; the lost consumption is not
/// reconstructed. This is deliberately different from the household-level
/// policy, which counts the post-reset value as fresh consumption.
pub struct AreaAggregator {
    buffer: Vec<MeterReading>,
    last_cumulative: Option<f64>,
    /// Closing cumulative value of the previous window
    reference: Option<f64>,
    /// First cumulative value seen in the current window, reference fallback
    /// before any window has closed
    first_in_window: Option<f64>,
    seen_in_window: bool,
    window_opened_at: i64,
}

impl AreaAggregator {
    pub fn new(now_ms: i64) -> Self {
        Self {
            buffer: Vec::new(),
            last_cumulative: None,
            reference: None,
            first_in_window: None,
            seen_in_window: false,
            window_opened_at: now_ms,
        }
    }

    /// Record a reading and prune buffered entries older than one window.
    pub fn add_reading(&mut self, reading: MeterReading, window_ms: u64, now_ms: i64) {
        if !self.seen_in_window {
            self.first_in_window = Some(reading.value);
            self.seen_in_window = true;
        }
        self.last_cumulative = Some(reading.value);
        self.buffer.push(reading);

        let cutoff = now_ms - window_ms as i64;
        self.buffer.retain(|r| r.timestamp >= cutoff);
    }

    /// Close the current window.
    ///
    /// Returns `None` when no reading arrived in the elapsed interval (empty
    /// windows are skipped, not zero-reported). Otherwise the delta is
    /// `max(0, last − reference)`; the reference then advances to the last
    /// observed cumulative value.
    pub fn close_window(&mut self, now_ms: i64) -> Option<AreaWindow> {
        let opened_at = self.window_opened_at;
        self.window_opened_at = now_ms;

        if !self.seen_in_window {
            return None;
        }

        let last = self.last_cumulative?;
        let reference = self.reference.or(self.first_in_window).unwrap_or(last);
        let delta = (last - reference).max(0.0);

        self.reference = Some(last);
        self.first_in_window = None;
        self.seen_in_window = false;

        Some(AreaWindow {
            opened_at,
            closed_at: now_ms,
            delta,
        })
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 5000;

    fn reading(timestamp: i64, value: f64) -> MeterReading {
        MeterReading {
            device_id: "area-meter".to_string(),
            timestamp,
            value,
        }
    }

    #[test]
    fn first_window_delta_is_last_minus_first() {
        let mut agg = AreaAggregator::new(0);
        agg.add_reading(reading(1000, 100.0), WINDOW, 1000);
        agg.add_reading(reading(2000, 120.0), WINDOW, 2000);
        agg.add_reading(reading(4000, 140.0), WINDOW, 4000);

        let window = agg.close_window(5000).unwrap();
        assert_eq!(window.delta, 40.0);
        assert_eq!(window.opened_at, 0);
        assert_eq!(window.closed_at, 5000);
    }

    #[test]
    fn empty_window_emits_nothing() {
        let mut agg = AreaAggregator::new(0);
        assert!(agg.close_window(5000).is_none());

        // and again after a populated window
        agg.add_reading(reading(6000, 100.0), WINDOW, 6000);
        assert!(agg.close_window(10000).is_some());
        assert!(agg.close_window(15000).is_none());
    }

    #[test]
    fn reference_carries_across_windows() {
        let mut agg = AreaAggregator::new(0);
        agg.add_reading(reading(1000, 100.0), WINDOW, 1000);
        agg.add_reading(reading(4000, 140.0), WINDOW, 4000);
        assert_eq!(agg.close_window(5000).unwrap().delta, 40.0);

        // next window measures against the previous close, not its own first
        agg.add_reading(reading(6000, 150.0), WINDOW, 6000);
        assert_eq!(agg.close_window(10000).unwrap().delta, 10.0);
    }

    #[test]
    fn counter_decrease_clamps_delta_to_zero() {
        let mut agg = AreaAggregator::new(0);
        agg.add_reading(reading(1000, 140.0), WINDOW, 1000);
        agg.close_window(5000);

        // meter reset: 140 -> 20
        agg.add_reading(reading(6000, 20.0), WINDOW, 6000);
        let window = agg.close_window(10000).unwrap();
        assert_eq!(window.delta, 0.0);

        // following window resumes from the post-reset counter
        agg.add_reading(reading(11000, 35.0), WINDOW, 11000);
        assert_eq!(agg.close_window(15000).unwrap().delta, 15.0);
    }

    #[test]
    fn single_reading_window_has_zero_delta() {
        let mut agg = AreaAggregator::new(0);
        agg.add_reading(reading(1000, 100.0), WINDOW, 1000);
        let window = agg.close_window(5000).unwrap();
        assert_eq!(window.delta, 0.0);
    }

    #[test]
    fn buffer_prunes_entries_older_than_window() {
        let mut agg = AreaAggregator::new(0);
        agg.add_reading(reading(1000, 100.0), WINDOW, 1000);
        agg.add_reading(reading(2000, 110.0), WINDOW, 2000);
        assert_eq!(agg.buffered(), 2);

        // reading at t=8000 prunes everything before t=3000
        agg.add_reading(reading(8000, 130.0), WINDOW, 8000);
        assert_eq!(agg.buffered(), 1);
    }
}
