use crate::anomaly::AnomalyRecord;
use crate::metrics::{check_consistency, AreaAggregator, HouseholdAggregator};
use crate::reading::MeterReading;
use crate::settings::{self, SharedSettings};
use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval};
use tracing::{debug, info, warn};

/// A routed reading: which logical source channel it arrived on.
#[derive(Clone, Debug)]
pub enum MeterMessage {
    Area(MeterReading),
    Household(MeterReading),
}

/// One area's processing flow: owns the area and household aggregators and
/// interleaves reading ingestion with the two window timers on a single
/// task, so no two operations against the area's state ever race. Areas
/// share nothing but the settings cell.
pub struct AreaWorker {
    area_id: String,
    settings: SharedSettings,
    anomaly_tx: mpsc::Sender<AnomalyRecord>,
}

/// A tumbling-window timer that rebuilds itself when the live window length
/// changes; the new cadence takes effect at the next close.
struct WindowTimer {
    interval: Interval,
    window_ms: u64,
}

impl WindowTimer {
    fn new(window_ms: u64) -> Self {
        Self {
            interval: Self::make_interval(window_ms),
            window_ms,
        }
    }

    fn make_interval(window_ms: u64) -> Interval {
        let period = Duration::from_millis(window_ms.max(1));
        // interval_at so the first tick fires a full period after activation
        interval_at(Instant::now() + period, period)
    }

    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    fn resync(&mut self, window_ms: u64) {
        if window_ms != self.window_ms {
            self.interval = Self::make_interval(window_ms);
            self.window_ms = window_ms;
        }
    }
}

impl AreaWorker {
    pub fn new(
        area_id: impl Into<String>,
        settings: SharedSettings,
        anomaly_tx: mpsc::Sender<AnomalyRecord>,
    ) -> Self {
        Self {
            area_id: area_id.into(),
            settings,
            anomaly_tx,
        }
    }

    /// Run until the readings channel closes. Window timers are anchored to
    /// this activation, independently per aggregator; stopping the worker
    /// discards any partially accumulated window.
    pub async fn run(self, mut readings: mpsc::Receiver<MeterMessage>) {
        let window_ms = settings::current(&self.settings).window_time;
        let mut area = AreaAggregator::new(Utc::now().timestamp_millis());
        let mut household = HouseholdAggregator::new();
        let mut area_timer = WindowTimer::new(window_ms);
        let mut household_timer = WindowTimer::new(window_ms);

        info!(area_id = %self.area_id, window_ms, "Area worker started");

        loop {
            // biased: drain pending readings before a due tick, and close the
            // household window before the area window when both are due so
            // the consistency check sees the sum for the same boundary.
            tokio::select! {
                biased;

                msg = readings.recv() => {
                    match msg {
                        Some(MeterMessage::Area(reading)) => {
                            let window_ms = settings::current(&self.settings).window_time;
                            area.add_reading(reading, window_ms, Utc::now().timestamp_millis());
                        }
                        Some(MeterMessage::Household(reading)) => {
                            self.handle_household_reading(&mut household, reading);
                        }
                        None => break,
                    }
                }

                _ = household_timer.tick() => {
                    if let Some(sum) = household.close_window() {
                        debug!(area_id = %self.area_id, sum, "Household window closed");
                    }
                    household_timer.resync(settings::current(&self.settings).window_time);
                }

                _ = area_timer.tick() => {
                    self.close_area_window(&mut area, &household);
                    area_timer.resync(settings::current(&self.settings).window_time);
                }
            }
        }

        info!(area_id = %self.area_id, "Area worker stopped, partial window discarded");
    }

    /// Immediate per-reading device check, not gated on window boundaries.
    fn handle_household_reading(&self, household: &mut HouseholdAggregator, reading: MeterReading) {
        let current = settings::current(&self.settings);
        if let Some(anomaly) = household.add_reading(reading, &current) {
            info!(
                area_id = %self.area_id,
                device_id = %anomaly.device_id,
                delta = anomaly.delta,
                baseline = anomaly.baseline,
                deviation_pct = anomaly.percentage_deviation,
                "Device anomaly detected"
            );
            self.emit(AnomalyRecord::device(
                &self.area_id,
                anomaly.device_id,
                anomaly.delta,
                anomaly.baseline,
                anomaly.percentage_deviation,
                current.window_time,
            ));
        }
    }

    /// Close the area window and compare it against the most recently
    /// completed household sum.
    fn close_area_window(&self, area: &mut AreaAggregator, household: &HouseholdAggregator) {
        let window = match area.close_window(Utc::now().timestamp_millis()) {
            Some(window) => window,
            // empty window: no close event at all
            None => return,
        };

        let current = settings::current(&self.settings);
        let household_sum = household.sum_window();

        debug!(
            area_id = %self.area_id,
            area_delta = window.delta,
            household_sum,
            "Area window closed"
        );

        if let Some(record) = check_consistency(&self.area_id, window.delta, household_sum, &current)
        {
            info!(
                area_id = %self.area_id,
                deviation_pct = record.percentage_deviation,
                severity = ?record.severity,
                "Area anomaly detected"
            );
            self.emit(record);
        }
    }

    /// Hand an anomaly to the dispatch queue without blocking ingestion.
    /// A full queue drops the record with a warning.
    fn emit(&self, record: AnomalyRecord) {
        if let Err(e) = self.anomaly_tx.try_send(record) {
            warn!(area_id = %self.area_id, error = %e, "Anomaly dropped, dispatch queue unavailable");
        }
    }
}
