// End-to-end tests for the per-area detection flow: readings in through the
// worker channel, anomalies out through the dispatch channel, window timers
// driven by the paused tokio clock.

use gridwatch::anomaly::{AnomalyKind, AnomalyRecord};
use gridwatch::detector::{AreaWorker, MeterMessage};
use gridwatch::reading::MeterReading;
use gridwatch::settings::{new_shared_settings, AnomalySettings, SharedSettings};
use std::time::Duration;
use tokio::sync::mpsc;

const WINDOW_MS: u64 = 5000;

fn test_settings() -> SharedSettings {
    new_shared_settings(AnomalySettings {
        window_time: WINDOW_MS,
        device_threshold: 50.0,
        area_threshold: 5.0,
        min_delta_consumption: 100.0,
    })
}

struct Harness {
    readings: mpsc::Sender<MeterMessage>,
    anomalies: mpsc::Receiver<AnomalyRecord>,
}

fn spawn_worker(settings: SharedSettings) -> Harness {
    let (anomaly_tx, anomalies) = mpsc::channel(16);
    let (readings, readings_rx) = mpsc::channel(64);
    let worker = AreaWorker::new("HCMC_Q1", settings, anomaly_tx);
    tokio::spawn(worker.run(readings_rx));
    Harness {
        readings,
        anomalies,
    }
}

fn reading(device: &str, value: f64) -> MeterReading {
    MeterReading {
        device_id: device.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        value,
    }
}

async fn send_area(h: &Harness, value: f64) {
    h.readings
        .send(MeterMessage::Area(reading("area-meter", value)))
        .await
        .unwrap();
}

async fn send_household(h: &Harness, device: &str, value: f64) {
    h.readings
        .send(MeterMessage::Household(reading(device, value)))
        .await
        .unwrap();
}

/// Let the worker drain its channel and fire any due timers.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn area_household_mismatch_flags_once() {
    let mut h = spawn_worker(test_settings());

    // area cumulative 100 -> 140 within the window (delta 40)
    send_area(&h, 100.0).await;
    send_area(&h, 140.0).await;

    // household devices contribute deltas 10, 12, 8 (sum 30)
    send_household(&h, "d1", 100.0).await;
    send_household(&h, "d2", 200.0).await;
    send_household(&h, "d3", 50.0).await;
    send_household(&h, "d1", 110.0).await;
    send_household(&h, "d2", 212.0).await;
    send_household(&h, "d3", 58.0).await;

    // cross the window boundary
    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;

    let record = h.anomalies.recv().await.unwrap();
    assert_eq!(record.kind, AnomalyKind::Area);
    assert_eq!(record.area_id, "HCMC_Q1");
    assert_eq!(record.observed, 40.0);
    assert_eq!(record.comparison, 30.0);
    assert!((record.percentage_deviation - 25.0).abs() < 0.01);

    // exactly one record for the window
    assert!(h.anomalies.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn matching_area_and_household_totals_stay_quiet() {
    let mut h = spawn_worker(test_settings());

    send_area(&h, 100.0).await;
    send_area(&h, 140.0).await;
    send_household(&h, "d1", 0.0).await;
    send_household(&h, "d1", 40.0).await;

    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;
    settle().await;

    assert!(h.anomalies.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn empty_windows_emit_nothing() {
    let mut h = spawn_worker(test_settings());

    // three full windows with no readings at all
    tokio::time::sleep(Duration::from_millis(3 * WINDOW_MS + 100)).await;
    settle().await;

    assert!(h.anomalies.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn area_reset_never_flags() {
    let mut h = spawn_worker(test_settings());

    // window 1: consistent totals, no anomaly
    send_area(&h, 100.0).await;
    send_area(&h, 140.0).await;
    send_household(&h, "d1", 0.0).await;
    send_household(&h, "d1", 40.0).await;
    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;

    // window 2: area meter resets 140 -> 20 (delta clamped to 0) while
    // households keep consuming; zero denominator defines the deviation
    // as 0, so nothing may flag
    send_area(&h, 20.0).await;
    send_household(&h, "d1", 80.0).await;
    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;
    settle().await;

    assert!(h.anomalies.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn device_spike_fires_immediately_without_window_boundary() {
    let mut h = spawn_worker(test_settings());

    // prime hh-9: counter at 0, then three deltas of 10
    for value in [0.0, 10.0, 20.0, 30.0] {
        send_household(&h, "hh-9", value).await;
    }
    // spike: delta 160 > min 100, deviation 1500% > 50%
    send_household(&h, "hh-9", 190.0).await;

    // no window boundary has passed; the device check is per-reading
    let record = h.anomalies.recv().await.unwrap();
    assert_eq!(record.kind, AnomalyKind::Device);
    assert_eq!(record.device_id.as_deref(), Some("hh-9"));
    assert_eq!(record.observed, 160.0);
    assert_eq!(record.comparison, 10.0);
    assert!((record.percentage_deviation - 1500.0).abs() < 0.01);
    assert_eq!(record.window_size_ms, WINDOW_MS);
}

#[tokio::test(start_paused = true)]
async fn device_spike_below_min_delta_is_suppressed() {
    let mut h = spawn_worker(test_settings());

    for value in [0.0, 10.0, 20.0, 30.0] {
        send_household(&h, "hh-9", value).await;
    }
    // delta 60: 500% deviation but below the 100 kWh magnitude guard
    send_household(&h, "hh-9", 90.0).await;
    settle().await;

    assert!(h.anomalies.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn threshold_updates_apply_without_restart() {
    let settings = test_settings();
    let mut h = spawn_worker(settings.clone());

    // 25% deviation would flag at the default 5% threshold; raise it first
    {
        let mut guard = settings.write().unwrap();
        guard.area_threshold = 30.0;
    }

    send_area(&h, 100.0).await;
    send_area(&h, 140.0).await;
    send_household(&h, "d1", 0.0).await;
    send_household(&h, "d1", 30.0).await;

    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;
    settle().await;
    assert!(h.anomalies.try_recv().is_err());

    // lower it again; the next window evaluates with the new value
    {
        let mut guard = settings.write().unwrap();
        guard.area_threshold = 5.0;
    }

    send_area(&h, 180.0).await;
    send_household(&h, "d1", 60.0).await;
    tokio::time::sleep(Duration::from_millis(WINDOW_MS + 100)).await;

    let record = h.anomalies.recv().await.unwrap();
    assert_eq!(record.kind, AnomalyKind::Area);
}

#[tokio::test(start_paused = true)]
async fn stopping_discards_partial_window() {
    let mut h = spawn_worker(test_settings());

    send_area(&h, 100.0).await;
    send_area(&h, 500.0).await;
    settle().await;

    // close the readings channel mid-window; the worker must exit without
    // flushing the partial window as a final result
    drop(h.readings);
    settle().await;

    assert!(h.anomalies.try_recv().is_err());
}
