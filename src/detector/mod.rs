// Orchestration: the fixed area registry, per-area workers, NATS reading
// pumps and the anomaly dispatch queue.

mod dispatch;
mod worker;

pub use dispatch::spawn_dispatcher;
pub use worker::{AreaWorker, MeterMessage};

use crate::anomaly::AnomalyRecord;
use crate::config::AreaConfig;
use crate::reading::MeterReading;
use crate::settings::SharedSettings;
use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Per-reading channel depth between a subject pump and its area worker.
const READING_CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Copy)]
enum SourceKind {
    Area,
    Household,
}

struct AreaHandle {
    area_id: String,
    readings_tx: mpsc::Sender<MeterMessage>,
    worker: JoinHandle<()>,
    pumps: Vec<JoinHandle<()>>,
}

/// Owns one (area aggregator, household aggregator) worker per configured
/// area and the NATS subscriptions feeding them. The registry is built once
/// at startup; no areas come or go at runtime.
pub struct Orchestrator {
    handles: Vec<AreaHandle>,
}

impl Orchestrator {
    /// Subscribe every configured area's subjects and start its worker.
    pub async fn start(
        client: &async_nats::Client,
        areas: &[AreaConfig],
        settings: SharedSettings,
        anomaly_tx: mpsc::Sender<AnomalyRecord>,
    ) -> Result<Self> {
        let mut handles = Vec::with_capacity(areas.len());

        for area in areas {
            info!(area_id = %area.id, "Initializing area");

            let (readings_tx, readings_rx) = mpsc::channel(READING_CHANNEL_CAPACITY);
            let worker = AreaWorker::new(&area.id, settings.clone(), anomaly_tx.clone());
            let worker = tokio::spawn(worker.run(readings_rx));

            let mut pumps = Vec::with_capacity(2);
            for (subject, kind) in [
                (&area.area_subject, SourceKind::Area),
                (&area.household_subject, SourceKind::Household),
            ] {
                let subscriber = client
                    .subscribe(subject.clone())
                    .await
                    .context(format!("Failed to subscribe to '{}'", subject))?;
                pumps.push(tokio::spawn(pump_readings(
                    subscriber,
                    readings_tx.clone(),
                    kind,
                    area.id.clone(),
                    subject.clone(),
                )));
            }

            handles.push(AreaHandle {
                area_id: area.id.clone(),
                readings_tx,
                worker,
                pumps,
            });
        }

        info!(areas = handles.len(), "All area services are now running");
        Ok(Self { handles })
    }

    /// Stop every area: subscriptions are torn down first, then the reading
    /// channels close and each worker exits, cancelling its window timers.
    pub async fn stop(self) {
        for handle in self.handles {
            for pump in handle.pumps {
                pump.abort();
            }
            drop(handle.readings_tx);
            if let Err(e) = handle.worker.await {
                if !e.is_cancelled() {
                    error!(area_id = %handle.area_id, error = %e, "Area worker ended abnormally");
                }
            }
        }
        info!("Orchestrator stopped");
    }
}

/// Forward readings from one NATS subject into the area's channel.
/// Malformed payloads are dropped with a warning and affect nothing else.
async fn pump_readings(
    mut subscriber: async_nats::Subscriber,
    tx: mpsc::Sender<MeterMessage>,
    kind: SourceKind,
    area_id: String,
    subject: String,
) {
    while let Some(msg) = subscriber.next().await {
        let parsed = match kind {
            SourceKind::Area => {
                MeterReading::from_area_payload(&msg.payload).map(MeterMessage::Area)
            }
            SourceKind::Household => {
                MeterReading::from_household_payload(&msg.payload).map(MeterMessage::Household)
            }
        };

        match parsed {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    // worker gone; stop pumping
                    break;
                }
            }
            Err(e) => {
                warn!(area_id = %area_id, subject = %subject, error = %e, "Dropping invalid reading");
            }
        }
    }
}
