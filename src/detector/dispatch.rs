use crate::alert::AlertPublisher;
use crate::anomaly::AnomalyRecord;
use crate::store::AnomalyStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Bound on in-flight anomalies between detection and the sinks; workers
/// drop (and log) records when the queue is full rather than stall.
const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// Spawn the anomaly dispatcher: drains the queue and forwards every record
/// to the alert sink and the persistence sink. Each sink call runs on its
/// own task and is never awaited by the detection path; failures are logged
/// and go no further.
pub fn spawn_dispatcher(
    alert: AlertPublisher,
    store: AnomalyStore,
) -> (mpsc::Sender<AnomalyRecord>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AnomalyRecord>(DISPATCH_QUEUE_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            let alert_record = record.clone();
            let alert = alert.clone();
            tokio::spawn(async move {
                if let Err(e) = alert.publish(&alert_record).await {
                    error!(
                        area_id = %alert_record.area_id,
                        error = %e,
                        "Failed to publish anomaly alert"
                    );
                }
            });

            let store = store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.put_anomaly(&record).await {
                    error!(
                        area_id = %record.area_id,
                        error = %e,
                        "Failed to persist anomaly"
                    );
                }
            });
        }
        info!("Anomaly dispatcher stopped");
    });

    (tx, handle)
}
