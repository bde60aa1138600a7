use crate::anomaly::AnomalyRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Alert sink over core NATS publish. One message per anomaly, flattened
/// record plus a human-readable message. Delivery is best-effort pub/sub;
/// the dispatcher logs failures and never feeds them back into ingestion.
#[derive(Clone)]
pub struct AlertPublisher {
    client: async_nats::Client,
    subject: String,
}

/// Wire shape of an alert: the record fields plus `message`.
#[derive(Serialize)]
struct AlertMessage<'a> {
    #[serde(flatten)]
    record: &'a AnomalyRecord,
    message: String,
}

impl AlertPublisher {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }

    /// Publish a single anomaly alert.
    pub async fn publish(&self, record: &AnomalyRecord) -> Result<()> {
        let alert = AlertMessage {
            record,
            message: record.alert_message(),
        };
        let payload = serde_json::to_vec(&alert).context("Failed to serialize alert")?;

        debug!(
            area_id = %record.area_id,
            kind = ?record.kind,
            subject = %self.subject,
            "Publishing anomaly alert"
        );

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context(format!(
                "Failed to publish alert to subject '{}'",
                self.subject
            ))?;

        Ok(())
    }
}
