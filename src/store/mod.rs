use crate::anomaly::AnomalyRecord;
use crate::config::PersistenceConfig;
use anyhow::{Context, Result};
use async_nats::jetstream::object_store::ObjectStore;
use futures::StreamExt;
use serde::Serialize;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};


/// Which persisted anomalies a listing should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnomalyFilter {
    All,
    /// Area-level records under the `district-level` key segment
    District,
    /// Per-device records
    Device,
}

/// Wire shape of a persisted anomaly: the record fields plus `message`.
#[derive(Serialize)]
struct StoredAnomaly<'a> {
    #[serde(flatten)]
    record: &'a AnomalyRecord,
    message: String,
}

/// Persistence sink and query backend over the JetStream Object Store.
/// One JSON object per anomaly, keyed by area/device/date.
#[derive(Clone)]
pub struct AnomalyStore {
    store: ObjectStore,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl AnomalyStore {
    pub fn new(store: ObjectStore, persistence: &PersistenceConfig) -> Self {
        Self {
            store,
            retry_attempts: persistence.retry_attempts.max(1),
            retry_delay: Duration::from_millis(persistence.retry_delay_ms),
        }
    }

    /// Persist one anomaly record, retrying a fixed number of times with a
    /// fixed delay before surfacing the failure. The record is not
    /// re-queued after retries are exhausted.
    pub async fn put_anomaly(&self, record: &AnomalyRecord) -> Result<String> {
        let key = record.object_key();
        let stored = StoredAnomaly {
            record,
            message: record.stored_message(),
        };
        let payload = serde_json::to_vec(&stored).context("Failed to serialize anomaly")?;

        let mut attempt = 1;
        loop {
            match self.store.put(key.as_str(), &mut payload.as_slice()).await {
                Ok(_) => {
                    info!(key = %key, kind = ?record.kind, "Anomaly stored");
                    return Ok(key);
                }
                Err(e) if attempt < self.retry_attempts => {
                    warn!(
                        key = %key,
                        attempt,
                        error = %e,
                        "Anomaly store put failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(e).context(format!(
                        "Failed to store anomaly '{}' after {} attempts",
                        key, self.retry_attempts
                    ));
                }
            }
        }
    }

    /// List persisted anomalies, newest first.
    ///
    /// `start_after` is an opaque cursor: the object name of the last entry
    /// the caller already has. Names sort lexicographically, so paging walks
    /// the key space in order; the page is reversed before returning.
    pub async fn list_anomalies(
        &self,
        filter: AnomalyFilter,
        limit: usize,
        start_after: Option<&str>,
    ) -> Result<Vec<serde_json::Value>> {
        let mut names: Vec<String> = {
            let mut listing = self
                .store
                .list()
                .await
                .context("Failed to list anomaly objects")?;

            let mut names = Vec::new();
            while let Some(object) = listing.next().await {
                let object = object.context("Failed to read anomaly object listing")?;
                if object.deleted {
                    continue;
                }
                if name_matches(&object.name, filter) {
                    names.push(object.name);
                }
            }
            names
        };

        names.sort();
        let mut page: Vec<serde_json::Value> = Vec::new();

        for name in names {
            if page.len() >= limit {
                break;
            }
            if let Some(cursor) = start_after {
                if name.as_str() <= cursor {
                    continue;
                }
            }

            let mut anomaly = self.fetch_anomaly(&name).await?;
            if !kind_matches(&anomaly, filter) {
                continue;
            }
            if let Some(map) = anomaly.as_object_mut() {
                map.insert("fileName".to_string(), serde_json::Value::String(name));
            }
            page.push(anomaly);
        }

        page.reverse();
        Ok(page)
    }

    async fn fetch_anomaly(&self, name: &str) -> Result<serde_json::Value> {
        let mut object = self
            .store
            .get(name)
            .await
            .context(format!("Failed to fetch anomaly object '{}'", name))?;

        let mut buf = Vec::new();
        object
            .read_to_end(&mut buf)
            .await
            .context(format!("Failed to read anomaly object '{}'", name))?;

        serde_json::from_slice(&buf).context(format!("Anomaly object '{}' is not valid JSON", name))
    }
}

/// Key-layout filter applied before fetching object bodies.
fn name_matches(name: &str, filter: AnomalyFilter) -> bool {
    if !name.starts_with("anomalies/") {
        return false;
    }
    match filter {
        AnomalyFilter::All => true,
        AnomalyFilter::District => name.contains("/district-level/"),
        AnomalyFilter::Device => !name.contains("/district-level/"),
    }
}

/// The stored `typeof` must agree with the key segment the object was found
/// under; mismatched objects are dropped from the page.
fn kind_matches(anomaly: &serde_json::Value, filter: AnomalyFilter) -> bool {
    match filter {
        AnomalyFilter::All => true,
        AnomalyFilter::District => anomaly["typeof"] == "AREA",
        AnomalyFilter::Device => anomaly["typeof"] == "DEVICE",
    }
}
