use super::{current, replace, AnomalySettings, SharedSettings};
use anyhow::{Context, Result};
use async_nats::jetstream::kv;
use tracing::{error, info};

/// Settings store backed by a JetStream KV bucket. One key holds the whole
/// JSON settings blob; the in-memory cell is the read path for the hot loop.
#[derive(Clone)]
pub struct SettingsStore {
    kv: kv::Store,
    key: String,
    cell: SharedSettings,
}

impl SettingsStore {
    pub fn new(kv: kv::Store, key: impl Into<String>, cell: SharedSettings) -> Self {
        Self {
            kv,
            key: key.into(),
            cell,
        }
    }

    /// Load settings from the KV store into the cell.
    ///
    /// A missing key or an unreachable/corrupt entry falls back to the
    /// built-in defaults; startup never fails on the settings read.
    pub async fn load(&self) -> AnomalySettings {
        let settings = match self.kv.get(&self.key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<AnomalySettings>(&bytes) {
                Ok(settings) => {
                    info!(key = %self.key, ?settings, "Loaded anomaly settings from KV store");
                    settings
                }
                Err(e) => {
                    error!(key = %self.key, error = %e, "Stored settings are corrupt, using defaults");
                    AnomalySettings::default()
                }
            },
            Ok(None) => {
                info!(key = %self.key, "No stored settings, using defaults");
                AnomalySettings::default()
            }
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to read settings from KV store, using defaults");
                AnomalySettings::default()
            }
        };

        replace(&self.cell, settings);
        settings
    }

    /// Current in-memory settings.
    pub fn current(&self) -> AnomalySettings {
        current(&self.cell)
    }

    /// Persist a fully-merged settings value, then swap it into the cell.
    /// The cell is only updated after the write succeeds, so a failed
    /// persist leaves the live configuration unchanged.
    pub async fn persist(&self, merged: AnomalySettings) -> Result<AnomalySettings> {
        let payload = serde_json::to_vec(&merged).context("Failed to serialize settings")?;
        self.kv
            .put(&self.key, payload.into())
            .await
            .context("Failed to persist settings to KV store")?;

        replace(&self.cell, merged);
        info!(key = %self.key, settings = ?merged, "Anomaly settings updated");
        Ok(merged)
    }
}
