use crate::config::NatsConfig;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, kv, object_store};
use tracing::info;

/// NATS client with the JetStream buckets backing settings and anomaly
/// persistence. Any failure during bootstrap is fatal at startup.
pub struct NatsClient {
    client: async_nats::Client,
    kv: kv::Store,
    object_store: object_store::ObjectStore,
}

impl NatsClient {
    /// Connect to NATS and ensure the KV and Object Store buckets exist.
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        let kv = Self::ensure_kv_bucket(&jetstream, &config.settings_bucket).await?;
        let object_store = Self::ensure_object_bucket(&jetstream, &config.anomaly_bucket).await?;

        Ok(Self {
            client,
            kv,
            object_store,
        })
    }

    /// Ensure the settings KV bucket exists, creating it if needed.
    async fn ensure_kv_bucket(jetstream: &jetstream::Context, bucket: &str) -> Result<kv::Store> {
        match jetstream.get_key_value(bucket).await {
            Ok(store) => {
                info!("KV bucket '{}' already exists", bucket);
                return Ok(store);
            }
            Err(_) => {
                info!("KV bucket '{}' does not exist, creating...", bucket);
            }
        }

        let store = jetstream
            .create_key_value(kv::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .context("Failed to create settings KV bucket")?;

        info!("Created KV bucket '{}'", bucket);
        Ok(store)
    }

    /// Ensure the anomaly object-store bucket exists, creating it if needed.
    async fn ensure_object_bucket(
        jetstream: &jetstream::Context,
        bucket: &str,
    ) -> Result<object_store::ObjectStore> {
        match jetstream.get_object_store(bucket).await {
            Ok(store) => {
                info!("Object store bucket '{}' already exists", bucket);
                return Ok(store);
            }
            Err(_) => {
                info!("Object store bucket '{}' does not exist, creating...", bucket);
            }
        }

        let store = jetstream
            .create_object_store(object_store::Config {
                bucket: bucket.to_string(),
                ..Default::default()
            })
            .await
            .context("Failed to create anomaly object-store bucket")?;

        info!("Created object store bucket '{}'", bucket);
        Ok(store)
    }

    /// Get underlying NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Settings KV bucket
    pub fn kv(&self) -> &kv::Store {
        &self.kv
    }

    /// Anomaly object-store bucket
    pub fn object_store(&self) -> &object_store::ObjectStore {
        &self.object_store
    }
}
