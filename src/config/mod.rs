use serde::Deserialize;

/// Complete gridwatch service configuration, loaded once at startup.
/// Live anomaly thresholds are not here; they come from the KV-backed
/// settings cell and are hot-reloadable.
#[derive(Debug, Clone, Deserialize)]
pub struct GridwatchConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Static area registry; areas are never created or removed at runtime
    #[serde(default = "default_areas")]
    pub areas: Vec<AreaConfig>,
}

/// NATS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    #[serde(default = "default_settings_bucket")]
    pub settings_bucket: String,
    #[serde(default = "default_settings_key")]
    pub settings_key: String,
    #[serde(default = "default_anomaly_bucket")]
    pub anomaly_bucket: String,
    #[serde(default = "default_alert_subject")]
    pub alert_subject: String,
}

fn default_settings_bucket() -> String {
    "anomaly-settings".to_string()
}

fn default_settings_key() -> String {
    "settings".to_string()
}

fn default_anomaly_bucket() -> String {
    "anomalies".to_string()
}

fn default_alert_subject() -> String {
    "anomaly.alerts".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            settings_bucket: default_settings_bucket(),
            settings_key: default_settings_key(),
            anomaly_bucket: default_anomaly_bucket(),
            alert_subject: default_alert_subject(),
        }
    }
}

/// HTTP query/settings surface
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Persistence-sink retry policy
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// One metered area: its id and the two reading subjects feeding it.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    pub id: String,
    pub area_subject: String,
    pub household_subject: String,
}

impl AreaConfig {
    fn for_district(id: &str) -> Self {
        Self {
            id: id.to_string(),
            area_subject: format!("area_{}", id),
            household_subject: format!("household_{}", id),
        }
    }
}

fn default_areas() -> Vec<AreaConfig> {
    ["HCMC_Q1", "HCMC_Q3", "HCMC_Q4", "HCMC_Q5"]
        .iter()
        .map(|id| AreaConfig::for_district(id))
        .collect()
}

impl Default for GridwatchConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            http: HttpConfig::default(),
            persistence: PersistenceConfig::default(),
            areas: default_areas(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GridwatchConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: GridwatchConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GridwatchConfig::default();
        assert_eq!(config.nats.settings_bucket, "anomaly-settings");
        assert_eq!(config.nats.anomaly_bucket, "anomalies");
        assert_eq!(config.nats.alert_subject, "anomaly.alerts");
        assert_eq!(config.persistence.retry_attempts, 3);
        assert_eq!(config.persistence.retry_delay_ms, 2000);
        assert_eq!(config.areas.len(), 4);
        assert_eq!(config.areas[0].id, "HCMC_Q1");
        assert_eq!(config.areas[0].area_subject, "area_HCMC_Q1");
        assert_eq!(config.areas[0].household_subject, "household_HCMC_Q1");
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [nats]
            url = "nats://example.com:4222"
            anomaly_bucket = "test-anomalies"

            [http]
            listen_addr = "127.0.0.1:8080"

            [persistence]
            retry_attempts = 5
            retry_delay_ms = 500

            [[areas]]
            id = "HN_BA_DINH"
            area_subject = "area_HN_BA_DINH"
            household_subject = "household_HN_BA_DINH"
        "#;

        let config: GridwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.nats.url, "nats://example.com:4222");
        assert_eq!(config.nats.anomaly_bucket, "test-anomalies");
        assert_eq!(config.http.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.persistence.retry_attempts, 5);
        assert_eq!(config.areas.len(), 1);
        assert_eq!(config.areas[0].id, "HN_BA_DINH");
    }

    #[test]
    fn test_partial_config() {
        // Missing sections use defaults
        let toml = r#"
            [persistence]
            retry_attempts = 1
        "#;

        let config: GridwatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.persistence.retry_attempts, 1);
        assert_eq!(config.persistence.retry_delay_ms, 2000); // Default
        assert_eq!(config.nats.settings_key, "settings"); // Default
        assert!(!config.areas.is_empty()); // Default registry
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [http]
            listen_addr = "127.0.0.1:9999"
            "#
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.http.listen_addr, "127.0.0.1:9999");
    }
}
