// Reading model and validation
pub mod reading;

// Live anomaly settings cell + KV store
pub mod settings;

// Windowed aggregation and anomaly scoring
pub mod metrics;

// Anomaly records
pub mod anomaly;

// Per-area workers, routing and anomaly dispatch
pub mod detector;

// HTTP query and settings APIs
pub mod api;

// NATS client integration
pub mod nats;

// Alert sink
pub mod alert;

// Anomaly persistence and queries
pub mod store;

// Service configuration
pub mod config;
