// NATS client integration: connection bootstrap plus the JetStream KV and
// Object Store buckets the service depends on.

mod client;

pub use client::NatsClient;
