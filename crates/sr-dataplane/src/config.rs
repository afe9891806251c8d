//! NATS-link configuration, loaded from the environment.
//!
//! Grounded on `pagi-core/src/config.rs`'s `from_env()` + typed-default helper style.

#[derive(Debug, Clone)]
pub struct NatsLinkConfig {
    pub nats_url: String,
    pub bucket: String,
    pub bucket_history: u8,
    pub bucket_ttl_secs: u64,
    pub bucket_max_bytes: i64,
    pub default_domain: String,
    pub object_bucket: String,
}

impl Default for NatsLinkConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://127.0.0.1:4222".to_string(),
            bucket: "serviceradar-kv".to_string(),
            bucket_history: 1,
            bucket_ttl_secs: 0,
            bucket_max_bytes: -1,
            default_domain: String::new(),
            object_bucket: "serviceradar-objects".to_string(),
        }
    }
}

impl NatsLinkConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            nats_url: env_string("NATS_URL", &default.nats_url),
            bucket: env_string("NATS_BUCKET", &default.bucket),
            bucket_history: env_u8("NATS_BUCKET_HISTORY", default.bucket_history).clamp(1, 255),
            bucket_ttl_secs: env_u64("NATS_BUCKET_TTL_SECS", default.bucket_ttl_secs),
            bucket_max_bytes: env_i64("NATS_BUCKET_MAX_BYTES", default.bucket_max_bytes),
            default_domain: env_string("NATS_DEFAULT_DOMAIN", &default.default_domain),
            object_bucket: env_string("NATS_OBJECT_BUCKET", &default.object_bucket),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u8(name: &str, default: u8) -> u8 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
