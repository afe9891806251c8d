//! NATS-link: one primary JetStream connection per process, handing out
//! `(JetStream, KV, Object)` handles per domain on demand (spec §4.1).

use crate::config::NatsLinkConfig;
use crate::error::KvError;
use async_nats::jetstream::{self, kv, object_store};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-domain JetStream/KV/Object handles, cached by [`NatsLink`].
pub struct DomainHandles {
    pub js: jetstream::Context,
    pub kv: kv::Store,
    pub object: object_store::ObjectStore,
}

struct Connected {
    client: async_nats::Client,
}

/// Shared connection manager. Cloned cheaply via `Arc`; one instance per process.
pub struct NatsLink {
    config: NatsLinkConfig,
    conn: Mutex<Option<Connected>>,
    domains: DashMap<String, Arc<DomainHandles>>,
}

impl NatsLink {
    pub fn new(config: NatsLinkConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
            domains: DashMap::new(),
        }
    }

    /// Lazily create (or return the cached) JetStream/KV/Object handle set for `domain`.
    /// An empty string selects the configured default domain.
    #[instrument(skip(self))]
    pub async fn handles_for_domain(&self, domain: &str) -> Result<Arc<DomainHandles>, KvError> {
        let effective_domain = if domain.is_empty() {
            self.config.default_domain.clone()
        } else {
            domain.to_string()
        };

        if let Some(existing) = self.domains.get(&effective_domain) {
            return Ok(Arc::clone(&existing));
        }

        let client = self.ensure_connected().await?;
        let js = if effective_domain.is_empty() {
            jetstream::new(client)
        } else {
            jetstream::with_domain(client, effective_domain.clone())
        };

        let kv = js
            .create_key_value(kv::Config {
                bucket: self.config.bucket.clone(),
                history: self.config.bucket_history,
                max_age: Duration::from_secs(self.config.bucket_ttl_secs),
                max_bytes: self.config.bucket_max_bytes,
                ..Default::default()
            })
            .await
            .map_err(|e| KvError::Internal(e.to_string()))?;

        let object = js
            .create_object_store(object_store::Config {
                bucket: self.config.object_bucket.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| KvError::Internal(e.to_string()))?;

        let handles = Arc::new(DomainHandles { js, kv, object });
        self.domains.insert(effective_domain, Arc::clone(&handles));
        Ok(handles)
    }

    /// Returns the cached client, connecting (or reconnecting) exactly once if needed.
    /// Concurrent callers serialize on the connection mutex and share the result.
    async fn ensure_connected(&self) -> Result<async_nats::Client, KvError> {
        let mut guard = self.conn.lock().await;
        if let Some(connected) = guard.as_ref() {
            return Ok(connected.client.clone());
        }
        info!(url = %self.config.nats_url, "establishing NATS connection");
        let client = async_nats::connect(&self.config.nats_url)
            .await
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        *guard = Some(Connected { client: client.clone() });
        Ok(client)
    }

    /// Called when a cached handle reports a connection-class error: invalidates every
    /// domain handle and drops the cached client so the next call reconnects.
    pub async fn mark_disconnected(&self) {
        warn!("NATS connection lost; invalidating cached domain handles");
        self.domains.clear();
        let mut guard = self.conn.lock().await;
        *guard = None;
    }

    /// Drain and close, never blocking a caller past `CLOSE_TIMEOUT` before giving up and
    /// dropping the connection outright.
    pub async fn close(&self) {
        let client = {
            let mut guard = self.conn.lock().await;
            guard.take().map(|c| c.client)
        };
        let Some(client) = client else { return };
        match tokio::time::timeout(CLOSE_TIMEOUT, client.drain()).await {
            Ok(Ok(())) => info!("NATS connection drained"),
            Ok(Err(e)) => warn!(error = %e, "error draining NATS connection"),
            Err(_) => warn!("NATS drain exceeded {:?}; closing hard", CLOSE_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn domain_cache_is_empty_before_any_connection() {
        let link = NatsLink::new(NatsLinkConfig::default());
        assert_eq!(link.domains.len(), 0);
    }

    #[tokio::test]
    async fn close_without_connection_is_a_noop() {
        let link = NatsLink::new(NatsLinkConfig::default());
        link.close().await;
    }
}
