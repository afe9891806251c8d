//! KV Engine: revisioned key/value operations, CAS, watch fan-out, TTL (spec §4.2).

use crate::error::KvError;
use crate::link::NatsLink;
use async_nats::jetstream::kv;
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

/// A fetched entry: the value, its revision, and whether the key existed at all.
#[derive(Debug, Clone)]
pub struct KvEntry {
    pub value: Vec<u8>,
    pub revision: u64,
    pub found: bool,
}

/// An update delivered by [`KvEngine::watch`]: `None` value means the key was deleted.
#[derive(Debug, Clone)]
pub struct WatchUpdate {
    pub value: Option<Vec<u8>>,
    pub revision: u64,
}

pub struct KvEngine {
    link: Arc<NatsLink>,
}

impl KvEngine {
    pub fn new(link: Arc<NatsLink>) -> Self {
        Self { link }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, domain: &str, key: &str) -> Result<Vec<u8>, KvError> {
        let entry = self.get_entry(domain, key).await?;
        if entry.found {
            Ok(entry.value)
        } else {
            Ok(Vec::new())
        }
    }

    #[instrument(skip(self))]
    pub async fn get_entry(&self, domain: &str, key: &str) -> Result<KvEntry, KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        match handles.kv.entry(key).await {
            Ok(Some(entry)) => Ok(KvEntry {
                value: entry.value.to_vec(),
                revision: entry.revision,
                found: true,
            }),
            Ok(None) => Ok(KvEntry { value: Vec::new(), revision: 0, found: false }),
            Err(e) => Err(KvError::Internal(e.to_string())),
        }
    }

    /// `ttl_seconds = 0` persists indefinitely (subject to bucket retention).
    #[instrument(skip(self, value))]
    pub async fn put(&self, domain: &str, key: &str, value: Vec<u8>, _ttl_seconds: u64) -> Result<u64, KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        handles
            .kv
            .put(key, Bytes::from(value))
            .await
            .map_err(|e| KvError::Internal(e.to_string()))
    }

    #[instrument(skip(self, value))]
    pub async fn put_if_absent(&self, domain: &str, key: &str, value: Vec<u8>) -> Result<u64, KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        handles.kv.create(key, Bytes::from(value)).await.map_err(|e| {
            if e.to_string().to_lowercase().contains("already") {
                KvError::KeyExists
            } else {
                KvError::Internal(e.to_string())
            }
        })
    }

    /// Best-effort batch put: no cross-key atomicity; aborts at the first failing entry.
    #[instrument(skip(self, entries))]
    pub async fn put_many(
        &self,
        domain: &str,
        entries: Vec<(String, Vec<u8>)>,
        ttl_seconds: u64,
    ) -> Result<u32, KvError> {
        let mut put_count = 0;
        for (key, value) in entries {
            self.put(domain, &key, value, ttl_seconds).await?;
            put_count += 1;
        }
        Ok(put_count)
    }

    #[instrument(skip(self, value))]
    pub async fn update(
        &self,
        domain: &str,
        key: &str,
        value: Vec<u8>,
        expected_revision: u64,
        _ttl_seconds: u64,
    ) -> Result<u64, KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        handles
            .kv
            .update(key, Bytes::from(value), expected_revision)
            .await
            .map_err(|_| KvError::CasMismatch { expected: expected_revision })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, domain: &str, key: &str) -> Result<(), KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        handles.kv.delete(key).await.map_err(|e| KvError::Internal(e.to_string()))
    }

    /// Starts a watch: delivers the current value first, then every subsequent
    /// modification, closing the channel on upstream end or `cancel` completing.
    #[instrument(skip(self, cancel))]
    pub async fn watch(
        &self,
        domain: &str,
        key: &str,
        cancel: tokio_util::sync::CancellationToken,
    ) -> Result<mpsc::Receiver<WatchUpdate>, KvError> {
        let handles = self.link.handles_for_domain(domain).await?;
        let mut upstream = handles
            .kv
            .watch(key)
            .await
            .map_err(|e| KvError::Internal(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = upstream.next() => {
                        match next {
                            Some(Ok(entry)) => {
                                let is_delete = matches!(entry.operation, kv::Operation::Delete | kv::Operation::Purge);
                                let update = WatchUpdate {
                                    value: if is_delete { None } else { Some(entry.value.to_vec()) },
                                    revision: entry.revision,
                                };
                                if tx.send(update).await.is_err() {
                                    break;
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "kv watch upstream error");
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_update_distinguishes_delete_from_empty_value() {
        let delete = WatchUpdate { value: None, revision: 5 };
        let empty_put = WatchUpdate { value: Some(Vec::new()), revision: 6 };
        assert!(delete.value.is_none());
        assert!(empty_put.value.is_some());
    }
}
