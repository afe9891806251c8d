//! Object Engine: streamed chunked upload/download with metadata (spec §4.3).

use crate::error::ObjectError;
use crate::link::NatsLink;
use async_nats::jetstream::object_store;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::instrument;

pub const DOWNLOAD_CHUNK_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    pub domain: String,
    pub content_type: String,
    pub compression: String,
    pub sha256: String,
    pub size: u64,
    pub attributes: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub domain: String,
    pub sha256: String,
    pub size: u64,
    pub chunks: u32,
    pub created_unix: i64,
    pub modified_unix: i64,
    pub metadata: ObjectMetadata,
}

pub struct ObjectEngine {
    link: Arc<NatsLink>,
}

impl ObjectEngine {
    pub fn new(link: Arc<NatsLink>) -> Self {
        Self { link }
    }

    /// Upload `data` (already assembled from the chunked wire protocol by the RPC layer)
    /// under `key`, merging non-empty metadata fields over any prior value.
    #[instrument(skip(self, data, meta))]
    pub async fn put_object(
        &self,
        domain: &str,
        key: &str,
        data: Vec<u8>,
        meta: ObjectMetadata,
    ) -> Result<ObjectInfo, ObjectError> {
        if key.is_empty() {
            return Err(ObjectError::InvalidArgument("key is empty".to_string()));
        }
        let handles = self.link.handles_for_domain(domain).await?;
        let sha256 = hex::encode(Sha256::digest(&data));
        let size = data.len() as u64;

        let mut description = serde_json::to_string(&meta.attributes).unwrap_or_default();
        if description.is_empty() {
            description = "{}".to_string();
        }

        let mut headers = async_nats::HeaderMap::new();
        headers.insert("content-type", meta.content_type.as_str());
        headers.insert("sr-domain", meta.domain.as_str());
        headers.insert("sr-compression", meta.compression.as_str());
        headers.insert("sr-sha256", sha256.as_str());

        let obj_meta = object_store::ObjectMetadata {
            name: key.to_string(),
            description: Some(description),
            headers: Some(headers),
            ..Default::default()
        };

        let mut reader = std::io::Cursor::new(data);
        let info = handles
            .object
            .put(obj_meta, &mut reader)
            .await
            .map_err(|e| ObjectError::Internal(e.to_string()))?;

        let now = Utc::now().timestamp();
        Ok(ObjectInfo {
            key: key.to_string(),
            domain: meta.domain.clone(),
            sha256,
            size,
            chunks: info.chunks as u32,
            created_unix: now,
            modified_unix: now,
            metadata: ObjectMetadata { size, ..meta },
        })
    }

    /// Fetch the full object body and its info. The RPC layer is responsible for
    /// re-chunking the returned bytes into `DOWNLOAD_CHUNK_BYTES`-sized wire chunks.
    #[instrument(skip(self))]
    pub async fn get_object(&self, domain: &str, key: &str) -> Result<(Vec<u8>, ObjectInfo), ObjectError> {
        let handles = self.link.handles_for_domain(domain).await?;
        let mut object = handles.object.get(key).await.map_err(|_| ObjectError::NotFound)?;
        let mut buf = Vec::new();
        object
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ObjectError::Internal(e.to_string()))?;

        let info = self.get_object_info(domain, key).await?;
        Ok((buf, info.ok_or(ObjectError::NotFound)?))
    }

    #[instrument(skip(self))]
    pub async fn delete_object(&self, domain: &str, key: &str) -> Result<bool, ObjectError> {
        let handles = self.link.handles_for_domain(domain).await?;
        match handles.object.delete(key).await {
            Ok(()) => Ok(true),
            Err(e) if e.to_string().to_lowercase().contains("not found") => Ok(false),
            Err(e) => Err(ObjectError::Internal(e.to_string())),
        }
    }

    #[instrument(skip(self))]
    pub async fn get_object_info(
        &self,
        domain: &str,
        key: &str,
    ) -> Result<Option<ObjectInfo>, ObjectError> {
        let handles = self.link.handles_for_domain(domain).await?;
        match handles.object.info(key).await {
            Ok(raw) => {
                let now = Utc::now().timestamp();
                let sha256 = raw
                    .digest
                    .clone()
                    .unwrap_or_default()
                    .trim_start_matches("SHA-256=")
                    .to_string();
                Ok(Some(ObjectInfo {
                    key: raw.name.clone(),
                    domain: domain.to_string(),
                    sha256,
                    size: raw.size as u64,
                    chunks: raw.chunks as u32,
                    created_unix: now,
                    modified_unix: now,
                    metadata: ObjectMetadata {
                        domain: domain.to_string(),
                        size: raw.size as u64,
                        ..Default::default()
                    },
                }))
            }
            Err(e) if e.to_string().to_lowercase().contains("not found") => Ok(None),
            Err(e) => Err(ObjectError::Internal(e.to_string())),
        }
    }
}

/// Merge non-empty fields of `incoming` over `base`; empty fields leave the prior value,
/// per spec §4.3's upload-chunk metadata merge rule.
pub fn merge_metadata(base: &mut ObjectMetadata, incoming: &ObjectMetadata) {
    if !incoming.domain.is_empty() {
        base.domain = incoming.domain.clone();
    }
    if !incoming.content_type.is_empty() {
        base.content_type = incoming.content_type.clone();
    }
    if !incoming.compression.is_empty() {
        base.compression = incoming.compression.clone();
    }
    if !incoming.sha256.is_empty() {
        base.sha256 = incoming.sha256.clone();
    }
    if incoming.size != 0 {
        base.size = incoming.size;
    }
    for (k, v) in &incoming.attributes {
        if !v.is_empty() {
            base.attributes.insert(k.clone(), v.clone());
        }
    }
}

/// Split `data` into download-protocol chunks: info attached to the first chunk only,
/// `is_final` on the last (possibly empty) chunk, matching spec §4.3's download protocol.
pub fn chunk_for_download(data: &[u8]) -> Vec<(usize, usize, bool)> {
    if data.is_empty() {
        return vec![(0, 0, true)];
    }
    let mut ranges = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + DOWNLOAD_CHUNK_BYTES).min(data.len());
        ranges.push((offset, end, end == data.len()));
        offset = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_single_final_chunk() {
        let ranges = chunk_for_download(&[]);
        assert_eq!(ranges, vec![(0, 0, true)]);
    }

    #[test]
    fn chunking_splits_at_download_chunk_bytes() {
        let data = vec![0u8; DOWNLOAD_CHUNK_BYTES + 10];
        let ranges = chunk_for_download(&data);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], (0, DOWNLOAD_CHUNK_BYTES, false));
        assert_eq!(ranges[1], (DOWNLOAD_CHUNK_BYTES, DOWNLOAD_CHUNK_BYTES + 10, true));
    }

    #[test]
    fn merge_metadata_keeps_prior_value_for_empty_fields() {
        let mut base = ObjectMetadata {
            content_type: "application/octet-stream".to_string(),
            ..Default::default()
        };
        let incoming = ObjectMetadata::default();
        merge_metadata(&mut base, &incoming);
        assert_eq!(base.content_type, "application/octet-stream");
    }

    #[test]
    fn merge_metadata_overwrites_non_empty_fields() {
        let mut base = ObjectMetadata { content_type: "text/plain".to_string(), ..Default::default() };
        let incoming = ObjectMetadata { content_type: "image/png".to_string(), ..Default::default() };
        merge_metadata(&mut base, &incoming);
        assert_eq!(base.content_type, "image/png");
    }
}
