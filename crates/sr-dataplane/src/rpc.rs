//! Data RPC Facade: wire-level mapping of KV/Object operations to gRPC (spec §4.3, §6).

use crate::kv::KvEngine;
use crate::object::{self, merge_metadata, ObjectEngine, ObjectMetadata as EngineObjectMetadata};
use crate::proto::{
    data_service_server::DataService, BatchEntry, BatchGetRequest, BatchGetResponse,
    DeleteObjectRequest, DeleteObjectResponse, DeleteRequest, DeleteResponse,
    DownloadChunk, DownloadObjectRequest, GetObjectInfoRequest, GetObjectInfoResponse,
    GetRequest, GetResponse, InfoRequest, InfoResponse, ObjectInfo as WireObjectInfo,
    ObjectMetadata as WireObjectMetadata, PutManyRequest, PutManyResponse, PutRequest,
    PutResponse, UpdateRequest, UpdateResponse, UploadChunk, WatchEvent, WatchRequest,
};
use futures_util::StreamExt;
use std::pin::Pin;
use tonic::{Request, Response, Status, Streaming};
use tracing::instrument;

pub struct DataRpcFacade {
    kv: KvEngine,
    objects: ObjectEngine,
    bucket: String,
    object_bucket: String,
}

impl DataRpcFacade {
    pub fn new(kv: KvEngine, objects: ObjectEngine, bucket: String, object_bucket: String) -> Self {
        Self { kv, objects, bucket, object_bucket }
    }
}

fn to_wire_metadata(m: &EngineObjectMetadata) -> WireObjectMetadata {
    WireObjectMetadata {
        domain: m.domain.clone(),
        content_type: m.content_type.clone(),
        compression: m.compression.clone(),
        sha256: m.sha256.clone(),
        size: m.size,
        attributes: m.attributes.clone(),
    }
}

fn to_wire_info(info: &object::ObjectInfo) -> WireObjectInfo {
    WireObjectInfo {
        key: info.key.clone(),
        domain: info.domain.clone(),
        sha256: info.sha256.clone(),
        size: info.size,
        chunks: info.chunks,
        created_unix: info.created_unix,
        modified_unix: info.modified_unix,
        metadata: Some(to_wire_metadata(&info.metadata)),
    }
}

#[tonic::async_trait]
impl DataService for DataRpcFacade {
    #[instrument(skip(self, request))]
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let entry = self.kv.get_entry(&req.domain, &req.key).await?;
        Ok(Response::new(GetResponse {
            value: entry.value,
            found: entry.found,
            revision: entry.revision,
        }))
    }

    #[instrument(skip(self, request))]
    async fn batch_get(
        &self,
        request: Request<BatchGetRequest>,
    ) -> Result<Response<BatchGetResponse>, Status> {
        let req = request.into_inner();
        let mut entries = Vec::with_capacity(req.keys.len());
        for key in req.keys {
            let entry = self.kv.get_entry(&req.domain, &key).await?;
            entries.push(BatchEntry {
                key,
                value: entry.value,
                found: entry.found,
                revision: entry.revision,
            });
        }
        Ok(Response::new(BatchGetResponse { entries }))
    }

    #[instrument(skip(self, request))]
    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        let revision = self.kv.put(&req.domain, &req.key, req.value, req.ttl_seconds).await?;
        Ok(Response::new(PutResponse { revision }))
    }

    #[instrument(skip(self, request))]
    async fn put_if_absent(
        &self,
        request: Request<PutRequest>,
    ) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        let revision = self.kv.put_if_absent(&req.domain, &req.key, req.value).await?;
        Ok(Response::new(PutResponse { revision }))
    }

    #[instrument(skip(self, request))]
    async fn put_many(
        &self,
        request: Request<PutManyRequest>,
    ) -> Result<Response<PutManyResponse>, Status> {
        let req = request.into_inner();
        let entries = req.entries.into_iter().map(|e| (e.key, e.value)).collect();
        let put_count = self.kv.put_many(&req.domain, entries, req.ttl_seconds).await?;
        Ok(Response::new(PutManyResponse { put_count }))
    }

    #[instrument(skip(self, request))]
    async fn update(
        &self,
        request: Request<UpdateRequest>,
    ) -> Result<Response<UpdateResponse>, Status> {
        let req = request.into_inner();
        let new_revision = self
            .kv
            .update(&req.domain, &req.key, req.value, req.revision, req.ttl_seconds)
            .await?;
        Ok(Response::new(UpdateResponse { new_revision }))
    }

    #[instrument(skip(self, request))]
    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        self.kv.delete(&req.domain, &req.key).await?;
        Ok(Response::new(DeleteResponse {}))
    }

    type WatchStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<WatchEvent, Status>> + Send + 'static>>;

    #[instrument(skip(self, request))]
    async fn watch(&self, request: Request<WatchRequest>) -> Result<Response<Self::WatchStream>, Status> {
        let req = request.into_inner();
        let cancel = tokio_util::sync::CancellationToken::new();
        let cancel_guard = cancel.clone();
        let mut rx = self
            .kv
            .watch(&req.domain, &req.key, cancel)
            .await?;

        let stream = async_stream::stream! {
            let _guard = cancel_guard.drop_guard();
            while let Some(update) = rx.recv().await {
                yield Ok(WatchEvent {
                    deleted: update.value.is_none(),
                    value: update.value.unwrap_or_default(),
                    revision: update.revision,
                });
            }
        };
        Ok(Response::new(Box::pin(stream)))
    }

    #[instrument(skip(self, request))]
    async fn info(&self, request: Request<InfoRequest>) -> Result<Response<InfoResponse>, Status> {
        let req = request.into_inner();
        Ok(Response::new(InfoResponse {
            domain: req.domain,
            bucket: self.bucket.clone(),
            object_bucket: self.object_bucket.clone(),
        }))
    }

    #[instrument(skip(self, request))]
    async fn upload_object(
        &self,
        request: Request<Streaming<UploadChunk>>,
    ) -> Result<Response<WireObjectInfo>, Status> {
        let mut stream = request.into_inner();
        let mut key = String::new();
        let mut domain = String::new();
        let mut meta = EngineObjectMetadata::default();
        let mut buffer = Vec::new();
        let mut first = true;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if first {
                if chunk.key.is_empty() {
                    return Err(Status::invalid_argument("first chunk must carry a non-empty key"));
                }
                key = chunk.key.clone();
                first = false;
            }
            if let Some(wire_meta) = chunk.metadata {
                let incoming = EngineObjectMetadata {
                    domain: wire_meta.domain,
                    content_type: wire_meta.content_type,
                    compression: wire_meta.compression,
                    sha256: wire_meta.sha256,
                    size: wire_meta.size,
                    attributes: wire_meta.attributes,
                };
                if !incoming.domain.is_empty() {
                    domain = incoming.domain.clone();
                }
                merge_metadata(&mut meta, &incoming);
            }
            buffer.extend_from_slice(&chunk.data);
            if chunk.is_final {
                break;
            }
        }

        if key.is_empty() {
            return Err(Status::invalid_argument("no key supplied in upload stream"));
        }

        let info = self.objects.put_object(&domain, &key, buffer, meta).await?;
        Ok(Response::new(to_wire_info(&info)))
    }

    type DownloadObjectStream = Pin<Box<dyn tokio_stream::Stream<Item = Result<DownloadChunk, Status>> + Send + 'static>>;

    #[instrument(skip(self, request))]
    async fn download_object(
        &self,
        request: Request<DownloadObjectRequest>,
    ) -> Result<Response<Self::DownloadObjectStream>, Status> {
        let req = request.into_inner();
        let (data, info) = self.objects.get_object(&req.domain, &req.key).await?;
        let wire_info = to_wire_info(&info);
        let ranges = object::chunk_for_download(&data);

        let stream = async_stream::stream! {
            for (i, (start, end, is_final)) in ranges.into_iter().enumerate() {
                yield Ok(DownloadChunk {
                    info: if i == 0 { Some(wire_info.clone()) } else { None },
                    data: data[start..end].to_vec(),
                    is_final,
                });
            }
        };
        Ok(Response::new(Box::pin(stream)))
    }

    #[instrument(skip(self, request))]
    async fn delete_object(
        &self,
        request: Request<DeleteObjectRequest>,
    ) -> Result<Response<DeleteObjectResponse>, Status> {
        let req = request.into_inner();
        let deleted = self.objects.delete_object(&req.domain, &req.key).await?;
        Ok(Response::new(DeleteObjectResponse { deleted }))
    }

    #[instrument(skip(self, request))]
    async fn get_object_info(
        &self,
        request: Request<GetObjectInfoRequest>,
    ) -> Result<Response<GetObjectInfoResponse>, Status> {
        let req = request.into_inner();
        match self.objects.get_object_info(&req.domain, &req.key).await? {
            Some(info) => Ok(Response::new(GetObjectInfoResponse {
                info: Some(to_wire_info(&info)),
                found: true,
            })),
            None => Ok(Response::new(GetObjectInfoResponse { info: None, found: false })),
        }
    }
}
