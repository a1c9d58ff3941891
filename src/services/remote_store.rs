//! src/services/remote_store.rs
//!
//! RemoteStore: the bucket side of a sync. The reconciler only needs four
//! capabilities (probe, list, size read-back, streamed put), so the S3
//! implementation below is the only code that touches the SDK.

use crate::config::RemoteConfig;
use crate::errors::{SyncError, SyncResult};
use crate::models::media::{RemoteObject, is_media_file};
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream::BoxStream};
use std::{future::Future, io};
use tracing::debug;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Objects larger than this go through a multipart upload, one part at a
/// time.
pub const MULTIPART_PART_SIZE: usize = 8 * 1024 * 1024;

/// Capability interface over the bucket.
pub trait RemoteStore: Send + Sync {
    /// Cheap request proving the bucket is reachable with our credentials.
    fn probe(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Every media object in the bucket, following continuation tokens.
    fn list_media(&self) -> impl Future<Output = SyncResult<Vec<RemoteObject>>> + Send;

    /// Stored size of `key`, or `None` if it does not exist.
    fn object_size(&self, key: &str) -> impl Future<Output = SyncResult<Option<u64>>> + Send;

    /// Stream `len` bytes into `key`. Returns the number of bytes sent.
    fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        len: u64,
        body: BoxStream<'static, io::Result<Bytes>>,
    ) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Upload a small in-memory object in one request.
    fn put_bytes(
        &self,
        key: &str,
        content_type: &str,
        body: Bytes,
    ) -> impl Future<Output = SyncResult<()>> + Send;
}

/// Basic key validation to keep filenames from turning into odd object paths.
///
/// Rejects empty or oversized keys, keys that begin with `/` or have a `..`
/// path segment, and keys with control characters or backslashes. Dots inside
/// a filename (`intro..mp4`) are fine.
pub fn ensure_key_safe(key: &str) -> SyncResult<()> {
    let invalid = || SyncError::InvalidObjectKey(key.to_string());
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(invalid());
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(invalid());
    }
    if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        return Err(invalid());
    }
    Ok(())
}

/// Cuts a byte stream into parts of exactly `part_size` bytes. Only the last
/// part may be shorter, and an empty stream yields no parts at all.
pub struct PartReader {
    body: BoxStream<'static, io::Result<Bytes>>,
    pending: BytesMut,
    part_size: usize,
    done: bool,
}

impl PartReader {
    pub fn new(body: BoxStream<'static, io::Result<Bytes>>, part_size: usize) -> Self {
        Self {
            body,
            pending: BytesMut::new(),
            part_size: part_size.max(1),
            done: false,
        }
    }

    /// Next full part, the short tail, or `None` once the stream is drained.
    /// The body is never polled again after it ends.
    pub async fn next_part(&mut self) -> io::Result<Option<Bytes>> {
        while !self.done && self.pending.len() < self.part_size {
            match self.body.next().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk?),
                None => self.done = true,
            }
        }
        if self.pending.is_empty() {
            return Ok(None);
        }
        let take = self.pending.len().min(self.part_size);
        Ok(Some(self.pending.split_to(take).freeze()))
    }
}

/// S3-compatible bucket reached through `aws-sdk-s3`.
#[derive(Clone)]
pub struct S3RemoteStore {
    client: Client,
    bucket: String,
    part_size: usize,
}

impl S3RemoteStore {
    /// Build a client from `cfg`. Static credentials and an explicit endpoint
    /// take precedence over the SDK default chain.
    pub async fn connect(cfg: &RemoteConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = &cfg.endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }
        if let Some(creds) = &cfg.credentials {
            builder = builder.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                None,
                None,
                "video-sync-static",
            ));
        }

        Self::from_client(Client::from_conf(builder.build()), cfg.bucket.clone())
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            part_size: MULTIPART_PART_SIZE,
        }
    }

    #[cfg(test)]
    fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Single PutObject for bodies of at most one part.
    async fn put_single(&self, key: &str, content_type: &str, body: Bytes) -> SyncResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| SyncError::remote("put_object", key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    /// Upload `first`, `second` and then whatever `reader` still holds, one
    /// part at a time. `sent` tracks bytes acknowledged by the bucket so a
    /// failure can report how far it got.
    async fn put_multipart(
        &self,
        key: &str,
        upload_id: &str,
        [first, second]: [Bytes; 2],
        reader: &mut PartReader,
        sent: &mut u64,
    ) -> SyncResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut lookahead = Some(second);
        let mut next = Some(first);
        while let Some(part) = next {
            let part_len = part.len() as u64;
            let part_number = parts.len() as i32 + 1;
            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(part))
                .send()
                .await
                .map_err(|e| SyncError::remote("upload_part", key, DisplayErrorContext(&e)))?;
            debug!("uploaded part {} of {} ({} bytes)", part_number, key, part_len);
            *sent += part_len;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(str::to_owned))
                    .part_number(part_number)
                    .build(),
            );

            next = match lookahead.take() {
                Some(queued) => Some(queued),
                None => reader.next_part().await?,
            };
        }
        Ok(parts)
    }
}

impl RemoteStore for S3RemoteStore {
    async fn probe(&self) -> SyncResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| SyncError::Connection {
                bucket: self.bucket.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn list_media(&self) -> SyncResult<Vec<RemoteObject>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages: u64 = 0;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(t) = token.as_deref() {
                req = req.continuation_token(t);
            }
            let resp = req.send().await.map_err(|e| {
                SyncError::remote("list_objects_v2", &self.bucket, DisplayErrorContext(&e))
            })?;
            pages += 1;

            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                if !is_media_file(key) {
                    continue;
                }
                let size = obj.size().unwrap_or(0).max(0) as u64;
                objects.push(RemoteObject::new(key, size));
            }

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }
        debug!("listed {} media objects over {} page(s)", objects.len(), pages);
        Ok(objects)
    }

    async fn object_size(&self, key: &str) -> SyncResult<Option<u64>> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => Ok(Some(resp.content_length().unwrap_or(0).max(0) as u64)),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(None)
                } else {
                    Err(SyncError::remote(
                        "head_object",
                        key,
                        DisplayErrorContext(&service_err),
                    ))
                }
            }
        }
    }

    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        len: u64,
        body: BoxStream<'static, io::Result<Bytes>>,
    ) -> SyncResult<u64> {
        ensure_key_safe(key)?;
        let read_failed = |err: io::Error| SyncError::PartialUpload {
            key: key.to_string(),
            sent: 0,
            total: len,
            reason: err.to_string(),
        };

        // Look one part ahead; anything that fits in a single part goes out
        // as a plain put.
        let mut reader = PartReader::new(body, self.part_size);
        let first = reader.next_part().await.map_err(read_failed)?.unwrap_or_default();
        let Some(second) = reader.next_part().await.map_err(read_failed)? else {
            let size = first.len() as u64;
            self.put_single(key, content_type, first).await?;
            return Ok(size);
        };

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                SyncError::remote("create_multipart_upload", key, DisplayErrorContext(&e))
            })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                SyncError::remote("create_multipart_upload", key, "response carried no upload id")
            })?
            .to_string();

        let mut sent = 0u64;
        let result = self
            .put_multipart(key, &upload_id, [first, second], &mut reader, &mut sent)
            .await;

        let parts = match result {
            Ok(parts) => parts,
            Err(err) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    debug!(
                        "failed to abort multipart upload {} for {}: {}",
                        upload_id,
                        key,
                        DisplayErrorContext(&abort_err)
                    );
                }
                return Err(SyncError::PartialUpload {
                    key: key.to_string(),
                    sent,
                    total: len,
                    reason: err.to_string(),
                });
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| SyncError::PartialUpload {
                key: key.to_string(),
                sent,
                total: len,
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(sent)
    }

    async fn put_bytes(&self, key: &str, content_type: &str, body: Bytes) -> SyncResult<()> {
        ensure_key_safe(key)?;
        self.put_single(key, content_type, body).await
    }
}
