//! In-memory `RemoteStore` for exercising the reconciler without a bucket.

use crate::errors::{SyncError, SyncResult};
use crate::models::media::{RemoteObject, is_media_file};
use crate::services::remote_store::{RemoteStore, ensure_key_safe};
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    sync::Mutex,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    puts: Vec<String>,
    fail_puts: BTreeSet<String>,
    reported_sizes: BTreeMap<String, u64>,
    fail_probe: bool,
    fail_list: bool,
}

/// Records every put and can be told to fail specific operations.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object as if an earlier run uploaded it.
    pub fn insert(&self, key: &str, body: impl Into<Bytes>) {
        self.state.lock().unwrap().objects.insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: "video/mp4".into(),
            },
        );
    }

    pub fn fail_put(&self, key: &str) {
        self.state.lock().unwrap().fail_puts.insert(key.to_string());
    }

    pub fn fail_probe(&self) {
        self.state.lock().unwrap().fail_probe = true;
    }

    pub fn fail_list(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    /// Make size read-back report `size` for `key` regardless of content.
    pub fn report_size(&self, key: &str, size: u64) {
        self.state
            .lock()
            .unwrap()
            .reported_sizes
            .insert(key.to_string(), size);
    }

    /// Keys passed to any put, in call order.
    pub fn puts(&self) -> Vec<String> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    fn record_put(&self, key: &str) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        state.puts.push(key.to_string());
        if state.fail_puts.contains(key) {
            return Err(SyncError::remote("put_object", key, "injected failure"));
        }
        Ok(())
    }

    fn store(&self, key: &str, content_type: &str, body: Bytes) {
        self.state.lock().unwrap().objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
    }
}

impl RemoteStore for InMemoryRemoteStore {
    async fn probe(&self) -> SyncResult<()> {
        if self.state.lock().unwrap().fail_probe {
            return Err(SyncError::Connection {
                bucket: "memory".into(),
                reason: "injected failure".into(),
            });
        }
        Ok(())
    }

    async fn list_media(&self) -> SyncResult<Vec<RemoteObject>> {
        let state = self.state.lock().unwrap();
        if state.fail_list {
            return Err(SyncError::remote("list_objects_v2", "memory", "injected failure"));
        }
        Ok(state
            .objects
            .iter()
            .filter(|(key, _)| is_media_file(key))
            .map(|(key, obj)| RemoteObject::new(key.clone(), obj.body.len() as u64))
            .collect())
    }

    async fn object_size(&self, key: &str) -> SyncResult<Option<u64>> {
        let state = self.state.lock().unwrap();
        if let Some(size) = state.reported_sizes.get(key) {
            return Ok(Some(*size));
        }
        Ok(state.objects.get(key).map(|obj| obj.body.len() as u64))
    }

    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        len: u64,
        mut body: BoxStream<'static, io::Result<Bytes>>,
    ) -> SyncResult<u64> {
        ensure_key_safe(key)?;
        self.record_put(key)?;
        let mut collected = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| SyncError::PartialUpload {
                key: key.to_string(),
                sent: collected.len() as u64,
                total: len,
                reason: err.to_string(),
            })?;
            collected.extend_from_slice(&chunk);
        }
        let sent = collected.len() as u64;
        self.store(key, content_type, Bytes::from(collected));
        Ok(sent)
    }

    async fn put_bytes(&self, key: &str, content_type: &str, body: Bytes) -> SyncResult<()> {
        ensure_key_safe(key)?;
        self.record_put(key)?;
        self.store(key, content_type, body);
        Ok(())
    }
}
