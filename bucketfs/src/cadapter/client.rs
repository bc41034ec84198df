//! High-level client API for the object store
//!
//! `ObjectBackend` is the minimal S3-compatible surface every adapter
//! implements. `ObjectClient` is what the filesystem, repository and LFS
//! layers hold: it tags failures with the operation and key, and logs calls.

use crate::error::{BackendError, BoxError};
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Largest batch accepted by S3 `DeleteObjects`.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Largest page returned by S3 `ListObjectsV2`.
pub const MAX_LIST_PAGE: usize = 1000;

pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Body of a streamed upload. `Sync` because the S3 HTTP body requires it.
pub type UploadReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

pub struct ObjectBody {
    pub reader: ObjectReader,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

#[derive(Clone, Debug, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    /// Token for the next page; `None` once the listing is exhausted.
    pub next_continuation: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresignMethod {
    Get,
    Put,
}

impl PresignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresignMethod::Get => "GET",
            PresignMethod::Put => "PUT",
        }
    }
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Whole-object PUT; the content length is `data.len()`.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BoxError>;

    /// Whole-object PUT streamed from `reader`, which must yield exactly
    /// `content_length` bytes. Nothing is stored if the reader fails.
    async fn put_stream(
        &self,
        key: &str,
        reader: UploadReader,
        content_length: u64,
        content_type: Option<&str>,
    ) -> Result<(), BoxError>;

    /// Returns `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<ObjectBody>, BoxError>;

    /// Returns `None` when the key does not exist.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError>;

    async fn copy_object(&self, src: &str, dst: &str) -> Result<(), BoxError>;

    /// Deleting a missing key succeeds.
    async fn delete_object(&self, key: &str) -> Result<(), BoxError>;

    /// Deletes at most `max_delete_batch()` keys in one call.
    async fn delete_objects(&self, keys: &[String]) -> Result<(), BoxError>;

    /// One page of keys under `prefix`, in lexicographic order.
    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, BoxError>;

    /// Signs a direct-access URL. No existence check is made.
    async fn presign(
        &self,
        method: PresignMethod,
        key: &str,
        expires_in: Duration,
        content_length: Option<u64>,
    ) -> Result<String, BoxError>;

    fn max_delete_batch(&self) -> usize {
        MAX_DELETE_BATCH
    }
}

/// Shared handle to a backend; cheap to clone.
#[derive(Clone)]
pub struct ObjectClient {
    backend: Arc<dyn ObjectBackend>,
}

impl ObjectClient {
    pub fn new<B: ObjectBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<dyn ObjectBackend>) -> Self {
        Self { backend }
    }

    pub fn max_delete_batch(&self) -> usize {
        self.backend.max_delete_batch().clamp(1, MAX_DELETE_BATCH)
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        trace!(key, len = data.len(), "put_object");
        self.backend
            .put_object(key, data, content_type)
            .await
            .map_err(|e| BackendError::new("put_object", key, e))
    }

    pub async fn put_stream(
        &self,
        key: &str,
        reader: UploadReader,
        content_length: u64,
        content_type: Option<&str>,
    ) -> Result<(), BackendError> {
        trace!(key, content_length, "put_stream");
        self.backend
            .put_stream(key, reader, content_length, content_type)
            .await
            .map_err(|e| BackendError::new("put_stream", key, e))
    }

    pub async fn get_object(&self, key: &str) -> Result<Option<ObjectBody>, BackendError> {
        trace!(key, "get_object");
        self.backend
            .get_object(key)
            .await
            .map_err(|e| BackendError::new("get_object", key, e))
    }

    /// Downloads the whole object into memory.
    pub async fn get_bytes(
        &self,
        key: &str,
    ) -> Result<Option<(Vec<u8>, Option<SystemTime>)>, BackendError> {
        let Some(mut body) = self.get_object(key).await? else {
            return Ok(None);
        };
        let mut data = Vec::with_capacity(body.size as usize);
        body.reader
            .read_to_end(&mut data)
            .await
            .map_err(|e| BackendError::new("get_object", key, e))?;
        Ok(Some((data, body.last_modified)))
    }

    pub async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BackendError> {
        trace!(key, "head_object");
        self.backend
            .head_object(key)
            .await
            .map_err(|e| BackendError::new("head_object", key, e))
    }

    pub async fn copy_object(&self, src: &str, dst: &str) -> Result<(), BackendError> {
        trace!(src, dst, "copy_object");
        self.backend
            .copy_object(src, dst)
            .await
            .map_err(|e| BackendError::new("copy_object", format!("{src} -> {dst}"), e))
    }

    pub async fn delete_object(&self, key: &str) -> Result<(), BackendError> {
        trace!(key, "delete_object");
        self.backend
            .delete_object(key)
            .await
            .map_err(|e| BackendError::new("delete_object", key, e))
    }

    pub async fn delete_objects(&self, keys: &[String]) -> Result<(), BackendError> {
        if keys.is_empty() {
            return Ok(());
        }
        trace!(count = keys.len(), first = %keys[0], "delete_objects");
        self.backend
            .delete_objects(keys)
            .await
            .map_err(|e| BackendError::new("delete_objects", keys[0].as_str(), e))
    }

    pub async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, BackendError> {
        let max_keys = max_keys.clamp(1, MAX_LIST_PAGE);
        trace!(prefix, max_keys, "list_objects");
        self.backend
            .list_objects(prefix, continuation, max_keys)
            .await
            .map_err(|e| BackendError::new("list_objects", prefix, e))
    }

    /// Drains every page under `prefix`.
    pub async fn list_all(
        &self,
        prefix: &str,
        page_size: usize,
    ) -> Result<Vec<ObjectMeta>, BackendError> {
        let mut out = Vec::new();
        let mut token = None;
        loop {
            let page = self.list_objects(prefix, token, page_size).await?;
            out.extend(page.objects);
            match page.next_continuation {
                Some(next) => token = Some(next),
                None => return Ok(out),
            }
        }
    }

    pub async fn presign(
        &self,
        method: PresignMethod,
        key: &str,
        expires_in: Duration,
        content_length: Option<u64>,
    ) -> Result<String, BackendError> {
        trace!(key, method = method.as_str(), "presign");
        self.backend
            .presign(method, key, expires_in, content_length)
            .await
            .map_err(|e| BackendError::new("presign", key, e))
    }
}
