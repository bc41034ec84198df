//! Fault-injecting wrapper around `LocalFsBackend` for unit tests.

use crate::cadapter::client::{
    ListPage, ObjectBackend, ObjectBody, ObjectMeta, PresignMethod, UploadReader,
};
use crate::cadapter::localfs::LocalFsBackend;
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct FaultyBackend {
    inner: LocalFsBackend,
    /// Batch deletes issued so far.
    pub batch_deletes: Arc<AtomicUsize>,
    /// 1-based batch delete that fails.
    fail_on_batch: Option<usize>,
    fail_delete_object: bool,
    /// Reads and listings never complete.
    stall_reads: bool,
}

impl FaultyBackend {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalFsBackend::new(root),
            batch_deletes: Arc::new(AtomicUsize::new(0)),
            fail_on_batch: None,
            fail_delete_object: false,
            stall_reads: false,
        }
    }

    pub fn failing_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete_object = true;
        self
    }

    pub fn stalled_reads(mut self) -> Self {
        self.stall_reads = true;
        self
    }

    async fn maybe_stall(&self) {
        if self.stall_reads {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl ObjectBackend for FaultyBackend {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        self.inner.put_object(key, data, content_type).await
    }

    async fn put_stream(
        &self,
        key: &str,
        reader: UploadReader,
        content_length: u64,
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        self.inner
            .put_stream(key, reader, content_length, content_type)
            .await
    }

    async fn get_object(&self, key: &str) -> Result<Option<ObjectBody>, BoxError> {
        self.maybe_stall().await;
        self.inner.get_object(key).await
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError> {
        self.maybe_stall().await;
        self.inner.head_object(key).await
    }

    async fn copy_object(&self, src: &str, dst: &str) -> Result<(), BoxError> {
        self.inner.copy_object(src, dst).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), BoxError> {
        if self.fail_delete_object {
            return Err("injected delete failure".into());
        }
        self.inner.delete_object(key).await
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), BoxError> {
        let n = self.batch_deletes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(n) {
            return Err("injected failure".into());
        }
        self.inner.delete_objects(keys).await
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, BoxError> {
        self.maybe_stall().await;
        self.inner.list_objects(prefix, continuation, max_keys).await
    }

    async fn presign(
        &self,
        method: PresignMethod,
        key: &str,
        expires_in: Duration,
        content_length: Option<u64>,
    ) -> Result<String, BoxError> {
        self.inner
            .presign(method, key, expires_in, content_length)
            .await
    }
}
