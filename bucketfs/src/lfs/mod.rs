//! LFS blob store: content-addressed large objects keyed by OID.
//!
//! Objects live at `prefix + oid` with no directory structure. The OID is
//! trusted as given; hashing the content is left to the batch-API layer.
//! Clients upload and download directly through presigned URLs.

use crate::cadapter::client::{ObjectClient, ObjectReader, PresignMethod};
use crate::error::LfsError;
use crate::vfs::path;
use chrono::{DateTime, Utc};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};
use tracing::debug;

pub const CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresignedUrl {
    pub href: String,
    pub method: &'static str,
    pub expires_at: DateTime<Utc>,
}

pub struct LfsObject {
    pub reader: ObjectReader,
    pub size: u64,
}

#[derive(Clone)]
pub struct LfsStore {
    client: ObjectClient,
    prefix: String,
}

impl LfsStore {
    pub fn new(client: ObjectClient, prefix: &str) -> Self {
        Self {
            client,
            prefix: path::normalize_prefix(prefix),
        }
    }

    fn key_for(&self, oid: &str) -> Result<String, LfsError> {
        if oid.is_empty() || oid.contains('/') || oid == "." || oid == ".." {
            return Err(LfsError::InvalidOid(oid.to_string()));
        }
        Ok(format!("{}{}", self.prefix, oid))
    }

    /// Streams exactly `size` bytes from `reader` into one PUT. Extra bytes
    /// are ignored; a reader that ends early fails with `SizeMismatch`.
    pub async fn upload<R>(&self, oid: &str, reader: R, size: u64) -> Result<(), LfsError>
    where
        R: AsyncRead + Unpin + Send + Sync + 'static,
    {
        let key = self.key_for(oid)?;
        let progress = Arc::new(Progress::default());
        let body = SizedReader {
            inner: reader.take(size),
            expected: size,
            progress: progress.clone(),
        };
        let result = self
            .client
            .put_stream(&key, Box::pin(body), size, Some(CONTENT_TYPE))
            .await;
        if progress.ended_early.load(Ordering::Acquire) {
            return Err(LfsError::SizeMismatch {
                oid: oid.to_string(),
                expected: size,
                actual: progress.read.load(Ordering::Acquire),
            });
        }
        result?;
        debug!(oid, size, "lfs object uploaded");
        Ok(())
    }

    pub async fn download(&self, oid: &str) -> Result<LfsObject, LfsError> {
        let key = self.key_for(oid)?;
        match self.client.get_object(&key).await? {
            Some(body) => Ok(LfsObject {
                reader: body.reader,
                size: body.size,
            }),
            None => Err(LfsError::ObjectNotFound {
                oid: oid.to_string(),
            }),
        }
    }

    pub async fn exists(&self, oid: &str) -> Result<bool, LfsError> {
        Ok(self.size(oid).await?.is_some())
    }

    pub async fn size(&self, oid: &str) -> Result<Option<u64>, LfsError> {
        let key = self.key_for(oid)?;
        Ok(self.client.head_object(&key).await?.map(|m| m.size))
    }

    /// Deleting a missing object is not an error.
    pub async fn delete(&self, oid: &str) -> Result<(), LfsError> {
        let key = self.key_for(oid)?;
        self.client.delete_object(&key).await?;
        Ok(())
    }

    /// No existence check: the client is trusted to upload matching content.
    pub async fn generate_upload_url(
        &self,
        oid: &str,
        size: u64,
        expiry: Duration,
    ) -> Result<PresignedUrl, LfsError> {
        self.presign(PresignMethod::Put, oid, Some(size), expiry)
            .await
    }

    pub async fn generate_download_url(
        &self,
        oid: &str,
        expiry: Duration,
    ) -> Result<PresignedUrl, LfsError> {
        self.presign(PresignMethod::Get, oid, None, expiry).await
    }

    async fn presign(
        &self,
        method: PresignMethod,
        oid: &str,
        size: Option<u64>,
        expiry: Duration,
    ) -> Result<PresignedUrl, LfsError> {
        if expiry.is_zero() {
            return Err(LfsError::InvalidExpiry);
        }
        let delta = chrono::Duration::from_std(expiry).map_err(|_| LfsError::InvalidExpiry)?;
        let key = self.key_for(oid)?;
        let href = self.client.presign(method, &key, expiry, size).await?;
        Ok(PresignedUrl {
            href,
            method: method.as_str(),
            expires_at: Utc::now() + delta,
        })
    }
}

#[derive(Default)]
struct Progress {
    read: AtomicU64,
    ended_early: AtomicBool,
}

/// Counts bytes on their way to the backend and turns a premature end of
/// the source into `UnexpectedEof`.
struct SizedReader<R> {
    inner: Take<R>,
    expected: u64,
    progress: Arc<Progress>,
}

impl<R: AsyncRead + Unpin> AsyncRead for SizedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let n = (buf.filled().len() - before) as u64;
        let total = this.progress.read.fetch_add(n, Ordering::AcqRel) + n;
        if n == 0 && buf.remaining() > 0 && total < this.expected {
            this.progress.ended_early.store(true, Ordering::Release);
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended after {total} of {} bytes", this.expected),
            )));
        }
        Poll::Ready(Ok(()))
    }
}
