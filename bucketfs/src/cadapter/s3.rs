//! S3 适配器：基于 aws-sdk-s3 的实现，兼容 R2 / MinIO 等 S3 协议存储。
//!
//! Retries and timeouts are delegated to the SDK configuration; this adapter
//! issues exactly one request per call.

use crate::cadapter::client::{
    ListPage, ObjectBackend, ObjectBody, ObjectMeta, PresignMethod, UploadReader,
};
use crate::error::BoxError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::time::{Duration, SystemTime};
use tokio_util::io::ReaderStream;

/// Characters escaped in the `x-amz-copy-source` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// S3 后端配置选项
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint (R2, MinIO); `None` uses AWS.
    pub endpoint: Option<String>,
    pub region: String,
    /// Path-style addressing, required by most self-hosted stores.
    pub force_path_style: bool,
    /// 最大重试次数（交给 SDK 的 retry 配置）
    pub max_retries: u32,
    /// Per-operation timeout, including SDK retries.
    pub timeout: Duration,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            force_path_style: false,
            max_retries: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Credentials come from aws-config's default provider chain
    /// (`AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, profiles, ...).
    pub async fn new(bucket: impl Into<String>, config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.max_retries + 1))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.timeout)
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let s3_conf = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: Client::from_conf(s3_conf),
            bucket: bucket.into(),
        }
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }
}

fn sdk_err<E: std::error::Error>(e: E) -> BoxError {
    DisplayErrorContext(e).to_string().into()
}

fn to_system_time(t: Option<&DateTime>) -> Option<SystemTime> {
    t.and_then(|t| SystemTime::try_from(*t).ok())
}

fn to_size(len: Option<i64>) -> u64 {
    len.unwrap_or_default().max(0) as u64
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let checksum = Self::md5_base64(&data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(data.len() as i64)
            .content_md5(checksum)
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    /// The body is sent as it is read, with the declared length in the
    /// request. It cannot be replayed, so a failed attempt is not retried.
    async fn put_stream(
        &self,
        key: &str,
        reader: UploadReader,
        content_length: u64,
        content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let frames = ReaderStream::new(reader).map_ok(Frame::data);
        let body = ByteStream::from_body_1_x(StreamBody::new(frames));
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(content_length as i64)
            .set_content_type(content_type.map(str::to_string))
            .body(body)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<ObjectBody>, BoxError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(o) => {
                let size = to_size(o.content_length());
                let last_modified = to_system_time(o.last_modified());
                Ok(Some(ObjectBody {
                    reader: Box::pin(o.body.into_async_read()),
                    size,
                    last_modified,
                }))
            }
            Err(e) if e.as_service_error().is_some_and(|e| e.is_no_such_key()) => Ok(None),
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        match resp {
            Ok(o) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: to_size(o.content_length()),
                last_modified: to_system_time(o.last_modified()),
            })),
            Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(None),
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn copy_object(&self, src: &str, dst: &str) -> Result<(), BoxError> {
        let source = format!("{}/{}", self.bucket, utf8_percent_encode(src, COPY_SOURCE));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(dst)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BoxError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), BoxError> {
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()?;
        let out = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(sdk_err)?;
        if let Some(first) = out.errors().first() {
            return Err(format!(
                "{} of {} keys not deleted, first `{}`: {}",
                out.errors().len(),
                keys.len(),
                first.key().unwrap_or_default(),
                first.message().unwrap_or_default()
            )
            .into());
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, BoxError> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys as i32)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(sdk_err)?;
        let objects = out
            .contents()
            .iter()
            .filter_map(|o| {
                Some(ObjectMeta {
                    key: o.key()?.to_string(),
                    size: to_size(o.size()),
                    last_modified: to_system_time(o.last_modified()),
                })
            })
            .collect();
        let next_continuation = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage {
            objects,
            next_continuation,
        })
    }

    async fn presign(
        &self,
        method: PresignMethod,
        key: &str,
        expires_in: Duration,
        content_length: Option<u64>,
    ) -> Result<String, BoxError> {
        let conf = PresigningConfig::expires_in(expires_in)?;
        let req = match method {
            PresignMethod::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(conf)
                .await
                .map_err(sdk_err)?,
            PresignMethod::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .set_content_length(content_length.map(|n| n as i64))
                .presigned(conf)
                .await
                .map_err(sdk_err)?,
        };
        Ok(req.uri().to_string())
    }
}
