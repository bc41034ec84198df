//! Object store adapter (cAdapter)
//!
//! Submodules:
//! - `client`: `ObjectBackend` trait and the `ObjectClient` handle used by the
//!   filesystem, repository and LFS layers
//! - `localfs`: directory-backed mock store for tests and development
//! - `s3`: S3-compatible adapter (AWS, R2, MinIO) on top of `aws-sdk-s3`
//!
//! Responsibilities summary:
//! - Provide an async API for put/get/head/copy/delete/list/presign of objects.
//! - Translate each backend's "no such key" into `None` so callers can tell
//!   a missing object apart from a failed request.
pub mod client;
pub mod localfs;
pub mod s3;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{
    ListPage, ObjectBackend, ObjectBody, ObjectClient, ObjectMeta, ObjectReader, PresignMethod,
    UploadReader,
};
