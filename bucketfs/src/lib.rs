//! BucketFS: Git repository storage on S3-compatible object stores.
//!
//! - `vfs`: a hierarchical filesystem view over one bucket prefix, consumed
//!   by the Git protocol engine through the `Filesystem` trait.
//! - `repo`: repository lifecycle (filesystem per repo, delete, size).
//! - `lfs`: content-addressed LFS objects with presigned URLs.
//! - `cadapter`: the object store adapters underneath.

pub mod cadapter;
pub mod config;
pub mod error;
pub mod lfs;
pub mod repo;
pub mod utils;
pub mod vfs;

pub use error::{BackendError, FsError, LfsError, RepoError};
pub use vfs::{BucketFs, Filesystem};
