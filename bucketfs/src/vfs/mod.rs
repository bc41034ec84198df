//! VFS layer (virtual filesystem)
//!
//! Responsibilities:
//! - Present a bucket prefix as a hierarchical filesystem to the Git engine:
//!   create/open/stat/rename/remove/readdir/chroot on relative paths.
//! - Buffer every open file fully in memory and flush it as one PUT on close,
//!   since the object store has no partial writes.
//! - Keep a per-instance cache of closed files so reads after writes within
//!   one instance never depend on store consistency.
//!
//! Nothing here locks across instances or processes; callers serialize
//! access per repository.
//!
//! Submodules:
//! - `fs`: `BucketFs`, the `Filesystem` implementation over an `ObjectClient`
//! - `file`: open file handles
//! - `flags`: open flags and capabilities
//! - `info`: stat results
//! - `path`: lexical path cleaning and key construction
pub mod file;
pub mod flags;
pub mod fs;
pub mod info;
pub mod path;

pub use file::File;
pub use flags::{Capabilities, OpenFlags};
pub use fs::BucketFs;
pub use info::FileInfo;

use crate::error::FsError;
use async_trait::async_trait;

/// Filesystem contract consumed by the Git engine.
///
/// All paths are relative to the filesystem root; leading separators and
/// `..` segments are cleaned away before they reach the backend.
#[async_trait]
pub trait Filesystem: Send + Sync {
    type File: Send;

    /// Opens with `OpenFlags::CREATE_TRUNCATE`.
    async fn create(&self, path: &str) -> Result<Self::File, FsError>;

    /// Read-only open; fails with `FsError::NotFound` for a missing file.
    async fn open(&self, path: &str) -> Result<Self::File, FsError>;

    async fn open_file(
        &self,
        path: &str,
        flags: OpenFlags,
        perm: u32,
    ) -> Result<Self::File, FsError>;

    async fn stat(&self, path: &str) -> Result<FileInfo, FsError>;

    /// There are no symlinks, so this is `stat`.
    async fn lstat(&self, path: &str) -> Result<FileInfo, FsError> {
        self.stat(path).await
    }

    /// Not atomic: a failure can leave both paths present.
    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Removing a missing path is not an error.
    async fn remove(&self, path: &str) -> Result<(), FsError>;

    /// Entries sorted by name.
    async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>, FsError>;

    async fn mkdir_all(&self, path: &str, perm: u32) -> Result<(), FsError>;

    async fn temp_file(&self, dir: &str, prefix: &str) -> Result<Self::File, FsError>;

    /// A filesystem rooted at `path` below this one.
    fn chroot(&self, path: &str) -> Result<Self, FsError>
    where
        Self: Sized;

    async fn symlink(&self, target: &str, link: &str) -> Result<(), FsError>;

    async fn readlink(&self, link: &str) -> Result<String, FsError>;

    fn join(&self, parts: &[&str]) -> String {
        path::join(parts)
    }

    /// Storage prefix this filesystem is rooted at.
    fn root(&self) -> &str;

    fn capabilities(&self) -> Capabilities;
}
