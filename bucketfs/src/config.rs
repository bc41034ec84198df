use crate::cadapter::client::{MAX_LIST_PAGE, ObjectClient};
use crate::cadapter::localfs::LocalFsBackend;
use crate::cadapter::s3::{S3Backend, S3Config};
use crate::lfs::LfsStore;
use crate::repo::RepoStorage;
use crate::vfs::path;
use std::path::PathBuf;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// S3-compatible object storage (AWS, R2, MinIO)
    S3,
    /// A local directory standing in for a bucket
    Local,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: BackendKind,
    pub bucket: String,
    pub local_root: PathBuf,
    pub s3: S3Config,
    /// Prefix under which repository storage paths live.
    pub repo_prefix: String,
    /// Prefix for LFS objects.
    pub lfs_prefix: String,
    pub list_page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            bucket: "git".to_string(),
            local_root: PathBuf::from("/var/lib/bucketfs"),
            s3: S3Config::default(),
            repo_prefix: "repos".to_string(),
            lfs_prefix: "lfs".to_string(),
            list_page_size: MAX_LIST_PAGE,
        }
    }
}

impl StorageConfig {
    pub async fn connect(&self) -> ObjectClient {
        match self.backend {
            BackendKind::S3 => {
                info!(bucket = %self.bucket, endpoint = ?self.s3.endpoint, "using s3 backend");
                ObjectClient::new(S3Backend::new(self.bucket.clone(), self.s3.clone()).await)
            }
            BackendKind::Local => {
                info!(root = %self.local_root.display(), "using local backend");
                ObjectClient::new(LocalFsBackend::new(&self.local_root))
            }
        }
    }

    pub fn repo_storage(&self, client: ObjectClient) -> RepoStorage {
        RepoStorage::with_page_size(client, self.list_page_size)
    }

    pub fn lfs_store(&self, client: ObjectClient) -> LfsStore {
        LfsStore::new(client, &self.lfs_prefix)
    }

    /// Storage path of a repository; always stays below `repo_prefix`.
    pub fn storage_path(&self, repo: &str) -> String {
        path::join(&[&self.repo_prefix, &path::clean(repo)])
    }
}
