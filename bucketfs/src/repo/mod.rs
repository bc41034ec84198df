//! Repository storage: repo-level operations over a storage prefix.
//!
//! Repositories are plain prefixes in the shared bucket. Deleting one is a
//! paginated list + batched delete and is not transactional: a failure part
//! way through leaves the remaining objects in place.

use crate::cadapter::client::{MAX_LIST_PAGE, ObjectClient};
use crate::error::RepoError;
use crate::vfs::BucketFs;
use crate::vfs::path;
use tracing::{debug, info};

#[derive(Clone)]
pub struct RepoStorage {
    client: ObjectClient,
    page_size: usize,
}

impl RepoStorage {
    pub fn new(client: ObjectClient) -> Self {
        Self::with_page_size(client, MAX_LIST_PAGE)
    }

    pub fn with_page_size(client: ObjectClient, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.clamp(1, MAX_LIST_PAGE),
        }
    }

    /// Filesystem rooted at `storage_path`. Makes no network call.
    pub fn get_filesystem(&self, storage_path: &str) -> BucketFs {
        BucketFs::with_page_size(self.client.clone(), storage_path, self.page_size)
    }

    fn repo_prefix(storage_path: &str) -> Result<String, RepoError> {
        let prefix = path::normalize_prefix(storage_path);
        if prefix.is_empty() {
            return Err(RepoError::InvalidPath(storage_path.to_string()));
        }
        Ok(prefix)
    }

    /// Deletes every object under the repository prefix and returns how many
    /// were removed.
    pub async fn delete_repository(&self, storage_path: &str) -> Result<usize, RepoError> {
        let prefix = Self::repo_prefix(storage_path)?;
        let batch = self.client.max_delete_batch();
        let mut deleted = 0usize;
        let mut token = None;
        loop {
            let page = self
                .client
                .list_objects(&prefix, token, self.page_size)
                .await
                .map_err(|source| RepoError::PartialDelete { deleted, source })?;
            let keys: Vec<String> = page.objects.into_iter().map(|o| o.key).collect();
            for chunk in keys.chunks(batch) {
                self.client
                    .delete_objects(chunk)
                    .await
                    .map_err(|source| RepoError::PartialDelete { deleted, source })?;
                deleted += chunk.len();
                debug!(prefix = %prefix, deleted, "deleted batch");
            }
            token = page.next_continuation;
            if token.is_none() {
                break;
            }
        }
        info!(prefix = %prefix, deleted, "repository deleted");
        Ok(deleted)
    }

    /// Total bytes stored under the prefix; 0 when nothing is there.
    pub async fn repository_size(&self, storage_path: &str) -> Result<u64, RepoError> {
        let prefix = Self::repo_prefix(storage_path)?;
        let objects = self.client.list_all(&prefix, self.page_size).await?;
        Ok(objects.iter().map(|o| o.size).sum())
    }

    pub async fn repository_exists(&self, storage_path: &str) -> Result<bool, RepoError> {
        let prefix = Self::repo_prefix(storage_path)?;
        let page = self.client.list_objects(&prefix, None, 1).await?;
        Ok(!page.objects.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::localfs::LocalFsBackend;
    use crate::cadapter::testing::FaultyBackend;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded(
        count: usize,
        fail_on_batch: Option<usize>,
    ) -> (tempfile::TempDir, RepoStorage, Arc<AtomicUsize>) {
        let tmp = tempfile::tempdir().unwrap();
        let mut backend = FaultyBackend::new(tmp.path());
        if let Some(n) = fail_on_batch {
            backend = backend.failing_batch(n);
        }
        let batch_deletes = backend.batch_deletes.clone();
        let client = ObjectClient::new(backend);
        for i in 0..count {
            client
                .put_object(
                    &format!("repos/big/objects/{:02x}/{i:06}", i % 256),
                    Bytes::from_static(b"xy"),
                    None,
                )
                .await
                .unwrap();
        }
        client
            .put_object("repos/bigger/HEAD", Bytes::from_static(b"keep"), None)
            .await
            .unwrap();
        (tmp, RepoStorage::new(client), batch_deletes)
    }

    #[tokio::test]
    async fn test_delete_repository_in_batches() {
        let (_tmp, repos, batch_deletes) = seeded(2500, None).await;

        assert_eq!(repos.repository_size("repos/big").await.unwrap(), 5000);
        let deleted = repos.delete_repository("repos/big").await.unwrap();
        assert_eq!(deleted, 2500);
        assert!(batch_deletes.load(Ordering::SeqCst) >= 3);

        assert_eq!(repos.repository_size("repos/big").await.unwrap(), 0);
        assert!(!repos.repository_exists("repos/big").await.unwrap());
        // 相同前缀但不同仓库的对象不受影响
        assert!(repos.repository_exists("repos/bigger").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_repository_surfaces_partial_failure() {
        let (_tmp, repos, _) = seeded(25, Some(2)).await;
        let repos = RepoStorage::with_page_size(repos.client.clone(), 10);

        let err = repos.delete_repository("repos/big").await.unwrap_err();
        match err {
            RepoError::PartialDelete { deleted, .. } => assert_eq!(deleted, 10),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(repos.repository_size("repos/big").await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_empty_and_root_prefixes() {
        let tmp = tempfile::tempdir().unwrap();
        let repos = RepoStorage::new(ObjectClient::new(LocalFsBackend::new(tmp.path())));

        assert_eq!(repos.repository_size("repos/none").await.unwrap(), 0);
        assert_eq!(repos.delete_repository("repos/none").await.unwrap(), 0);
        assert!(matches!(
            repos.delete_repository("/").await,
            Err(RepoError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_get_filesystem_is_rooted_at_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let repos = RepoStorage::new(ObjectClient::new(LocalFsBackend::new(tmp.path())));
        let fs = repos.get_filesystem("repos/r2");
        assert_eq!(crate::vfs::Filesystem::root(&fs), "repos/r2/");
    }
}
