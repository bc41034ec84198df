//! Local directory backend, used as a mock object store (implements ObjectBackend).
//!
//! Every key maps to one file under `root`; `/` in keys becomes a directory
//! level. Listing walks the tree and orders keys the way S3 does.

use crate::cadapter::client::{
    ListPage, ObjectBackend, ObjectBody, ObjectMeta, PresignMethod, UploadReader,
};
use crate::error::BoxError;
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::{fs, io::AsyncWriteExt};

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    /// Deepest existing directory that can hold keys starting with `prefix`.
    fn walk_start(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        }
    }

    async fn keys_under(&self, prefix: &str) -> Result<Vec<ObjectMeta>, BoxError> {
        let mut out = Vec::new();
        let mut stack = vec![self.walk_start(prefix)];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    continue;
                }
                Err(e) => return Err(Box::new(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                let path = entry.path();
                if meta.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if key.starts_with(prefix) {
                    out.push(ObjectMeta {
                        key,
                        size: meta.len(),
                        last_modified: meta.modified().ok(),
                    });
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        _content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut f = fs::File::create(path).await?;
        f.write_all(&data).await?;
        f.flush().await?;
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        mut reader: UploadReader,
        content_length: u64,
        _content_type: Option<&str>,
    ) -> Result<(), BoxError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        // Staged next to the target so the final rename stays on one filesystem.
        let mut staged = path.clone().into_os_string();
        staged.push(format!(".{}.part", uuid::Uuid::new_v4()));
        let staged = PathBuf::from(staged);

        let written = async {
            let mut f = fs::File::create(&staged).await?;
            let n = tokio::io::copy(&mut reader, &mut f).await?;
            f.flush().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;
        let result = match written {
            Ok(n) if n == content_length => fs::rename(&staged, &path).await.map_err(BoxError::from),
            Ok(n) => Err(format!("stream yielded {n} bytes, expected {content_length}").into()),
            Err(e) => Err(e.into()),
        };
        if result.is_err() {
            let _ = fs::remove_file(&staged).await;
        }
        result
    }

    async fn get_object(&self, key: &str) -> Result<Option<ObjectBody>, BoxError> {
        let path = self.path_for(key);
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Box::new(e)),
        };
        let meta = file.metadata().await?;
        if meta.is_dir() {
            return Ok(None);
        }
        Ok(Some(ObjectBody {
            reader: Box::pin(file),
            size: meta.len(),
            last_modified: meta.modified().ok(),
        }))
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, BoxError> {
        match fs::metadata(self.path_for(key)).await {
            Ok(meta) if meta.is_dir() => Ok(None),
            Ok(meta) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: meta.len(),
                last_modified: meta.modified().ok(),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn copy_object(&self, src: &str, dst: &str) -> Result<(), BoxError> {
        let to = self.path_for(dst);
        if let Some(dir) = to.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::copy(self.path_for(src), to).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), BoxError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Box::new(e)),
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), BoxError> {
        for key in keys {
            self.delete_object(key).await?;
        }
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        continuation: Option<String>,
        max_keys: usize,
    ) -> Result<ListPage, BoxError> {
        // The continuation token is the last key of the previous page.
        let mut remaining = self
            .keys_under(prefix)
            .await?
            .into_iter()
            .filter(|o| continuation.as_deref().is_none_or(|after| o.key.as_str() > after))
            .peekable();
        let objects: Vec<_> = remaining.by_ref().take(max_keys).collect();
        let next_continuation = match (remaining.peek(), objects.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
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
        _content_length: Option<u64>,
    ) -> Result<String, BoxError> {
        let expires = expires_in.as_secs();
        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(key.as_bytes());
        hasher.update(expires.to_be_bytes());
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let signature = hex::encode(hasher.finalize());
        Ok(format!(
            "file://{}?X-Amz-Expires={expires}&X-Amz-Signature={signature}",
            self.path_for(key).display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(keys: &[&str]) -> (tempfile::TempDir, LocalFsBackend) {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        for key in keys {
            backend
                .put_object(key, Bytes::from(key.to_string()), None)
                .await
                .unwrap();
        }
        (tmp, backend)
    }

    #[tokio::test]
    async fn test_localfs_put_get_head() {
        let (_tmp, backend) = seeded(&["repos/a/HEAD"]).await;

        let meta = backend.head_object("repos/a/HEAD").await.unwrap().unwrap();
        assert_eq!(meta.size, "repos/a/HEAD".len() as u64);
        assert!(backend.head_object("repos/a").await.unwrap().is_none());
        assert!(backend.get_object("repos/missing").await.unwrap().is_none());
        backend.delete_object("repos/missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_localfs_put_stream() {
        let (tmp, backend) = seeded(&[]).await;

        let body = std::io::Cursor::new(b"streamed".to_vec());
        backend
            .put_stream("lfs/abc", Box::pin(body), 8, None)
            .await
            .unwrap();
        assert_eq!(std::fs::read(tmp.path().join("lfs/abc")).unwrap(), b"streamed");

        // 长度不符时不留下任何对象
        let body = std::io::Cursor::new(b"short".to_vec());
        assert!(backend.put_stream("lfs/def", Box::pin(body), 8, None).await.is_err());
        assert!(backend.head_object("lfs/def").await.unwrap().is_none());
        let listed = backend.list_objects("lfs/", None, 10).await.unwrap();
        assert_eq!(listed.objects.len(), 1);
    }

    #[tokio::test]
    async fn test_localfs_list_pages_in_key_order() {
        let (_tmp, backend) = seeded(&["p/c", "p/a", "p/b/x", "p/b/y", "q/z", "pz"]).await;

        let first = backend.list_objects("p/", None, 2).await.unwrap();
        let keys: Vec<_> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["p/a", "p/b/x"]);
        assert_eq!(first.next_continuation.as_deref(), Some("p/b/x"));

        let second = backend
            .list_objects("p/", first.next_continuation, 2)
            .await
            .unwrap();
        let keys: Vec<_> = second.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["p/b/y", "p/c"]);
        assert!(second.next_continuation.is_none());

        let none = backend.list_objects("nothing/", None, 10).await.unwrap();
        assert!(none.objects.is_empty());
    }
}
