//! `BucketFs`：把对象存储中的一个前缀当作层次文件系统使用。
//!
//! Directories are never stored; a directory exists while at least one key
//! lives below it.

use crate::cadapter::client::{MAX_LIST_PAGE, ObjectClient};
use crate::error::FsError;
use crate::vfs::file::File;
use crate::vfs::flags::{Capabilities, OpenFlags};
use crate::vfs::info::{DEFAULT_FILE_MODE, FileInfo};
use crate::vfs::path::{self, SEPARATOR};
use crate::vfs::Filesystem;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

#[derive(Clone)]
struct CacheEntry {
    data: Bytes,
    mod_time: SystemTime,
}

/// State shared by a filesystem and the handles it opened.
pub(crate) struct Inner {
    client: ObjectClient,
    prefix: String,
    list_page_size: usize,
    /// Relative path -> last known content. Never shared across instances.
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl Inner {
    fn key_for(&self, rel: &str) -> String {
        format!("{}{}", self.prefix, rel)
    }

    /// Flushes a write session: cache first, then one whole-object PUT.
    pub(crate) async fn commit(&self, rel: &str, key: &str, data: Bytes) -> Result<(), FsError> {
        debug!(path = rel, len = data.len(), "flush file");
        self.cache.write().insert(
            rel.to_string(),
            CacheEntry {
                data: data.clone(),
                mod_time: SystemTime::now(),
            },
        );
        self.client.put_object(key, data, None).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct BucketFs {
    inner: Arc<Inner>,
}

impl BucketFs {
    pub fn new(client: ObjectClient, prefix: &str) -> Self {
        Self::with_page_size(client, prefix, MAX_LIST_PAGE)
    }

    pub fn with_page_size(client: ObjectClient, prefix: &str, list_page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                prefix: path::normalize_prefix(prefix),
                list_page_size: list_page_size.clamp(1, MAX_LIST_PAGE),
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Cleaned relative path and full object key.
    fn resolve(&self, p: &str) -> (String, String) {
        let rel = path::clean(p);
        let key = self.inner.key_for(&rel);
        (rel, key)
    }

    fn cached(&self, rel: &str) -> Option<CacheEntry> {
        self.inner.cache.read().get(rel).cloned()
    }

    async fn exists(&self, rel: &str, key: &str) -> Result<bool, FsError> {
        if self.inner.cache.read().contains_key(rel) {
            return Ok(true);
        }
        Ok(self.inner.client.head_object(key).await?.is_some())
    }

    async fn load(&self, rel: &str, key: &str, flags: OpenFlags) -> Result<Vec<u8>, FsError> {
        if let Some(entry) = self.cached(rel) {
            return Ok(entry.data.to_vec());
        }
        match self.inner.client.get_bytes(key).await? {
            Some((data, last_modified)) => {
                self.inner.cache.write().insert(
                    rel.to_string(),
                    CacheEntry {
                        data: Bytes::copy_from_slice(&data),
                        mod_time: last_modified.unwrap_or_else(SystemTime::now),
                    },
                );
                Ok(data)
            }
            None if flags.contains(OpenFlags::CREATE) => Ok(Vec::new()),
            None => Err(FsError::not_found("open", rel)),
        }
    }
}

#[async_trait]
impl Filesystem for BucketFs {
    type File = File;

    async fn create(&self, path: &str) -> Result<File, FsError> {
        self.open_file(path, OpenFlags::CREATE_TRUNCATE, DEFAULT_FILE_MODE)
            .await
    }

    async fn open(&self, path: &str) -> Result<File, FsError> {
        self.open_file(path, OpenFlags::READ_ONLY, 0).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> Result<File, FsError> {
        let (rel, key) = self.resolve(path);
        if rel.is_empty() {
            return Err(FsError::invalid("open", "cannot open the root directory"));
        }
        if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) && self.exists(&rel, &key).await?
        {
            return Err(FsError::AlreadyExists {
                op: "open",
                path: rel,
            });
        }
        let buffer = if flags.loads_content() {
            self.load(&rel, &key, flags).await?
        } else {
            Vec::new()
        };
        let perm = if perm == 0 { DEFAULT_FILE_MODE } else { perm };
        debug!(path = %rel, ?flags, len = buffer.len(), "open file");
        Ok(File::new(self.inner.clone(), rel, key, flags, perm, buffer))
    }

    async fn stat(&self, path: &str) -> Result<FileInfo, FsError> {
        let (rel, key) = self.resolve(path);
        let name = path::base_name(&rel).to_string();
        if rel.is_empty() {
            return Ok(FileInfo::dir(name));
        }
        if let Some(entry) = self.cached(&rel) {
            return Ok(FileInfo::file(
                name,
                entry.data.len() as u64,
                DEFAULT_FILE_MODE,
                entry.mod_time,
            ));
        }
        let dir_prefix = format!("{key}{SEPARATOR}");
        let page = self.inner.client.list_objects(&dir_prefix, None, 1).await?;
        if !page.objects.is_empty() {
            return Ok(FileInfo::dir(name));
        }
        match self.inner.client.head_object(&key).await? {
            Some(meta) => Ok(FileInfo::file(
                name,
                meta.size,
                DEFAULT_FILE_MODE,
                meta.last_modified.unwrap_or_else(SystemTime::now),
            )),
            None => Err(FsError::not_found("stat", rel)),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let (from_rel, from_key) = self.resolve(from);
        let (to_rel, to_key) = self.resolve(to);
        if from_rel == to_rel {
            return Ok(());
        }
        self.inner.client.copy_object(&from_key, &to_key).await?;
        if let Err(e) = self.inner.client.delete_object(&from_key).await {
            warn!(from = %from_rel, to = %to_rel, "rename left the source behind: {e}");
            self.inner.cache.write().remove(&to_rel);
            return Err(e.into());
        }
        let mut cache = self.inner.cache.write();
        cache.remove(&to_rel);
        if let Some(entry) = cache.remove(&from_rel) {
            cache.insert(to_rel, entry);
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), FsError> {
        let (rel, key) = self.resolve(path);
        self.inner.client.delete_object(&key).await?;
        self.inner.cache.write().remove(&rel);
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>, FsError> {
        let (rel, key) = self.resolve(path);
        let list_prefix = if rel.is_empty() {
            key
        } else {
            format!("{key}{SEPARATOR}")
        };
        let objects = self
            .inner
            .client
            .list_all(&list_prefix, self.inner.list_page_size)
            .await?;

        let mut entries: BTreeMap<String, FileInfo> = BTreeMap::new();
        for obj in objects {
            let Some(rest) = obj.key.strip_prefix(&list_prefix) else {
                continue;
            };
            match rest.split_once(SEPARATOR) {
                None if rest.is_empty() => {}
                None => {
                    entries.entry(rest.to_string()).or_insert_with(|| {
                        FileInfo::file(
                            rest,
                            obj.size,
                            DEFAULT_FILE_MODE,
                            obj.last_modified.unwrap_or_else(SystemTime::now),
                        )
                    });
                }
                Some((dir, _)) => {
                    entries
                        .entry(dir.to_string())
                        .or_insert_with(|| FileInfo::dir(dir));
                }
            }
        }
        Ok(entries.into_values().collect())
    }

    async fn mkdir_all(&self, path: &str, _perm: u32) -> Result<(), FsError> {
        debug!(path, "mkdir_all is a no-op on object storage");
        Ok(())
    }

    async fn temp_file(&self, dir: &str, prefix: &str) -> Result<File, FsError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let name = path::join(&[dir, &format!("{prefix}{nanos}")]);
        self.create(&name).await
    }

    fn chroot(&self, path: &str) -> Result<Self, FsError> {
        let sub = path::clean(path);
        let prefix = format!("{}{}", self.inner.prefix, sub);
        Ok(Self::with_page_size(
            self.inner.client.clone(),
            &prefix,
            self.inner.list_page_size,
        ))
    }

    async fn symlink(&self, _target: &str, _link: &str) -> Result<(), FsError> {
        Err(FsError::Unsupported { op: "symlink" })
    }

    async fn readlink(&self, _link: &str) -> Result<String, FsError> {
        Err(FsError::Unsupported { op: "readlink" })
    }

    fn root(&self) -> &str {
        &self.inner.prefix
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WRITE
            | Capabilities::READ
            | Capabilities::READ_AND_WRITE
            | Capabilities::SEEK
            | Capabilities::TRUNCATE
    }
}
