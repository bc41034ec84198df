//! Open file handles. Content lives in memory until `close`, which flushes
//! the whole buffer as a single PUT.

use crate::error::FsError;
use crate::vfs::flags::OpenFlags;
use crate::vfs::fs::Inner;
use crate::vfs::info::FileInfo;
use crate::vfs::path;
use bytes::Bytes;
use std::fmt;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

pub struct File {
    fs: Arc<Inner>,
    name: String,
    key: String,
    flags: OpenFlags,
    perm: u32,
    buffer: Vec<u8>,
    position: u64,
    closed: bool,
}

impl File {
    pub(crate) fn new(
        fs: Arc<Inner>,
        name: String,
        key: String,
        flags: OpenFlags,
        perm: u32,
        buffer: Vec<u8>,
    ) -> Self {
        let position = if flags.contains(OpenFlags::APPEND) {
            buffer.len() as u64
        } else {
            0
        };
        Self {
            fs,
            name,
            key,
            flags,
            perm,
            buffer,
            position,
            closed: false,
        }
    }

    /// Path relative to the filesystem root.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), FsError> {
        if self.closed {
            return Err(FsError::Closed {
                path: self.name.clone(),
            });
        }
        Ok(())
    }

    fn ensure_writable(&self, op: &'static str) -> Result<(), FsError> {
        self.ensure_open()?;
        if !self.flags.is_write_capable() {
            return Err(FsError::invalid(op, format!("{} opened read-only", self.name)));
        }
        Ok(())
    }

    /// Zero-extends the buffer to at least `len` bytes, failing instead of
    /// aborting when the allocation is impossible.
    fn grow(&mut self, op: &'static str, len: usize) -> Result<(), FsError> {
        if len > self.buffer.len() {
            self.buffer
                .try_reserve_exact(len - self.buffer.len())
                .map_err(|e| FsError::invalid(op, e.to_string()))?;
            self.buffer.resize(len, 0);
        }
        Ok(())
    }

    /// Returns `Ok(0)` at end of data.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let n = self.read_at(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Reads without moving the position. A count shorter than `buf` means
    /// the end of data was reached.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        self.ensure_open()?;
        let len = self.buffer.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.buffer.len() - start);
        buf[..n].copy_from_slice(&self.buffer[start..start + n]);
        Ok(n)
    }

    /// Writes at the current position, zero-filling any gap past the end.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        self.ensure_writable("write")?;
        let start = usize::try_from(self.position)
            .map_err(|_| FsError::invalid("write", "position out of range"))?;
        let end = start
            .checked_add(data.len())
            .ok_or_else(|| FsError::invalid("write", "position out of range"))?;
        self.grow("write", end)?;
        self.buffer[start..end].copy_from_slice(data);
        self.position = end as u64;
        Ok(data.len())
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        self.ensure_open()?;
        let (base, offset) = match pos {
            SeekFrom::Start(n) => (0i128, n as i128),
            SeekFrom::Current(n) => (self.position as i128, n as i128),
            SeekFrom::End(n) => (self.buffer.len() as i128, n as i128),
        };
        let target = base + offset;
        if target < 0 {
            return Err(FsError::invalid("seek", "negative position"));
        }
        self.position = u64::try_from(target)
            .map_err(|_| FsError::invalid("seek", "position out of range"))?;
        Ok(self.position)
    }

    /// Shrinks or zero-extends the content to exactly `size` bytes. The
    /// position is left where it was.
    pub fn truncate(&mut self, size: u64) -> Result<(), FsError> {
        self.ensure_writable("truncate")?;
        let size =
            usize::try_from(size).map_err(|_| FsError::invalid("truncate", "size out of range"))?;
        self.grow("truncate", size)?;
        self.buffer.truncate(size);
        Ok(())
    }

    /// Flushes writable handles to the store. A second call fails with
    /// `FsError::Closed`.
    pub async fn close(&mut self) -> Result<(), FsError> {
        self.ensure_open()?;
        self.closed = true;
        let data = Bytes::from(std::mem::take(&mut self.buffer));
        if self.flags.is_write_capable() {
            self.fs.commit(&self.name, &self.key, data).await?;
        }
        Ok(())
    }

    /// No-op: there is no cross-process locking on object storage.
    pub fn lock(&self) -> Result<(), FsError> {
        self.ensure_open()
    }

    pub fn unlock(&self) -> Result<(), FsError> {
        self.ensure_open()
    }

    /// Metadata of the in-memory content.
    pub fn stat(&self) -> Result<FileInfo, FsError> {
        self.ensure_open()?;
        Ok(FileInfo::file(
            path::base_name(&self.name),
            self.buffer.len() as u64,
            self.perm,
            SystemTime::now(),
        ))
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("len", &self.buffer.len())
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if !self.closed && self.flags.is_write_capable() {
            warn!(path = %self.name, "file dropped without close, writes discarded");
        }
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(File::read(self, buf)?)
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(File::write(self, buf)?)
    }

    /// Data only reaches the store on `close`.
    fn flush(&mut self) -> io::Result<()> {
        Ok(self.ensure_open()?)
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(File::seek(self, pos)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::client::ObjectClient;
    use crate::cadapter::localfs::LocalFsBackend;
    use crate::vfs::{BucketFs, Filesystem};
    use std::io::{Read as _, Write as _};

    async fn fixture(content: &[u8]) -> (tempfile::TempDir, BucketFs) {
        let tmp = tempfile::tempdir().unwrap();
        let fs = BucketFs::new(ObjectClient::new(LocalFsBackend::new(tmp.path())), "r");
        let mut f = fs.create("f").await.unwrap();
        f.write(content).unwrap();
        f.close().await.unwrap();
        (tmp, fs)
    }

    #[tokio::test]
    async fn test_truncate_grow_and_shrink() {
        let (_tmp, fs) = fixture(b"abc").await;

        let mut f = fs.open_file("f", OpenFlags::READ_WRITE, 0).await.unwrap();
        f.truncate(10).unwrap();
        let mut buf = [0xffu8; 10];
        assert_eq!(f.read_at(&mut buf, 0).unwrap(), 10);
        assert_eq!(&buf[..3], b"abc");
        assert!(buf[3..].iter().all(|b| *b == 0));
        f.close().await.unwrap();

        let mut f = fs.open_file("f", OpenFlags::READ_WRITE, 0).await.unwrap();
        f.write(b"0123456789").unwrap();
        f.truncate(3).unwrap();
        f.close().await.unwrap();
        let mut f = fs.open("f").await.unwrap();
        let mut out = Vec::new();
        f.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"012");
    }

    #[tokio::test]
    async fn test_read_and_read_at() {
        let (_tmp, fs) = fixture(b"hello world").await;
        let mut f = fs.open("f").await.unwrap();

        let mut buf = [0u8; 5];
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");

        let mut big = [0u8; 8];
        assert_eq!(f.read_at(&mut big, 6).unwrap(), 5);
        assert_eq!(&big[..5], b"world");
        assert_eq!(f.read_at(&mut big, 100).unwrap(), 0);

        // read_at 不移动位置
        assert_eq!(f.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b" worl");
        assert_eq!(f.read(&mut buf).unwrap(), 1);
        assert_eq!(f.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_write_past_end_zero_fills() {
        let (_tmp, fs) = fixture(b"ab").await;
        let mut f = fs.open_file("f", OpenFlags::READ_WRITE, 0).await.unwrap();

        assert_eq!(f.seek(SeekFrom::Start(5)).unwrap(), 5);
        f.write(b"z").unwrap();
        assert_eq!(f.seek(SeekFrom::Current(0)).unwrap(), 6);
        assert_eq!(f.stat().unwrap().size, 6);

        f.seek(SeekFrom::Start(1)).unwrap();
        f.write(b"B").unwrap();
        let mut buf = [9u8; 6];
        f.read_at(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"aB\0\0\0z");

        assert!(matches!(
            f.seek(SeekFrom::End(-7)),
            Err(FsError::InvalidOperation { .. })
        ));
        assert_eq!(f.seek(SeekFrom::End(-1)).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_read_only_handle() {
        let (tmp, fs) = fixture(b"ro").await;
        let mut f = fs.open("f").await.unwrap();

        assert!(matches!(f.write(b"x"), Err(FsError::InvalidOperation { .. })));
        assert!(matches!(f.truncate(0), Err(FsError::InvalidOperation { .. })));
        let err = io::Write::write(&mut f, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        // 只读句柄关闭时不写回后端
        std::fs::remove_file(tmp.path().join("r/f")).unwrap();
        f.close().await.unwrap();
        assert!(!tmp.path().join("r/f").exists());
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_everything() {
        let (_tmp, fs) = fixture(b"x").await;
        let mut f = fs.open_file("f", OpenFlags::READ_WRITE, 0).await.unwrap();
        f.lock().unwrap();
        f.unlock().unwrap();
        f.close().await.unwrap();

        assert!(f.is_closed());
        assert!(matches!(f.close().await, Err(FsError::Closed { .. })));
        assert!(matches!(f.read(&mut [0u8; 1]), Err(FsError::Closed { .. })));
        assert!(matches!(f.write(b"y"), Err(FsError::Closed { .. })));
        assert!(matches!(f.seek(SeekFrom::Start(0)), Err(FsError::Closed { .. })));
        assert!(matches!(f.lock(), Err(FsError::Closed { .. })));
        assert!(matches!(f.unlock(), Err(FsError::Closed { .. })));
        assert!(matches!(f.stat(), Err(FsError::Closed { .. })));
        assert!(f.flush().is_err());
    }

    #[tokio::test]
    async fn test_huge_positions_are_rejected() {
        let (_tmp, fs) = fixture(b"abc").await;
        let mut f = fs.open_file("f", OpenFlags::READ_WRITE, 0).await.unwrap();

        assert_eq!(f.seek(SeekFrom::Start(u64::MAX)).unwrap(), u64::MAX);
        assert!(matches!(f.write(b"x"), Err(FsError::InvalidOperation { .. })));
        f.seek(SeekFrom::Start(isize::MAX as u64)).unwrap();
        assert!(matches!(f.write(b"x"), Err(FsError::InvalidOperation { .. })));
        assert!(matches!(
            f.truncate(u64::MAX),
            Err(FsError::InvalidOperation { .. })
        ));

        // 失败的写入不改变内容
        f.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(f.read_at(&mut buf, 0).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        f.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_reports_default_mode() {
        let (_tmp, fs) = fixture(b"abc").await;
        let f = fs.open("f").await.unwrap();
        assert_eq!(f.stat().unwrap().mode, crate::vfs::info::DEFAULT_FILE_MODE);
        assert_eq!(fs.stat("f").await.unwrap().mode, f.stat().unwrap().mode);

        let f = fs
            .open_file("g", OpenFlags::WRITE_ONLY | OpenFlags::CREATE, 0o600)
            .await
            .unwrap();
        assert_eq!(f.stat().unwrap().mode, 0o600);
        assert!(format!("{f:?}").contains("\"g\""));
    }
}
