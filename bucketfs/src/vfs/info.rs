use std::time::SystemTime;

/// `S_IFDIR | 0755`
pub const DIR_MODE: u32 = 0o40755;
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Metadata synthesized per call from a cache entry or a HEAD/LIST response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
    pub mod_time: SystemTime,
}

impl FileInfo {
    pub fn file(name: impl Into<String>, size: u64, mode: u32, mod_time: SystemTime) -> Self {
        Self {
            name: name.into(),
            size,
            mode,
            is_dir: false,
            mod_time,
        }
    }

    /// Directories only exist implicitly, so they get size 0 and the current time.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mode: DIR_MODE,
            is_dir: true,
            mod_time: SystemTime::now(),
        }
    }
}
