use bitflags::bitflags;

bitflags! {
    /// Open flags accepted by `Filesystem::open_file`. Bit values follow Linux
    /// `O_*` so callers can pass through what they already have.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open for reading only (the absence of any access-mode bit).
        const READ_ONLY = 0;
        const WRITE_ONLY = 0o1;
        const READ_WRITE = 0o2;
        /// Create the file if it does not exist.
        const CREATE = 0o100;
        /// With `CREATE`, fail if the file already exists.
        const EXCLUSIVE = 0o200;
        /// Discard existing content on open.
        const TRUNCATE = 0o1000;
        /// Start writing at the end of the existing content.
        const APPEND = 0o2000;
        const SYNC = 0o4010000;
    }
}

impl OpenFlags {
    /// Flags used by `Filesystem::create`.
    pub const CREATE_TRUNCATE: Self = Self::READ_WRITE
        .union(Self::CREATE)
        .union(Self::TRUNCATE);

    pub fn requests_read(self) -> bool {
        !self.contains(Self::WRITE_ONLY)
    }

    /// Any flag that lets the handle modify content.
    pub fn is_write_capable(self) -> bool {
        self.intersects(
            Self::WRITE_ONLY | Self::READ_WRITE | Self::APPEND | Self::CREATE | Self::TRUNCATE,
        )
    }

    /// Whether the existing content has to be fetched before the handle is
    /// usable. Appending keeps the existing bytes even on a write-only handle,
    /// otherwise the flush on close would drop them.
    pub fn loads_content(self) -> bool {
        !self.contains(Self::TRUNCATE) && (self.requests_read() || self.contains(Self::APPEND))
    }
}

bitflags! {
    /// Feature set advertised by a filesystem.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const WRITE = 1;
        const READ = 1 << 1;
        const READ_AND_WRITE = 1 << 2;
        const SEEK = 1 << 3;
        const TRUNCATE = 1 << 4;
        const LOCK = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_flag_classes() {
        assert!(OpenFlags::READ_ONLY.requests_read());
        assert!(!OpenFlags::READ_ONLY.is_write_capable());
        assert!(OpenFlags::READ_ONLY.loads_content());

        assert!(!OpenFlags::WRITE_ONLY.requests_read());
        assert!(!OpenFlags::WRITE_ONLY.loads_content());
        assert!((OpenFlags::WRITE_ONLY | OpenFlags::APPEND).loads_content());

        assert!(OpenFlags::CREATE_TRUNCATE.is_write_capable());
        assert!(!OpenFlags::CREATE_TRUNCATE.loads_content());
        assert!((OpenFlags::READ_WRITE | OpenFlags::CREATE).loads_content());
    }
}
