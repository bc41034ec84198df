use crate::cadapter::client::MAX_LIST_PAGE;
use crate::cadapter::s3::S3Config;
use crate::config::{BackendKind, StorageConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Storage backend type
    #[arg(long, env = "BUCKETFS_BACKEND", value_enum, default_value = "s3")]
    pub backend: BackendKind,

    /// Bucket holding repositories and LFS objects
    #[arg(long, env = "BUCKETFS_BUCKET", default_value = "git")]
    pub bucket: String,

    /// Custom S3 endpoint, e.g. an R2 or MinIO URL
    #[arg(long, env = "BUCKETFS_S3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// S3 region
    #[arg(long, env = "BUCKETFS_S3_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Use path-style bucket addressing
    #[arg(long, env = "BUCKETFS_S3_PATH_STYLE", default_value_t = false)]
    pub path_style: bool,

    /// Retries performed by the S3 client
    #[arg(long, env = "BUCKETFS_S3_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "BUCKETFS_S3_TIMEOUT", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Directory used by the local backend
    #[arg(long, env = "BUCKETFS_LOCAL_ROOT", default_value = "/var/lib/bucketfs")]
    pub root: PathBuf,

    /// Prefix of repository storage paths
    #[arg(long, env = "BUCKETFS_REPO_PREFIX", default_value = "repos")]
    pub repo_prefix: String,

    /// Prefix of LFS objects
    #[arg(long, env = "BUCKETFS_LFS_PREFIX", default_value = "lfs")]
    pub lfs_prefix: String,

    /// Keys requested per list call (at most 1000)
    #[arg(long, env = "BUCKETFS_LIST_PAGE_SIZE", default_value_t = MAX_LIST_PAGE)]
    pub page_size: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a directory of a repository
    Ls {
        repo: String,
        #[arg(default_value = "/")]
        dir: String,
    },
    /// Print a file of a repository to stdout
    Cat { repo: String, path: String },
    /// Print the total size of a repository in bytes
    Du { repo: String },
    /// Delete every object of a repository
    RmRepo { repo: String },
    /// Issue a presigned URL for an LFS object
    LfsUrl {
        oid: String,
        /// Issue an upload URL instead of a download URL
        #[arg(long, requires = "size")]
        upload: bool,
        /// Declared object size, required for uploads
        #[arg(long)]
        size: Option<u64>,
        /// URL lifetime in seconds
        #[arg(long, default_value_t = 900)]
        expires: u64,
    },
}

impl From<&Args> for StorageConfig {
    fn from(args: &Args) -> Self {
        Self {
            backend: args.backend,
            bucket: args.bucket.clone(),
            local_root: args.root.clone(),
            s3: S3Config {
                endpoint: args.endpoint.clone(),
                region: args.region.clone(),
                force_path_style: args.path_style,
                max_retries: args.max_retries,
                timeout: Duration::from_secs(args.timeout_secs),
            },
            repo_prefix: args.repo_prefix.clone(),
            lfs_prefix: args.lfs_prefix.clone(),
            list_page_size: args.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_into_config() {
        let args = Args::try_parse_from([
            "bucketfs",
            "--backend",
            "local",
            "--root",
            "/tmp/store",
            "--endpoint",
            "http://127.0.0.1:9000",
            "du",
            "alice/repo.git",
        ])
        .unwrap();
        let config = StorageConfig::from(&args);
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.local_root, PathBuf::from("/tmp/store"));
        assert_eq!(config.s3.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
        assert!(matches!(args.command, Command::Du { ref repo } if repo == "alice/repo.git"));
    }

    #[test]
    fn test_upload_url_requires_size() {
        assert!(Args::try_parse_from(["bucketfs", "lfs-url", "abc", "--upload"]).is_err());
    }
}
