use anyhow::Context;
use bucketfs::config::StorageConfig;
use bucketfs::utils::cli::{Args, Command};
use bucketfs::vfs::Filesystem;
use clap::Parser;
use std::io::{Read, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = StorageConfig::from(&args);
    let client = config.connect().await;
    let repos = config.repo_storage(client.clone());

    match args.command {
        Command::Ls { repo, dir } => {
            let fs = repos.get_filesystem(&config.storage_path(&repo));
            for entry in fs.read_dir(&dir).await? {
                let kind = if entry.is_dir { "d" } else { "-" };
                println!("{kind} {:>10} {}", entry.size, entry.name);
            }
        }
        Command::Cat { repo, path } => {
            let fs = repos.get_filesystem(&config.storage_path(&repo));
            let mut file = fs
                .open(&path)
                .await
                .with_context(|| format!("open {path} in {repo}"))?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            file.close().await?;
            std::io::stdout().write_all(&data)?;
        }
        Command::Du { repo } => {
            let size = repos.repository_size(&config.storage_path(&repo)).await?;
            println!("{size}");
        }
        Command::RmRepo { repo } => {
            let deleted = repos.delete_repository(&config.storage_path(&repo)).await?;
            println!("deleted {deleted} objects");
        }
        Command::LfsUrl {
            oid,
            upload,
            size,
            expires,
        } => {
            let lfs = config.lfs_store(client);
            let expiry = Duration::from_secs(expires);
            let url = match (upload, size) {
                (true, Some(size)) => lfs.generate_upload_url(&oid, size, expiry).await?,
                _ => lfs.generate_download_url(&oid, expiry).await?,
            };
            println!("{} {}", url.method, url.href);
            println!("expires at {}", url.expires_at.to_rfc3339());
        }
    }
    Ok(())
}
