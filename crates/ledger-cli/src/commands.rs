use anyhow::{anyhow, Result};
use clap::Args;
use ledger_core::{Ledger, LocalDirWriter};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct FilesOptions {
    /// Project ID
    #[arg(value_name = "PROJECT")]
    pub project: String,
}

#[derive(Args)]
pub struct HistoryOptions {
    /// Project ID
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Sandbox path of the file
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Args)]
pub struct ShowOptions {
    /// Project ID
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Sandbox path of the file
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version to print instead of the latest
    #[arg(long)]
    pub version: Option<i64>,
}

#[derive(Args)]
pub struct DiffOptions {
    /// Project ID
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Sandbox path of the file
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version whose diff from its predecessor is printed
    #[arg(long)]
    pub version: i64,
}

#[derive(Args)]
pub struct RestoreOptions {
    /// Project ID
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Directory that receives the restored files
    #[arg(long, value_name = "DIR")]
    pub into: PathBuf,
}

pub async fn list_files(ledger: &Ledger, opts: FilesOptions) -> Result<()> {
    let latest = ledger.files().list_latest_per_path(&opts.project).await?;
    if latest.is_empty() {
        println!("No tracked files for project {}", opts.project);
        return Ok(());
    }

    for file in latest {
        println!(
            "{}\tv{}\t{} bytes\t{}",
            file.file_path, file.version, file.size_bytes, file.created_by_tool
        );
    }
    Ok(())
}

pub async fn history(ledger: &Ledger, opts: HistoryOptions) -> Result<()> {
    let versions = ledger.files().list_versions(&opts.project, &opts.path).await?;
    if versions.is_empty() {
        return Err(anyhow!("{} is not tracked in project {}", opts.path, opts.project));
    }

    for v in versions {
        println!(
            "v{}\t{}\t{} bytes\t{}",
            v.version, v.created_at, v.size_bytes, v.created_by_tool
        );
    }
    Ok(())
}

pub async fn show(ledger: &Ledger, opts: ShowOptions) -> Result<()> {
    let record = match opts.version {
        Some(version) => {
            ledger
                .files()
                .get_version(&opts.project, &opts.path, version)
                .await?
        }
        None => ledger.files().get_latest(&opts.project, &opts.path).await?,
    };
    let record = record.ok_or_else(|| match opts.version {
        Some(version) => anyhow!("{} has no version {}", opts.path, version),
        None => anyhow!("{} is not tracked in project {}", opts.path, opts.project),
    })?;

    print!("{}", record.content);
    Ok(())
}

pub async fn diff(ledger: &Ledger, opts: DiffOptions) -> Result<()> {
    let record = ledger
        .files()
        .get_version(&opts.project, &opts.path, opts.version)
        .await?
        .ok_or_else(|| anyhow!("{} has no version {}", opts.path, opts.version))?;

    match record.diff_from_previous {
        Some(diff) => print!("{}", diff),
        None => println!("{} v{} is the first version", opts.path, opts.version),
    }
    Ok(())
}

pub async fn restore(ledger: &Ledger, opts: RestoreOptions) -> Result<()> {
    info!("Restoring project {} into {}", opts.project, opts.into.display());
    let writer = LocalDirWriter::new(&opts.into);
    let restored = ledger.restore_project(&opts.project, &writer).await?;
    println!("{}", serde_json::to_string_pretty(&restored)?);
    Ok(())
}
