//! Client-side commands: each one builds a [`DriveSession`] over HTTP and
//! prints a plain-text result.

use crate::{
    client::{
        Gateway, GatewayClient,
        browser::{file_name, format_file_size},
        session::DriveSession,
        upload::{LocalFile, UploadMode, UploadTask},
    },
    config::{ClientCommand, ClientConfig, UploadArgs},
};
use anyhow::{Context, Result, bail};
use std::{path::PathBuf, sync::Arc};

pub struct Commands {
    client: GatewayClient,
    session: DriveSession,
}

impl Commands {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let client = GatewayClient::from_config(cfg)?;
        let session = DriveSession::new(Arc::new(client.clone()) as Arc<dyn Gateway>);
        Ok(Self { client, session })
    }

    pub async fn run(&self, command: ClientCommand) -> Result<()> {
        match command {
            ClientCommand::Ls { prefix } => self.ls(prefix).await,
            ClientCommand::Du { prefixes } => self.du(prefixes).await,
            ClientCommand::Upload(args) => self.upload(args).await,
            ClientCommand::Rm { key } => self.rm(&key).await,
            ClientCommand::Mkdir { name, parent } => self.mkdir(&name, &parent).await,
            ClientCommand::Download { key, output } => self.download(&key, output).await,
        }
    }

    pub async fn ls(&self, prefix: Option<String>) -> Result<()> {
        let prefix = normalize_prefix(prefix.as_deref().unwrap_or(""));
        let view = self
            .session
            .browse(&prefix)
            .await
            .with_context(|| format!("listing `{}`", prefix))?;

        let path = view
            .breadcrumbs
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ");
        println!("{}", path);

        if view.is_empty() {
            println!("  (empty)");
        }
        for folder in &view.folders {
            println!("  {:>10}  {}/", "-", folder.name);
        }
        for file in &view.files {
            println!(
                "  {:>10}  {}  {}{}",
                format_file_size(file.size),
                file.last_modified.format("%Y-%m-%d %H:%M"),
                file.name,
                if file.viewable { "" } else { "  [download only]" }
            );
        }
        Ok(())
    }

    pub async fn du(&self, prefixes: Vec<String>) -> Result<()> {
        let prefixes: Vec<String> = if prefixes.is_empty() {
            vec![String::new()]
        } else {
            prefixes.iter().map(|p| normalize_prefix(p)).collect()
        };

        let mut incomplete = false;
        for (prefix, size) in self.session.folder_sizes(&prefixes).await {
            let label = if prefix.is_empty() { "/" } else { prefix.as_str() };
            if size.is_complete() {
                println!("{:>10}  {}", format_file_size(size.bytes), label);
            } else {
                incomplete = true;
                println!(
                    "{:>10}  {}  (incomplete, unreadable: {})",
                    format!(">= {}", format_file_size(size.bytes)),
                    label,
                    size.unreadable.join(", ")
                );
            }
        }
        if incomplete {
            bail!("some folders could not be read");
        }
        Ok(())
    }

    pub async fn upload(&self, args: UploadArgs) -> Result<()> {
        let prefix = normalize_prefix(&args.prefix);
        let mut tasks = Vec::with_capacity(args.files.len());
        for path in &args.files {
            tasks.push(UploadTask::new(LocalFile::from_path(path).await?, &prefix));
        }

        let mode = if args.concurrent {
            UploadMode::concurrent(args.batch_size)
        } else {
            UploadMode::Sequential
        };
        let progress = |done: usize, total: usize| eprintln!("[{}/{}] uploaded", done, total);
        let results = self.session.upload(tasks, mode, Some(&progress)).await;

        let mut failed = 0;
        for result in &results {
            match &result.error_message {
                None => println!("ok     {}  ({} ms)", result.file_name, result.elapsed_ms),
                Some(message) => {
                    failed += 1;
                    println!("failed {}  ({} ms): {}", result.file_name, result.elapsed_ms, message);
                }
            }
        }
        println!("{} uploaded, {} failed", results.len() - failed, failed);
        if failed > 0 {
            bail!("{} of {} uploads failed", failed, results.len());
        }
        Ok(())
    }

    pub async fn rm(&self, key: &str) -> Result<()> {
        let response = self.session.delete(key).await?;
        println!("{}", response.message);
        Ok(())
    }

    pub async fn mkdir(&self, name: &str, parent: &str) -> Result<()> {
        let response = self.session.create_folder(name, parent).await?;
        println!("{}", response.folder_path);
        Ok(())
    }

    pub async fn download(&self, key: &str, output: Option<PathBuf>) -> Result<()> {
        let output = output.unwrap_or_else(|| PathBuf::from(file_name(key)));
        let bytes = self.client.download_bytes(key).await?;
        tokio::fs::write(&output, &bytes)
            .await
            .with_context(|| format!("writing {}", output.display()))?;
        println!("{} -> {} ({})", key, output.display(), format_file_size(bytes.len() as u64));
        Ok(())
    }
}

/// Folder prefixes given on the command line get a trailing `/`; the root
/// stays empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}
