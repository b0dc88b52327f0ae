//! Backup and restore through the MongoDB database tools
//!
//! Both operations shell out to `mongodump`/`mongorestore`, which must be on
//! `PATH`. Archives are gzip-compressed single files.

use super::connection::MongoClient;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

const DUMP_TOOL: &str = "mongodump";
const RESTORE_TOOL: &str = "mongorestore";

impl MongoClient {
    /// Dump the configured collection (or the whole database when no
    /// collection is set) to a gzip archive at `file`
    pub async fn backup(&self, file: impl AsRef<Path>) -> Result<()> {
        let args = backup_args(&self.uri(), &self.config().collection, file.as_ref());
        run_tool(DUMP_TOOL, "backup", &args).await?;

        info!(file = %file.as_ref().display(), "Backup completed");
        Ok(())
    }

    /// Restore a gzip archive produced by [`MongoClient::backup`], dropping
    /// existing collections first
    pub async fn restore(&self, file: impl AsRef<Path>) -> Result<()> {
        let args = restore_args(&self.uri(), file.as_ref());
        run_tool(RESTORE_TOOL, "restore", &args).await?;

        info!(file = %file.as_ref().display(), "Restore completed");
        Ok(())
    }
}

fn backup_args(uri: &str, collection: &str, file: &Path) -> Vec<String> {
    let mut args = vec![format!("--uri={}", uri)];
    if !collection.is_empty() {
        args.push(format!("-c{}", collection));
    }
    args.push("--gzip".to_string());
    args.push(format!("--archive={}", file.display()));
    args
}

fn restore_args(uri: &str, file: &Path) -> Vec<String> {
    vec![
        format!("--uri={}", uri),
        "--gzip".to_string(),
        "--drop".to_string(),
        format!("--archive={}", file.display()),
    ]
}

async fn run_tool(tool: &str, action: &'static str, args: &[String]) -> Result<()> {
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(Error::Process {
            action,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        });
    }
    Ok(())
}
