//! mongo-bridge CLI
//!
//! Small operator tool over the document store: runs one operation against
//! the configured backend and prints the result as JSON.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mongo_bridge::config::ConfigLoader;
use mongo_bridge::database::{Backend, CountOpt, Document, DocumentStore, FindOpt};
use mongo_bridge::{logging, Error};
use serde_json::{json, Value as JsonValue};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mongo-bridge")]
#[command(about = "Query a MongoDB collection through the Data API or the native driver", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "MONGO_BRIDGE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the per-operation timeout
    #[arg(long, global = true, value_name = "SECONDS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the backend is reachable
    Ping,

    /// Print the first document matching a filter
    FindOne {
        /// Filter as a JSON object
        #[arg(value_name = "FILTER", default_value = "{}")]
        filter: String,
    },

    /// Print all documents matching a filter
    Find {
        /// Filter as a JSON object
        #[arg(value_name = "FILTER", default_value = "{}")]
        filter: String,

        /// Sort order as a JSON object, e.g. '{"n": -1}'
        #[arg(long, value_name = "JSON")]
        sort: Option<String>,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        skip: Option<i64>,
    },

    /// Insert one document
    Insert {
        /// Document as a JSON object
        #[arg(value_name = "DOCUMENT")]
        document: String,
    },

    /// Count documents matching a filter
    Count {
        /// Filter as a JSON object
        #[arg(value_name = "FILTER", default_value = "{}")]
        filter: String,

        #[arg(long)]
        limit: Option<i64>,

        #[arg(long)]
        skip: Option<i64>,
    },

    /// Delete documents matching a filter
    Delete {
        /// Filter as a JSON object
        #[arg(value_name = "FILTER")]
        filter: String,

        /// Delete every match instead of the first one
        #[arg(long)]
        many: bool,
    },

    /// Dump the collection to a gzip archive (driver backend only)
    Backup {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Restore a gzip archive (driver backend only)
    Restore {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .load_from_file(cli.config.as_ref())
        .load_from_env()
        .build()?;
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }

    let _guard = logging::init(&config.logging)?;

    let store = Backend::from_config(&config).context("Invalid backend configuration")?;
    store
        .connect()
        .await
        .with_context(|| format!("Failed to connect using the {} backend", store.kind()))?;

    let result = run(&store, cli.command).await;
    store.close().await.context("Failed to close connection")?;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(store: &Backend, command: Commands) -> Result<JsonValue> {
    let output = match command {
        Commands::Ping => {
            let started = std::time::Instant::now();
            store
                .count_documents(
                    None,
                    Some(CountOpt {
                        limit: Some(1),
                        skip: None,
                    }),
                )
                .await?;
            json!({
                "ok": true,
                "backend": store.kind(),
                "elapsed_ms": duration_ms(started.elapsed()),
            })
        }
        Commands::FindOne { filter } => {
            match store
                .find_one::<JsonValue>(Some(parse_document(&filter)?), None)
                .await
            {
                Ok(document) => document,
                Err(Error::NoDocuments) => JsonValue::Null,
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Find {
            filter,
            sort,
            limit,
            skip,
        } => {
            let opt = FindOpt {
                sort: sort.as_deref().map(parse_document).transpose()?,
                limit,
                skip,
                ..Default::default()
            };
            let documents: Vec<JsonValue> =
                store.find(Some(parse_document(&filter)?), Some(opt)).await?;
            JsonValue::Array(documents)
        }
        Commands::Insert { document } => {
            let id = store.insert_one(Some(parse_document(&document)?)).await?;
            json!({ "inserted_id": id.wire_value() })
        }
        Commands::Count {
            filter,
            limit,
            skip,
        } => {
            let n = store
                .count_documents(Some(parse_document(&filter)?), Some(CountOpt { limit, skip }))
                .await?;
            json!({ "count": n })
        }
        Commands::Delete { filter, many } => {
            let filter = Some(parse_document(&filter)?);
            let deleted = if many {
                store.delete_many(filter).await?
            } else {
                store.delete_one(filter).await?
            };
            json!({ "deleted_count": deleted })
        }
        Commands::Backup { file } => {
            let Some(driver) = store.as_driver() else {
                bail!("backup requires the driver backend");
            };
            driver.backup(&file).await?;
            json!({ "ok": true, "file": file })
        }
        Commands::Restore { file } => {
            let Some(driver) = store.as_driver() else {
                bail!("restore requires the driver backend");
            };
            driver.restore(&file).await?;
            json!({ "ok": true, "file": file })
        }
    };

    Ok(output)
}

fn parse_document(text: &str) -> Result<Document> {
    serde_json::from_str(text).with_context(|| format!("Expected a JSON object, got {:?}", text))
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
