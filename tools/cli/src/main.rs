//! Selladoc CLI - Command line interface for encrypted document storage.
//!
//! This tool stores, retrieves, audits and deletes encrypted documents
//! against the backends configured through the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use selladoc_common::{DocumentId, StorageId};
use selladoc_service::{SecureStorageService, StorageSettings, StoreOptions};
use selladoc_storage::{ProviderKind, RecordStore, RetrieveOptions, SqliteRecordStore};

#[derive(Parser)]
#[command(name = "selladoc")]
#[command(about = "Selladoc - Encrypted document storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to the storage record database.
    #[arg(long, env = "RECORDS_DB", default_value = "selladoc-records.db")]
    records: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and store a document.
    Store {
        /// Logical document identifier.
        #[arg(short, long)]
        document_id: String,

        /// File to store.
        #[arg(short, long)]
        file: PathBuf,

        /// JSON object with additional metadata.
        #[arg(short, long)]
        metadata: Option<String>,

        /// Backend override: "s3" or "local".
        #[arg(short, long)]
        provider: Option<String>,

        /// Cipher mode: "aes-256-gcm" or "aes-256-cbc".
        #[arg(short, long, default_value = "aes-256-gcm")]
        encryption: String,
    },

    /// Retrieve and decrypt a stored document.
    Retrieve {
        /// Storage identifier returned at store time.
        #[arg(short, long)]
        id: String,

        /// Destination file for the document bytes.
        #[arg(short, long)]
        output: PathBuf,

        /// Return the document still encrypted.
        #[arg(long)]
        no_decrypt: bool,
    },

    /// Verify the integrity of a stored document.
    Verify {
        /// Storage identifier.
        #[arg(short, long)]
        id: String,
    },

    /// Generate a time-limited download URL.
    Url {
        /// Storage identifier.
        #[arg(short, long)]
        id: String,

        /// URL lifetime in seconds.
        #[arg(short, long, default_value_t = 3600)]
        expires: u64,
    },

    /// Delete a stored document and its record.
    Delete {
        /// Storage identifier.
        #[arg(short, long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let service = build_service(&cli.records)?;

    match cli.command {
        Commands::Store {
            document_id,
            file,
            metadata,
            provider,
            encryption,
        } => cmd_store(&service, &document_id, &file, metadata, provider, &encryption).await,

        Commands::Retrieve {
            id,
            output,
            no_decrypt,
        } => cmd_retrieve(&service, &id, &output, no_decrypt).await,

        Commands::Verify { id } => cmd_verify(&service, &id).await,

        Commands::Url { id, expires } => cmd_url(&service, &id, expires).await,

        Commands::Delete { id } => cmd_delete(&service, &id).await,
    }
}

fn build_service(records_path: &PathBuf) -> Result<SecureStorageService> {
    let settings = StorageSettings::from_env().context("Failed to read configuration")?;
    let records: Arc<dyn RecordStore> = Arc::new(
        SqliteRecordStore::open(records_path).context("Failed to open record database")?,
    );
    SecureStorageService::from_settings(settings, records)
        .context("Failed to initialize storage backends")
}

fn parse_id(id: &str) -> Result<StorageId> {
    StorageId::new(id).context("Invalid storage id")
}

async fn cmd_store(
    service: &SecureStorageService,
    document_id: &str,
    file: &PathBuf,
    metadata: Option<String>,
    provider: Option<String>,
    encryption: &str,
) -> Result<()> {
    let document_id = DocumentId::new(document_id).context("Invalid document id")?;
    let document = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let metadata = match metadata {
        Some(json) => serde_json::from_str(&json).context("Metadata must be a JSON object")?,
        None => serde_json::Map::new(),
    };

    let options = StoreOptions {
        provider: provider
            .map(|p| p.parse::<ProviderKind>())
            .transpose()
            .context("Invalid provider")?,
        encryption_type: encryption.parse().context("Invalid encryption type")?,
    };

    info!("Storing document: {}", document_id);
    let result = service
        .store_document(&document_id, &document, metadata, options)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        anyhow::bail!("Store failed");
    }
    Ok(())
}

async fn cmd_retrieve(
    service: &SecureStorageService,
    id: &str,
    output: &PathBuf,
    no_decrypt: bool,
) -> Result<()> {
    let id = parse_id(id)?;
    let retrieved = service
        .retrieve_document(&id, RetrieveOptions { decrypt: !no_decrypt })
        .await
        .context("Failed to retrieve document")?;

    tokio::fs::write(output, &retrieved.data)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("{}", serde_json::to_string_pretty(&retrieved.metadata)?);
    info!("Wrote {} bytes to {}", retrieved.data.len(), output.display());
    Ok(())
}

async fn cmd_verify(service: &SecureStorageService, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let report = service.verify_document_integrity(&id).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_valid {
        anyhow::bail!("Integrity check failed");
    }
    Ok(())
}

async fn cmd_url(service: &SecureStorageService, id: &str, expires: u64) -> Result<()> {
    let id = parse_id(id)?;
    let url = service
        .presigned_url(&id, expires)
        .await
        .context("Failed to generate download URL")?;
    println!("{}", url);
    Ok(())
}

async fn cmd_delete(service: &SecureStorageService, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let deleted = service
        .delete_document(&id)
        .await
        .context("Failed to delete document")?;

    if deleted {
        info!("Deleted {}", id);
        Ok(())
    } else {
        anyhow::bail!("Delete of {} did not complete; the record may remain", id);
    }
}
