//! Command-line configuration.

use clap::{Parser, Subcommand};
use sewerdb::StorageConfig;
use std::path::PathBuf;

use crate::formatter::OutputFormat;

/// Default page cache size in megabytes.
pub const DEFAULT_CACHE_MB: u64 = 256;

/// Default background flush interval in milliseconds.
pub const DEFAULT_FLUSH_MS: u64 = 1000;

/// SewerDB command-line tool.
#[derive(Parser, Debug)]
#[command(name = "sewerdb")]
#[command(version, about = "Inspect and bootstrap SewerDB databases")]
pub struct Args {
    /// Path to the database directory
    #[arg(short = 'd', long, default_value = "./sewerdb_data")]
    pub data_path: PathBuf,

    /// Page cache size in MB
    #[arg(long, default_value_t = DEFAULT_CACHE_MB)]
    pub cache_mb: u64,

    /// Background flush interval in milliseconds (0 flushes only on exit)
    #[arg(long, default_value_t = DEFAULT_FLUSH_MS)]
    pub flush_ms: u64,

    /// Store pages uncompressed
    #[arg(long)]
    pub no_compression: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the tool.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Materialize the sewer schema and print the outcome
    Bootstrap,

    /// Print the entity catalog
    Describe {
        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// List materialized tables with row counts and fingerprints
    Tables,

    /// Re-validate every stored row
    Check,

    /// Print the rows of one entity as JSON lines
    Dump {
        /// Entity name, e.g. Pipe
        entity: String,
    },
}

impl Args {
    /// Build the storage configuration.
    pub fn into_config(self) -> (StorageConfig, Command) {
        let flush_every_ms = (self.flush_ms > 0).then_some(self.flush_ms);
        let config = StorageConfig::new(self.data_path)
            .with_cache_capacity(self.cache_mb * 1024 * 1024)
            .with_flush_every_ms(flush_every_ms)
            .with_compression(!self.no_compression);
        (config, self.command)
    }
}
