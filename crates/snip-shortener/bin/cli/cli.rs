use clap::{Parser, Subcommand, ValueEnum};
use snip_batch::DEFAULT_MAX_BATCH;
use snip_shortener::DEFAULT_BASE_URL;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const STORAGE_BACKEND_ENV: &str = "SNIP_STORAGE_BACKEND";
pub const FILE_PATH_ENV: &str = "SNIP_FILE_PATH";
pub const MYSQL_DSN_ENV: &str = "SNIP_MYSQL_DSN";
pub const SNAPSHOT_INTERVAL_ENV: &str = "SNIP_SNAPSHOT_INTERVAL_SECS";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const DELETE_MAX_BATCH_ENV: &str = "SNIP_DELETE_MAX_BATCH";
pub const DELETE_WAIT_MS_ENV: &str = "SNIP_DELETE_WAIT_MS";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";
pub const OWNER_ENV: &str = "SNIP_OWNER";

pub const DEFAULT_FILE_PATH: &str = "snip.json";
pub const DEFAULT_OWNER: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "file")]
    File,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::File => write!(f, "file"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip", about = "Content-addressed URL shortener")]
pub struct CLI {
    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::File
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = FILE_PATH_ENV, default_value = DEFAULT_FILE_PATH)]
    pub file_path: PathBuf,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Seconds between file snapshots; 0 writes only on exit.
    #[arg(long, env = SNAPSHOT_INTERVAL_ENV, default_value_t = 60)]
    pub snapshot_interval_secs: u64,

    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = DELETE_MAX_BATCH_ENV, default_value_t = DEFAULT_MAX_BATCH)]
    pub delete_max_batch: usize,

    #[arg(long, env = DELETE_WAIT_MS_ENV, default_value_t = 5000)]
    pub delete_wait_ms: u64,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Shorten one url.
    Shorten {
        url: String,
        #[arg(long, env = OWNER_ENV, default_value = DEFAULT_OWNER)]
        owner: String,
    },
    /// Shorten several urls at once; each result is tagged with its position.
    ShortenBatch {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, env = OWNER_ENV, default_value = DEFAULT_OWNER)]
        owner: String,
    },
    /// Print the url behind a short code.
    Expand { code: String },
    /// List the urls an owner has shortened.
    List {
        #[arg(long, env = OWNER_ENV, default_value = DEFAULT_OWNER)]
        owner: String,
    },
    /// Delete short codes owned by `owner`.
    Delete {
        #[arg(required = true)]
        codes: Vec<String>,
        #[arg(long, env = OWNER_ENV, default_value = DEFAULT_OWNER)]
        owner: String,
    },
    /// Count stored urls and owners.
    Stats,
    /// Check that the storage backend is reachable.
    Ping,
}
