//! Database configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parser queue sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Triples per batch handed over by the RDF/XML producer
    pub rdfxml_batch_size: usize,
    /// Batches the RDF/XML producer may queue before it blocks
    pub rdfxml_queue_buffers: usize,
    /// Triples the N3 producer may queue before it blocks
    pub n3_queue_triples: usize,
    /// Statements between throughput log lines
    pub statement_log_batch: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            rdfxml_batch_size: 1000,
            rdfxml_queue_buffers: 10,
            n3_queue_triples: 1000,
            statement_log_batch: 250_000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding storage, log and overflow file
    pub data_dir: PathBuf,
    /// Fsync the transaction log on prepare and commit
    pub wal_sync: bool,
    /// Default XA transaction timeout in seconds
    pub transaction_timeout_secs: u64,
    pub parser: ParserConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./quadstore_data"),
            wal_sync: true,
            transaction_timeout_secs: 0,
            parser: ParserConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Default configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a YAML document; missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::from_yaml_str(&std::fs::read_to_string(path)?)?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check the values that deserialization cannot rule out.
    pub fn validate(&self) -> ConfigResult<()> {
        self.parser.validate()
    }
}

impl ParserConfig {
    /// Every queue size and the log interval must be positive.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.rdfxml_batch_size == 0 || self.rdfxml_queue_buffers == 0 || self.n3_queue_triples == 0 {
            return Err(ConfigError::Invalid("parser queue sizes must be positive".to_string()));
        }
        if self.statement_log_batch == 0 {
            return Err(ConfigError::Invalid("statement_log_batch must be positive".to_string()));
        }
        Ok(())
    }
}
