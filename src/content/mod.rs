//! Document loading
//!
//! A [`Content`] supplies raw bytes. A [`Parser`] turns them into triples on
//! a producer thread and hands them over through a bounded queue; the
//! consuming thread localizes them through a session, blank nodes included,
//! and [`ContentLoader`] writes them into a graph.

pub mod blank;
pub mod loader;
pub mod parser;
pub mod statements;

pub use blank::BlankNodeMap;
pub use loader::{ContentLoader, LoadStats};
pub use parser::{AbortHandle, ParseError, ParsedNode, ParsedTriple, Parser, ParserState};
pub use statements::Statements;

use crate::config::ConfigError;
use crate::xa::SessionError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Content errors
#[derive(Error, Debug)]
pub enum ContentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Neither the content type nor the name identifies a supported syntax
    #[error("Unknown RDF format for {0}")]
    UnknownFormat(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

pub type ContentResult<T> = Result<T, ContentError>;

/// Supported document syntaxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfFormat {
    RdfXml,
    /// Notation 3 documents in the Turtle / N-Triples subset
    N3,
}

impl RdfFormat {
    /// Format for a MIME type, ignoring parameters
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "application/rdf+xml" | "application/xml" | "text/xml" => Some(RdfFormat::RdfXml),
            "text/rdf+n3" | "text/n3" | "text/turtle" | "application/x-turtle" | "application/n-triples"
            | "text/plain" => Some(RdfFormat::N3),
            _ => None,
        }
    }

    /// Format for a file name, looking through a `.gz` suffix
    pub fn from_path(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        let extension = Path::new(name).extension()?.to_str()?;
        match extension {
            "rdf" | "xml" | "owl" => Some(RdfFormat::RdfXml),
            "n3" | "ttl" | "nt" => Some(RdfFormat::N3),
            _ => None,
        }
    }
}

/// A source of document bytes
pub trait Content: Send + Sync {
    /// Absolute URI of the document, used as the base IRI
    fn uri(&self) -> Option<&str>;

    /// MIME type, if known
    fn content_type(&self) -> Option<&str>;

    /// A fresh stream over the whole document
    fn new_input_stream(&self) -> ContentResult<Box<dyn Read + Send>>;

    /// Syntax of the document, from the content type or else the URI
    fn format(&self) -> ContentResult<RdfFormat> {
        if let Some(format) = self.content_type().and_then(RdfFormat::from_content_type) {
            return Ok(format);
        }
        self.uri()
            .and_then(RdfFormat::from_path)
            .ok_or_else(|| ContentError::UnknownFormat(self.uri().unwrap_or("<anonymous>").to_string()))
    }
}

/// A document on the local file system; `.gz` files are decompressed.
#[derive(Debug, Clone)]
pub struct FileContent {
    path: PathBuf,
    uri: String,
    content_type: Option<String>,
}

impl FileContent {
    pub fn new(path: impl AsRef<Path>) -> ContentResult<Self> {
        let path = path.as_ref().to_path_buf();
        let absolute = std::fs::canonicalize(&path)?;
        Ok(Self {
            uri: format!("file://{}", absolute.display()),
            path,
            content_type: None,
        })
    }

    /// Override the format detection by file name
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_gzip(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
    }
}

impl Content for FileContent {
    fn uri(&self) -> Option<&str> {
        Some(&self.uri)
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn new_input_stream(&self) -> ContentResult<Box<dyn Read + Send>> {
        let file = File::open(&self.path)?;
        if self.is_gzip() {
            Ok(Box::new(GzDecoder::new(BufReader::new(file))))
        } else {
            Ok(Box::new(file))
        }
    }
}

/// A document held in memory
#[derive(Debug, Clone)]
pub struct MemoryContent {
    data: Arc<[u8]>,
    uri: Option<String>,
    content_type: Option<String>,
}

impl MemoryContent {
    pub fn new(data: impl Into<Vec<u8>>, format: RdfFormat) -> Self {
        let content_type = match format {
            RdfFormat::RdfXml => "application/rdf+xml",
            RdfFormat::N3 => "text/rdf+n3",
        };
        Self {
            data: Arc::from(data.into()),
            uri: None,
            content_type: Some(content_type.to_string()),
        }
    }

    /// Base URI for relative references in the document
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

impl Content for MemoryContent {
    fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn new_input_stream(&self) -> ContentResult<Box<dyn Read + Send>> {
        Ok(Box::new(io::Cursor::new(Arc::clone(&self.data))))
    }
}
