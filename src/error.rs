use std::io;
use thiserror::Error;

/// Custom result type alias for the harvester
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Errors that can occur while harvesting gem metadata or artifacts
#[derive(Debug, Error)]
pub enum HarvestError {
    /// I/O errors
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Metadata database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Index store errors
    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Stored checksum could not be decoded
    #[error("Checksum decode error: {0}")]
    ChecksumDecode(#[from] base64::DecodeError),

    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Network connectivity errors
    #[error("Network error: {0}")]
    Network(String),

    /// A catalog page answered with something other than 200
    #[error("HTTP status {status} from {url}")]
    Status {
        /// Requested page
        url: String,
        /// Response status code
        status: u16,
    },

    /// External fetch tool reported a failure
    #[error("Tool error: {0}")]
    Tool(String),

    /// The fetch tool found no such gem version in any repository
    #[error("Gem not found: {0}")]
    GemNotFound(String),

    /// An operation ran past its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// HTML parsing errors
    #[error("Parsing error: {0}")]
    Parse(String),
}

impl HarvestError {
    /// Whether repeating the same request could succeed
    ///
    /// Server errors and 429 are transient; other statuses, missing gems and
    /// parse failures give the same answer every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Http(_) | Self::Timeout(_) | Self::Tool(_) | Self::IO(_) => {
                true
            }
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
