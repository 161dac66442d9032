use thiserror::Error;

/// Errors raised inside the discovery and retrieval pipeline.
///
/// None of these cross the public [`crate::Subscene`] entry points as `Err`;
/// they end up inside [`crate::SearchOutcome::Failed`] or
/// [`crate::RetrieveOutcome::Failed`].
#[derive(Error, Debug)]
pub enum SubsceneError {
    #[error("Network error: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Invalid candidate id: {id}")]
    InvalidCandidateId { id: String },

    #[error("Archive error: {source}")]
    Archive {
        #[from]
        source: zip::result::ZipError,
    },

    #[error("Archive contains no subtitle entries")]
    EmptyArchive,

    #[error("Failed to parse metadata response: {source}")]
    MetadataParsing {
        #[from]
        source: serde_json::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("File system error: {source}")]
    FileSystem {
        #[from]
        source: std::io::Error,
    },
}

impl SubsceneError {
    /// Whether the failure came from the transport (timeout, refused
    /// connection, broken body) rather than from the content itself.
    pub fn is_transient(&self) -> bool {
        match self {
            SubsceneError::Network { source } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            SubsceneError::FileSystem { .. } => true,
            _ => false,
        }
    }
}

pub type SubsceneResult<T> = Result<T, SubsceneError>;
