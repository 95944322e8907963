/*!
 * Error types for the epubtrans application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling a remote translation provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The service explicitly signalled rate limiting (HTTP 429 or equivalent)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The service answered but produced no usable text
    #[error("Empty response from provider")]
    EmptyResponse,

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The call did not complete within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
}

impl ProviderError {
    /// Whether this failure is an explicit rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Whether this failure came from the transport rather than the service
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::Timeout(_))
    }
}

/// Structural failures while decoding or re-encoding the book archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// `META-INF/container.xml` is absent or names no package document
    #[error("Invalid EPUB: missing container.xml rootfile")]
    MissingContainer,

    /// The package document named by the container does not exist
    #[error("Package document not found at {0}")]
    MissingPackage(String),

    /// A chapter referenced by the spine has no archive entry
    #[error("Chapter entry not found in archive: {0}")]
    MissingEntry(String),

    /// The container or package document is not well-formed XML
    #[error("Malformed XML in {entry}: {message}")]
    Malformed { entry: String, message: String },

    /// A chapter entry could not be decoded as UTF-8 text
    #[error("Chapter {0} is not valid UTF-8")]
    InvalidEncoding(String),

    /// The underlying zip container is corrupt
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Reading or writing the archive failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Archive corruption or a missing structural entry point
    #[error("Structural decode failure: {0}")]
    Archive(#[from] ArchiveError),

    /// Durable store read or write failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from configuration loading or validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a pipeline run
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
