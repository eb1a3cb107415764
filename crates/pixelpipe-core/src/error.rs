//! Error types for the Pixelpipe runtime.
//!
//! Errors are organized by component so callers can tell a bad configuration
//! from a failed load, an unknown blend mode or a failed script execution.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Pixelpipe operations.
#[derive(Error, Debug)]
pub enum PixelpipeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Image loading errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Blend registry errors
    #[error("Blend error: {0}")]
    Blend(#[from] BlendError),

    /// Script execution errors
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Stream lifecycle errors
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// The pixel worker pool could not be started
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Image loading errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {source_id}: {message}")]
    Decode { source_id: String, message: String },

    /// Remote source could not be fetched
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        status_code: Option<u16>,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {source_id} after {timeout_ms}ms")]
    Timeout {
        source_id: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Source exceeds size limit
    #[error("File too large: {source_id} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        source_id: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {source_id} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        source_id: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {source_id}")]
    UnsupportedFormat { source_id: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

/// Blend registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlendError {
    /// No operator registered under this name
    #[error("Unknown blend mode: {0}")]
    UnknownMode(String),

    /// Names are unique once registered
    #[error("Blend mode {0} is already registered")]
    AlreadyRegistered(String),

    /// Pixel coordinate outside the destination image
    #[error("Pixel ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },
}

/// Script execution errors.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The script runner reported a failure
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Nothing to execute after trimming
    #[error("Script is empty")]
    EmptyScript,

    /// The output path has no supported image extension
    #[error("Unsupported output format: {0} (supported: .png, .jpg, .jpeg)")]
    UnsupportedOutput(PathBuf),

    /// Encoding the result failed
    #[error("Encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// Writing the artifact failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task died
    #[error("Render task failed: {0}")]
    Task(String),

    /// Blend lookup failed inside the script
    #[error(transparent)]
    Blend(#[from] BlendError),

    /// Loading a source image failed inside the script
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Stream lifecycle errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The stream has no script generator
    #[error("Stream {0}: a script function must be provided")]
    MissingScript(String),

    /// The tick interval must be positive
    #[error("Stream {0}: interval must be greater than zero")]
    InvalidInterval(String),

    /// A snapshot route is malformed or used twice
    #[error("Invalid route {0:?}: {1}")]
    InvalidRoute(String, String),

    /// Preparing the artifact directory failed
    #[error("Stream IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot server could not bind its address
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
}

/// Convenience type alias for Pixelpipe results.
pub type Result<T> = std::result::Result<T, PixelpipeError>;

/// Convenience type alias for loader results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
