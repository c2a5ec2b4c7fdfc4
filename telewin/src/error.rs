//! Error types for the telewin window engine.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all telewin operations.
///
/// Each variant wraps the error enum of one concern, so callers can match on
/// the concern first and on the precise condition second.
#[derive(Error, Debug)]
pub enum TelewinError {
    /// A sample was rejected on the ingestion path.
    #[error("sample error: {0}")]
    Sample(#[from] SampleError),

    /// A series lookup or registration failed.
    #[error("series error: {0}")]
    Series(#[from] SeriesError),

    /// The window configuration is unusable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The rendering collaborator failed to apply an operation.
    #[error("egress error: {0}")]
    Egress(#[from] EgressError),
}

/// Errors raised on the ingestion (`add`) path.
#[derive(Error, Debug)]
pub enum SampleError {
    /// The value is not a finite number.
    ///
    /// Sources are expected to filter missing or non-numeric readings before
    /// handing them to the engine; one that slips through is a caller bug.
    #[error("invalid sample for series '{series}' at tick {x}: {value}")]
    InvalidSample {
        /// The series the sample was addressed to.
        series: String,
        /// The tick the sample was stamped with.
        x: i64,
        /// The offending value.
        value: f64,
    },
}

/// Errors raised when addressing or registering series.
#[derive(Error, Debug)]
pub enum SeriesError {
    /// No series with this name is registered.
    ///
    /// Consumers usually treat this as "nothing to sync yet".
    #[error("unknown series '{name}'")]
    UnknownSeries {
        /// The name that was looked up.
        name: String,
    },

    /// A handle does not belong to this registry.
    #[error("invalid series handle: {index}")]
    InvalidHandle {
        /// The raw handle index.
        index: usize,
    },

    /// The series name cannot be registered.
    #[error("invalid series name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },
}

/// Errors raised while loading or validating a [`WindowConfig`](crate::config::WindowConfig).
///
/// These only ever surface at construction time, never from a running engine.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of what is invalid.
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("failed to read config '{}': {source}", path.display())]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config '{}': {source}", path.display())]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by an [`Egress`](crate::consumer::Egress) implementation.
#[derive(Error, Debug)]
pub enum EgressError {
    /// An operation was addressed to a mirror handle the egress never issued.
    #[error("unknown mirror handle {handle}")]
    UnknownHandle {
        /// The raw handle value.
        handle: u64,
    },

    /// A drop-from-front asked for more entries than the mirror holds.
    #[error("mirror {handle} holds {len} samples, cannot drop {count}")]
    DropBeyondMirror {
        /// The raw handle value.
        handle: u64,
        /// Number of samples currently mirrored.
        len: usize,
        /// Number of samples requested to drop.
        count: usize,
    },

    /// Writing to the transport failed.
    #[error("egress I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Encoding an operation for the transport failed.
    #[error("failed to encode sync operation: {source}")]
    Encode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, TelewinError>`.
pub type Result<T> = std::result::Result<T, TelewinError>;
