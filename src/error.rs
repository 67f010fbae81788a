//! Error type shared by every module of the engine.
//!
//! Construction either returns a fully built database or one of these
//! errors; degraded-but-recoverable conditions (missing broadening file,
//! failed fetch of an optional file) are logged instead and never surface
//! here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LineDbError {
    // ─────────────────────────────────────────────────────────────
    // I/O
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to access file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),

    // ─────────────────────────────────────────────────────────────
    // Parsing
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file {path} (line {line}): {reason}")]
    Parse {
        format: &'static str,
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown species {0}: no row in the partition function table")]
    UnknownSpecies(String),

    #[error("Cannot infer the HITRAN molecule id from '{0}'; name the file NN_<name>.par")]
    AmbiguousMolecule(String),

    #[error(
        "{temperature:.1} K is outside the supported partition function range of {label} ({min:.1} -- {max:.1} K)"
    )]
    TemperatureOutOfRange {
        label: String,
        temperature: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration {path}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────
    // Line table
    // ─────────────────────────────────────────────────────────────
    #[error("Mask has {got} entries but the line table has {expected} lines")]
    MaskLength { expected: usize, got: usize },

    #[error("Column schema mismatch: {0}")]
    SchemaMismatch(String),

    // ─────────────────────────────────────────────────────────────
    // Cache
    // ─────────────────────────────────────────────────────────────
    #[error("Stale cache {path}: {reason}. Delete it and load again to regenerate the cache")]
    StaleCache { path: PathBuf, reason: String },

    #[error("Parquet error in {path}")]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl LineDbError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(
        format: &'static str,
        path: impl Into<PathBuf>,
        line: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parse {
            format,
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LineDbError>;
