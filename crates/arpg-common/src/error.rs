//! Error types for loading engine data.
//!
//! Simulation calls never fail with these; they only surface at the edges
//! where configuration and catalogs are read.

use thiserror::Error;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum ArpgError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The document could not be written
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// A field holds a value the engine cannot run with
    #[error("Invalid value for `{field}`: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Buff and skill catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog could not be parsed
    #[error("Failed to parse catalog: {0}")]
    Parse(String),

    /// Two definitions share an id
    #[error("Duplicate definition id: {0}")]
    DuplicateId(u32),

    /// A definition references an id that is not in the catalog
    #[error("Unknown definition id: {0}")]
    UnknownId(u32),
}

/// Result type alias for engine data loading.
pub type ArpgResult<T> = Result<T, ArpgError>;
