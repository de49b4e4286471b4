//! Error Types for GeoStream
//!
//! This module defines all error types that can occur while encoding or
//! decoding a feature stream.
//!
//! ## Error Categories
//!
//! ### I/O Errors
//! - `Io`: the underlying reader or writer failed
//!
//! ### Format Errors (always fatal for the read session)
//! - `InvalidMagic`: stream doesn't start with the GeoStream magic bytes
//! - `UnsupportedVersion`: stream was written by a format version we don't read
//! - `Format`: truncated header/record, attribute cursor overrun or underrun,
//!   invalid UTF-8, record size disagreeing with the index
//!
//! ### Schema Errors
//! - `Schema`: an attribute tag index is not present in the column list. This
//!   means the record and the header disagree (corruption or version skew).
//!
//! ### Type Errors
//! - `UnsupportedType`: type tag outside the closed `ColumnType` enumeration,
//!   or a value whose column type cannot be inferred
//! - `TypeMismatch`: a property value doesn't match its declared column type
//!
//! ### Geometry Errors
//! - `Geometry`: raised by a `GeometryCodec`. The feature decoder recovers from
//!   these per feature (the feature gets no geometry); on encode they are fatal.
//!
//! ### Index Errors
//! - `Index`: invalid node size or malformed spatial index block
//!
//! ## Usage
//! All functions in GeoStream return `Result<T>` which is aliased to
//! `Result<T, Error>`, so `?` propagates everything.

use thiserror::Error;

use crate::schema::ColumnType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Column index {tag} out of range (schema has {column_count} columns)")]
    Schema { tag: u16, column_count: usize },

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Type mismatch for column '{column}': expected {expected:?}, found {found}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        found: &'static str,
    },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Spatial index error: {0}")]
    Index(String),
}

/// Failure reported by a geometry codec.
///
/// Kept separate from [`Error`] so the feature decoder can tell a bad shape
/// (recoverable, the feature loses its geometry) from a damaged stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),

    #[error("malformed geometry: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand used by decoders when a read would run past the end of a block.
    pub fn truncated(what: &str) -> Self {
        Error::Format(format!("unexpected end of data reading {}", what))
    }

    /// True for errors that indicate damaged or foreign bytes rather than I/O trouble.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Error::InvalidMagic | Error::UnsupportedVersion(_) | Error::Format(_)
        )
    }
}
