//! Error types shared across the crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Identity fields that cannot be combined for the given radio technology.
    #[error("unsupported cell identity shape: {0}")]
    UnsupportedIdentity(String),

    /// Malformed identity input, either a canonical string or field values.
    #[error("invalid cell identity: {0}")]
    InvalidIdentity(String),

    /// A radio technology name outside GSM/UMTS/LTE.
    #[error("unrecognized radio type: {0}")]
    UnknownRadio(String),

    /// More than one record matched and the configured policy forbids it.
    #[error("duplicate cell id {0} (not allowed by current policy)")]
    DuplicateIdentity(String),

    /// A proximity search gave coordinates but no upper distance bound,
    /// which would imply a full scan.
    #[error("search for coordinates without a distance limit")]
    MissingDistanceLimit,

    /// The backend does not provide this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// A malformed antenna record, during import or when decoding a stored row.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
