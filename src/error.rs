// Error types shared across the storage layer, the aggregation engine and
// the HTTP server. The server maps these onto status codes.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddressBookError {
    #[error("No address book found for [{0}]")]
    AddressBookNotFound(i64),

    #[error("No customer found for id [{0}]")]
    CustomerNotFound(i64),

    /// Caller contract violation: page must be >= 0 and pageSize >= 1.
    /// The engine never clamps; clamping would mask off-by-one bugs in
    /// calling code.
    #[error("Invalid pagination request: page [{page}] must be >= 0 and pageSize [{page_size}] must be >= 1")]
    InvalidPaginationRequest { page: i64, page_size: i64 },

    /// The record source could not supply the raw customer records.
    /// No partial aggregation is ever returned.
    #[error("Record source unavailable: {0}")]
    SourceUnavailable(String),

    /// Request payload failed validation. One message per failed field.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AddressBookError>;
