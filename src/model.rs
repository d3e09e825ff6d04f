// Persistent entities and request payloads.
//
// AddressBook and Customer mirror the storage schema (see db.rs); the
// request types carry client input and are validated in validation.rs
// before touching storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// ENTITIES
// ============================================================================

/// A named address book. Customers belong to exactly one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBook {
    pub pk: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// One stored customer entry inside a single address book.
///
/// Phone numbers are a set: the same number stored twice for the same
/// customer collapses to one entry (enforced by the schema as well).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub pk: i64,
    pub name: String,
    pub phone_numbers: BTreeSet<String>,
    pub address_book_pk: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// REQUEST PAYLOADS
// ============================================================================

/// Payload for creating an address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBookRequest {
    pub title: String,
}

/// Payload for creating a customer inside an address book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: String,
    #[serde(default)]
    pub phone_numbers: BTreeSet<String>,
}
