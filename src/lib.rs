// Address Book Service - Core Library
// Exposes the storage layer and the unique-customer aggregation engine
// for use by the API server and tests.

pub mod aggregation;
pub mod db;
pub mod error;
pub mod model;
pub mod validation;

// Re-export commonly used types
pub use aggregation::{
    group, order, paginate,
    AggregationEngine, CustomerRecord, MergedCustomer, Page, RecordSource,
};
pub use db::{
    setup_database, SqliteRecordSource,
    insert_address_book, get_all_address_books, get_address_book,
    insert_customer, get_customers_by_book, delete_customer,
    get_all_customer_records,
};
pub use error::{AddressBookError, Result};
pub use model::{AddressBook, AddressBookRequest, Customer, CustomerRequest};
pub use validation::Validate;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
