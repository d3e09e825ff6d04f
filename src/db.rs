// SQLite storage layer for address books and customers.
//
// Phone numbers live in a child table keyed (customer_pk, phone_number),
// so a customer's numbers form a real set at the schema level. Deleting a
// customer cascades to its numbers.

use crate::aggregation::{CustomerRecord, RecordSource};
use crate::error::{AddressBookError, Result};
use crate::model::{AddressBook, Customer};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascade deletes rely on this
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Address books
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS address_books (
            pk INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Customers (many per book)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            pk INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address_book_pk INTEGER NOT NULL
                REFERENCES address_books(pk) ON DELETE CASCADE,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Phone numbers (set semantics via the compound primary key)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customer_phone_numbers (
            customer_pk INTEGER NOT NULL
                REFERENCES customers(pk) ON DELETE CASCADE,
            phone_number TEXT NOT NULL,
            PRIMARY KEY (customer_pk, phone_number)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customers_book ON customers(address_book_pk)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ADDRESS BOOK CRUD
// ============================================================================

/// Create a new address book with no customers.
pub fn insert_address_book(conn: &Connection, title: &str) -> Result<AddressBook> {
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO address_books (title, created_at) VALUES (?1, ?2)",
        params![title, created_at.to_rfc3339()],
    )?;

    let pk = conn.last_insert_rowid();
    tracing::debug!(pk, title, "created address book");

    Ok(AddressBook {
        pk,
        title: title.to_string(),
        created_at,
    })
}

pub fn get_all_address_books(conn: &Connection) -> Result<Vec<AddressBook>> {
    let mut stmt = conn.prepare(
        "SELECT pk, title, created_at FROM address_books ORDER BY pk",
    )?;

    let books = stmt
        .query_map([], |row| {
            Ok(AddressBook {
                pk: row.get(0)?,
                title: row.get(1)?,
                created_at: parse_timestamp(row.get::<_, String>(2)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(books)
}

/// Look up one address book, failing with AddressBookNotFound if absent.
pub fn get_address_book(conn: &Connection, pk: i64) -> Result<AddressBook> {
    let mut stmt = conn.prepare(
        "SELECT pk, title, created_at FROM address_books WHERE pk = ?1",
    )?;

    stmt.query_row(params![pk], |row| {
        Ok(AddressBook {
            pk: row.get(0)?,
            title: row.get(1)?,
            created_at: parse_timestamp(row.get::<_, String>(2)?)?,
        })
    })
    .optional()?
    .ok_or(AddressBookError::AddressBookNotFound(pk))
}

// ============================================================================
// CUSTOMER CRUD
// ============================================================================

/// Create a customer inside an existing address book.
///
/// The book is looked up first so an unknown id fails with
/// AddressBookNotFound rather than a foreign key violation.
pub fn insert_customer(
    conn: &Connection,
    address_book_pk: i64,
    name: &str,
    phone_numbers: &BTreeSet<String>,
) -> Result<Customer> {
    let book = get_address_book(conn, address_book_pk)?;
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO customers (name, address_book_pk, created_at) VALUES (?1, ?2, ?3)",
        params![name, book.pk, created_at.to_rfc3339()],
    )?;
    let pk = conn.last_insert_rowid();

    for number in phone_numbers {
        conn.execute(
            "INSERT OR IGNORE INTO customer_phone_numbers (customer_pk, phone_number)
             VALUES (?1, ?2)",
            params![pk, number],
        )?;
    }

    tracing::debug!(pk, name, address_book_pk, "created customer");

    Ok(Customer {
        pk,
        name: name.to_string(),
        phone_numbers: phone_numbers.clone(),
        address_book_pk: book.pk,
        created_at,
    })
}

/// All customers of one address book, with their phone numbers.
pub fn get_customers_by_book(conn: &Connection, address_book_pk: i64) -> Result<Vec<Customer>> {
    // Verify the book exists so unknown ids are a 404, not an empty list.
    get_address_book(conn, address_book_pk)?;

    let mut stmt = conn.prepare(
        "SELECT pk, name, address_book_pk, created_at
         FROM customers WHERE address_book_pk = ?1 ORDER BY pk",
    )?;

    let mut customers = stmt
        .query_map(params![address_book_pk], |row| {
            Ok(Customer {
                pk: row.get(0)?,
                name: row.get(1)?,
                phone_numbers: BTreeSet::new(),
                address_book_pk: row.get(2)?,
                created_at: parse_timestamp(row.get::<_, String>(3)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for customer in &mut customers {
        customer.phone_numbers = get_phone_numbers(conn, customer.pk)?;
    }

    Ok(customers)
}

/// Delete a customer and (via cascade) its phone numbers.
pub fn delete_customer(conn: &Connection, pk: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM customers WHERE pk = ?1", params![pk])?;
    if deleted == 0 {
        return Err(AddressBookError::CustomerNotFound(pk));
    }

    tracing::debug!(pk, "deleted customer");
    Ok(())
}

fn get_phone_numbers(conn: &Connection, customer_pk: i64) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT phone_number FROM customer_phone_numbers WHERE customer_pk = ?1",
    )?;

    let numbers = stmt
        .query_map(params![customer_pk], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<BTreeSet<_>, _>>()?;

    Ok(numbers)
}

// ============================================================================
// RECORD SOURCE (feeds the aggregation engine)
// ============================================================================

/// One CustomerRecord per stored customer row, across every address book.
/// This is the raw, unmerged input the aggregation engine starts from.
pub fn get_all_customer_records(conn: &Connection) -> Result<Vec<CustomerRecord>> {
    let mut stmt = conn.prepare(
        "SELECT c.pk, c.name, p.phone_number
         FROM customers AS c
         LEFT JOIN customer_phone_numbers AS p ON c.pk = p.customer_pk
         ORDER BY c.pk",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Fold join rows back into one record per customer pk.
    let mut records: Vec<CustomerRecord> = Vec::new();
    let mut last_pk: Option<i64> = None;

    for (pk, name, phone_number) in rows {
        if last_pk != Some(pk) {
            records.push(CustomerRecord {
                name,
                phone_numbers: BTreeSet::new(),
            });
            last_pk = Some(pk);
        }
        if let Some(number) = phone_number {
            if let Some(record) = records.last_mut() {
                record.phone_numbers.insert(number);
            }
        }
    }

    Ok(records)
}

/// RecordSource over a live SQLite connection. Any storage failure is
/// reported as SourceUnavailable so the engine never sees SQL details.
pub struct SqliteRecordSource<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRecordSource<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteRecordSource { conn }
    }
}

impl RecordSource for SqliteRecordSource<'_> {
    fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
        get_all_customer_records(self.conn)
            .map_err(|e| AddressBookError::SourceUnavailable(e.to_string()))
    }
}

fn parse_timestamp(raw: String) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

// ============================================================================
// TESTS
// ============================================================================
