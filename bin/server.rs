// Address Book Service - REST API with Axum
//
// CRUD over address books and their customers, plus the unique-customer
// endpoint backed by the aggregation engine. One SQLite connection shared
// behind a mutex; every aggregation request reads a fresh snapshot.

use address_book::{
    db, AddressBookError, AddressBookRequest, AggregationEngine, CustomerRequest,
    SqliteRecordSource, Validate,
};
use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

// ============================================================================
// Request / response types
// ============================================================================

/// Pagination query parameters. Defaulting (page 0, pageSize 20) lives
/// here in the transport layer; the engine itself never defaults.
#[derive(Deserialize)]
struct PageParams {
    #[serde(default)]
    page: i64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    page_size: i64,
}

fn default_page_size() -> i64 {
    20
}

#[derive(Serialize)]
struct AddressBookResponse {
    id: i64,
    title: String,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct CustomerResponse {
    id: i64,
    name: String,
    #[serde(rename = "phoneNumbers")]
    phone_numbers: BTreeSet<String>,
}

/// Error body matching the rest of the API: { "errors": [...] }
#[derive(Serialize)]
struct ErrorBody {
    errors: Vec<String>,
}

impl From<address_book::AddressBook> for AddressBookResponse {
    fn from(book: address_book::AddressBook) -> Self {
        Self {
            id: book.pk,
            title: book.title,
            created_at: book.created_at,
        }
    }
}

impl From<address_book::Customer> for CustomerResponse {
    fn from(customer: address_book::Customer) -> Self {
        Self {
            id: customer.pk,
            name: customer.name,
            phone_numbers: customer.phone_numbers,
        }
    }
}

fn error_response(err: AddressBookError) -> Response {
    let status = match &err {
        AddressBookError::AddressBookNotFound(_) | AddressBookError::CustomerNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AddressBookError::Validation(_) | AddressBookError::InvalidPaginationRequest { .. } => {
            StatusCode::BAD_REQUEST
        }
        AddressBookError::SourceUnavailable(_) | AddressBookError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }

    let errors = match err {
        AddressBookError::Validation(messages) => messages,
        other => vec![other.to_string()],
    };

    (status, Json(ErrorBody { errors })).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK", "version": address_book::VERSION }))
}

/// GET /address-book/books - All address books
async fn get_address_books(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_all_address_books(&conn) {
        Ok(books) => {
            let response: Vec<AddressBookResponse> =
                books.into_iter().map(|b| b.into()).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /address-book/books - Create a new address book
async fn create_address_book(
    State(state): State<AppState>,
    Json(request): Json<AddressBookRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return error_response(e);
    }

    let conn = state.db.lock().unwrap();
    match db::insert_address_book(&conn, &request.title) {
        Ok(book) => {
            (StatusCode::CREATED, Json(AddressBookResponse::from(book))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /address-book/books/:book_id/customers - Customers of one book
async fn get_book_customers(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::get_customers_by_book(&conn, book_id) {
        Ok(customers) => {
            let response: Vec<CustomerResponse> =
                customers.into_iter().map(|c| c.into()).collect();
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /address-book/books/:book_id/customers - Create a customer
async fn create_customer(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
    Json(request): Json<CustomerRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return error_response(e);
    }

    let conn = state.db.lock().unwrap();
    match db::insert_customer(&conn, book_id, &request.name, &request.phone_numbers) {
        Ok(customer) => {
            (StatusCode::CREATED, Json(CustomerResponse::from(customer))).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// DELETE /address-book/customers/:customer_id - Delete a customer
async fn remove_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<i64>,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::delete_customer(&conn, customer_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /address-book/customers?page=&pageSize= - Unique customers across
/// all books, merged by name, sorted, paginated.
async fn get_unique_customers(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Response {
    let conn = state.db.lock().unwrap();
    let engine = AggregationEngine::new(SqliteRecordSource::new(&conn));

    match engine.aggregate(params.page, params.page_size) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => error_response(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("address_book=info,address_book_server=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/books", get(get_address_books).post(create_address_book))
        .route(
            "/books/:book_id/customers",
            get(get_book_customers).post(create_customer),
        )
        .route("/customers/:customer_id", delete(remove_customer))
        .route("/customers", get(get_unique_customers))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/address-book", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let db_path =
        std::env::var("ADDRESS_BOOK_DB").unwrap_or_else(|_| "address-book.db".to_string());
    let addr =
        std::env::var("ADDRESS_BOOK_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path))?;
    address_book::setup_database(&conn)?;
    tracing::info!(db_path = %db_path, "database ready");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!(addr = %addr, "address book server running");

    axum::serve(listener, build_router(state))
        .await
        .context("Server exited with error")?;

    Ok(())
}
