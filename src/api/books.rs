//! Catalog endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        book::{CreateBook, UpdateBook},
        import_report::{BulkImportReport, BulkImportRequest},
        Book, ListQuery, SearchQuery,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Identifier of a newly created record
#[derive(Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: i32,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Books ordered by title", body = Vec<Book>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books(&query).await?;
    Ok(Json(books))
}

/// Search books by title or author
#[utoipa::path(
    get,
    path = "/books/search",
    tag = "books",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "Up to 20 matching books", body = Vec<Book>)
    )
)]
pub async fn search_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.search_books(query.q.as_deref()).await?;
    Ok(Json(books))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = CreatedResponse),
        (status = 400, description = "Invalid book fields"),
        (status = 409, description = "ISBN already used")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    claims.require_write()?;
    let Json(data) = payload?;
    let book = state.services.catalog.create_book(data).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: book.id })))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid book fields"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "ISBN already used")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> AppResult<Json<Book>> {
    claims.require_write()?;
    let Json(data) = payload?;
    let book = state.services.catalog.update_book(id, data).await?;
    Ok(Json(book))
}

/// Delete a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book has circulation history")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_write()?;
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Import a batch of books; each record succeeds or fails on its own
#[utoipa::path(
    post,
    path = "/books/bulk",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BulkImportRequest,
    responses(
        (status = 200, description = "Created ids and per-record errors", body = BulkImportReport),
        (status = 400, description = "Batch could not be decoded")
    )
)]
pub async fn bulk_import_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<BulkImportRequest>, JsonRejection>,
) -> AppResult<Json<BulkImportReport>> {
    claims.require_write()?;
    let Json(request) = payload?;
    let report = state.services.catalog.bulk_import(request).await?;
    Ok(Json(report))
}
