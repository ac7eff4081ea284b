//! Circulation endpoints: issue, return, cancel

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        transaction::{IssueBook, ReturnBook},
        BookTransaction, TransactionStatus,
    },
    services::circulation::AccrualSummary,
    AppState,
};

use super::AuthenticatedUser;

/// Issue response
#[derive(Serialize, ToSchema)]
pub struct IssueResponse {
    pub transaction_id: i32,
    pub due_date: NaiveDate,
    pub status: TransactionStatus,
}

/// Return response
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub transaction_id: i32,
    /// Issue transaction closed by this return
    pub issue_id: Option<i32>,
    pub fine: Decimal,
    pub status: TransactionStatus,
}

/// Issue a book to a member
#[utoipa::path(
    post,
    path = "/transactions/issue",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = IssueBook,
    responses(
        (status = 201, description = "Book issued", body = IssueResponse),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "Out of stock or debt limit reached")
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<IssueBook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<IssueResponse>)> {
    claims.require_write()?;
    let Json(request) = payload?;

    let transaction = state.services.circulation.issue_book(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            transaction_id: transaction.id,
            due_date: transaction.due_date,
            status: transaction.status,
        }),
    ))
}

/// Return a book
#[utoipa::path(
    post,
    path = "/transactions/return",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = ReturnBook,
    responses(
        (status = 201, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Missing or invalid return date"),
        (status = 404, description = "Book or member not found"),
        (status = 409, description = "No outstanding loan to close")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<ReturnBook>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ReturnResponse>)> {
    claims.require_write()?;
    let Json(request) = payload?;

    let transaction = state.services.circulation.return_book(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ReturnResponse {
            transaction_id: transaction.id,
            issue_id: transaction.issue_id,
            fine: transaction.fine_amount,
            status: transaction.status,
        }),
    ))
}

/// Get a transaction
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction", body = BookTransaction),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookTransaction>> {
    let transaction = state.services.circulation.get_transaction(id).await?;
    Ok(Json(transaction))
}

/// Cancel a transaction, reversing its effect on book and member
#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction cancelled", body = BookTransaction),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Nothing left to reverse")
    )
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookTransaction>> {
    claims.require_write()?;
    let transaction = state.services.circulation.cancel_transaction(id).await?;
    Ok(Json(transaction))
}

/// Post late fines accrued up to today on every overdue loan
#[utoipa::path(
    post,
    path = "/transactions/refresh-overdue",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accrual summary", body = AccrualSummary)
    )
)]
pub async fn refresh_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<AccrualSummary>> {
    claims.require_write()?;
    let summary = state.services.circulation.refresh_overdue().await?;
    Ok(Json(summary))
}
