//! Member management endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        member::{CreateMember, RecordPayment, UpdateMember},
        BookTransaction, ListQuery, Member, SearchQuery,
    },
    AppState,
};

use super::{books::CreatedResponse, AuthenticatedUser};

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Members ordered by name", body = Vec<Member>)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list_members(&query).await?;
    Ok(Json(members))
}

/// Search members by name or email
#[utoipa::path(
    get,
    path = "/members/search",
    tag = "members",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "Up to 20 matching members", body = Vec<Member>)
    )
)]
pub async fn search_members(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.search_members(query.q.as_deref()).await?;
    Ok(Json(members))
}

/// Get member details by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Create a member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = CreatedResponse),
        (status = 400, description = "Invalid member fields"),
        (status = 409, description = "Email already used")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<CreateMember>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    claims.require_write()?;
    let Json(data) = payload?;
    let member = state.services.members.create_member(data).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: member.id })))
}

/// Update a member
#[utoipa::path(
    put,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = UpdateMember,
    responses(
        (status = 200, description = "Member updated", body = Member),
        (status = 400, description = "Invalid member fields"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Email already used")
    )
)]
pub async fn update_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateMember>, JsonRejection>,
) -> AppResult<Json<Member>> {
    claims.require_write()?;
    let Json(data) = payload?;
    let member = state.services.members.update_member(id, data).await?;
    Ok(Json(member))
}

/// Delete a member
#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 204, description = "Member deleted"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Member has circulation history")
    )
)]
pub async fn delete_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_write()?;
    state.services.members.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Books a member currently has out
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Open issue transactions", body = Vec<BookTransaction>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member_loans(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<BookTransaction>>> {
    let loans = state.services.members.member_loans(id).await?;
    Ok(Json(loans))
}

/// Record a payment towards outstanding dues
#[utoipa::path(
    post,
    path = "/members/{id}/payments",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    request_body = RecordPayment,
    responses(
        (status = 200, description = "Payment applied", body = Member),
        (status = 400, description = "Amount not positive or above dues"),
        (status = 404, description = "Member not found")
    )
)]
pub async fn record_payment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    payload: Result<Json<RecordPayment>, JsonRejection>,
) -> AppResult<Json<Member>> {
    claims.require_write()?;
    let Json(payment) = payload?;
    let member = state.services.members.record_payment(id, payment.amount).await?;
    Ok(Json(member))
}
