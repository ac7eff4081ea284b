//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, members, transactions};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Circulation API",
        version = "0.1.0",
        description = "Catalog, members and the issue/return ledger"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::search_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        books::bulk_import_books,
        // Members
        members::list_members,
        members::search_members,
        members::get_member,
        members::create_member,
        members::update_member,
        members::delete_member,
        members::get_member_loans,
        members::record_payment,
        // Transactions
        transactions::issue_book,
        transactions::return_book,
        transactions::get_transaction,
        transactions::cancel_transaction,
        transactions::refresh_overdue,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::import_report::BulkImportRequest,
            crate::models::import_report::BulkImportReport,
            crate::models::import_report::ImportError,
            books::CreatedResponse,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::UpdateMember,
            crate::models::member::RecordPayment,
            // Transactions
            crate::models::transaction::BookTransaction,
            crate::models::transaction::TransactionType,
            crate::models::transaction::TransactionStatus,
            crate::models::transaction::IssueBook,
            crate::models::transaction::ReturnBook,
            transactions::IssueResponse,
            transactions::ReturnResponse,
            crate::services::circulation::AccrualSummary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "members", description = "Member management"),
        (name = "transactions", description = "Issue and return ledger")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_circulation_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/transactions/issue"));
        assert!(doc.paths.paths.contains_key("/transactions/return"));
        assert!(doc.paths.paths.contains_key("/books/bulk"));
        assert!(doc
            .components
            .as_ref()
            .map(|c| c.security_schemes.contains_key("bearer_auth"))
            .unwrap_or(false));
    }
}
