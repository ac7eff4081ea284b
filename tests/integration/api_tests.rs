//! API integration tests
//!
//! These run against a live server backed by a migrated database.

use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use library_circulation::models::{StaffClaims, StaffRole};

const BASE_URL: &str = "http://localhost:8080/api/v1";

/// Token for the running server: taken from the environment, or minted with
/// the secret the server is expected to use
fn auth_token() -> String {
    if let Ok(token) = std::env::var("CIRCULATION_TEST_TOKEN") {
        return token;
    }
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| library_circulation::AppConfig::default().auth.jwt_secret);
    StaffClaims::new("integration-tests", StaffRole::Librarian, 1)
        .create_token(&secret)
        .expect("Failed to mint token")
}

/// Unique suffix so repeated runs do not collide on ISBN or email
fn unique() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("Not a decimal"),
        other => other.to_string().parse().expect("Not a decimal"),
    }
}

async fn create_book(client: &Client, token: &str, quantity: i32) -> i64 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "title": "Structure and Interpretation of Computer Programs",
            "author": "Abelson, Sussman",
            "quantity": quantity
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No id in response")
}

async fn create_member(client: &Client, token: &str) -> i64 {
    let response = client
        .post(format!("{}/members", BASE_URL))
        .bearer_auth(token)
        .json(&json!({
            "full_name": "Grace Hopper",
            "email": format!("grace.{}@example.org", unique())
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No id in response")
}

async fn issue(client: &Client, token: &str, member_id: i64, book_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/transactions/issue", BASE_URL))
        .bearer_auth(token)
        .json(&json!({ "member_id": member_id, "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/members", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn_is_rejected() {
    let client = Client::new();
    let token = auth_token();
    let isbn = format!("978-{}", unique() % 1_000_000_000);

    let first = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "title": "Refactoring", "author": "Fowler", "isbn": isbn, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "title": "Refactoring 2nd ed.", "author": "Fowler", "isbn": isbn, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body: Value = second.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
#[ignore]
async fn test_issue_and_return_round_trip() {
    let client = Client::new();
    let token = auth_token();
    let book_id = create_book(&client, &token, 2).await;
    let member_id = create_member(&client, &token).await;

    let response = issue(&client, &token, member_id, book_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(issued["status"], "Issued");
    let issue_id = issued["transaction_id"].as_i64().unwrap();

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 1);

    let loans: Value = client
        .get(format!("{}/members/{}/loans", BASE_URL, member_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(loans.as_array().map(Vec::len), Some(1));

    let today = chrono::Utc::now().date_naive();
    let response = client
        .post(format!("{}/transactions/return", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "member_id": member_id, "book_id": book_id, "return_date": today }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["issue_id"].as_i64(), Some(issue_id));
    assert_eq!(returned["status"], "Returned");
    assert_eq!(decimal(&returned["fine"]), Decimal::ZERO);

    // Nothing left to return
    let again = client
        .post(format!("{}/transactions/return", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "member_id": member_id, "book_id": book_id, "return_date": today }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_overdue_return_charges_fine() {
    let client = Client::new();
    let token = auth_token();
    let book_id = create_book(&client, &token, 1).await;
    let member_id = create_member(&client, &token).await;

    let today = chrono::Utc::now().date_naive();
    let issued_on = today - chrono::Duration::days(19);
    let due = issued_on + chrono::Duration::days(14);

    let response = client
        .post(format!("{}/transactions/issue", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "member_id": member_id,
            "book_id": book_id,
            "date_issued": issued_on,
            "due_date": due
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(issued["status"], "Late");

    let response = client
        .post(format!("{}/transactions/return", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "member_id": member_id, "book_id": book_id, "return_date": today }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let returned: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(returned["status"], "Late Return");
    assert_eq!(decimal(&returned["fine"]), Decimal::from(50));

    // The fine posted at issue time is not charged a second time
    let member: Value = client
        .get(format!("{}/members/{}", BASE_URL, member_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(decimal(&member["outstanding_dues"]), Decimal::from(50));

    let response = client
        .post(format!("{}/members/{}/payments", BASE_URL, member_id))
        .bearer_auth(&token)
        .json(&json!({ "amount": "20" }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let member: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(decimal(&member["outstanding_dues"]), Decimal::from(30));
}

#[tokio::test]
#[ignore]
async fn test_issue_out_of_stock() {
    let client = Client::new();
    let token = auth_token();
    let book_id = create_book(&client, &token, 0).await;
    let member_id = create_member(&client, &token).await;

    let response = issue(&client, &token, member_id, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "OutOfStock");
}

#[tokio::test]
#[ignore]
async fn test_concurrent_issue_of_last_copy() {
    let client = Client::new();
    let token = auth_token();
    let book_id = create_book(&client, &token, 1).await;
    let first_member = create_member(&client, &token).await;
    let second_member = create_member(&client, &token).await;

    let (a, b) = tokio::join!(
        issue(&client, &token, first_member, book_id),
        issue(&client, &token, second_member, book_id)
    );

    let mut statuses = [a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
#[ignore]
async fn test_cancel_issue_restores_stock() {
    let client = Client::new();
    let token = auth_token();
    let book_id = create_book(&client, &token, 1).await;
    let member_id = create_member(&client, &token).await;

    let issued: Value = issue(&client, &token, member_id, book_id)
        .await
        .json()
        .await
        .expect("Failed to parse response");
    let issue_id = issued["transaction_id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/transactions/{}/cancel", BASE_URL, issue_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["available_quantity"], 1);

    let twice = client
        .post(format!("{}/transactions/{}/cancel", BASE_URL, issue_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(twice.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_bulk_import_reports_partial_failure() {
    let client = Client::new();
    let token = auth_token();

    let response = client
        .post(format!("{}/books/bulk", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "records": [
                { "title": "The Mythical Man-Month", "author": "Brooks", "quantity": 3 },
                { "title": "", "author": "Nobody", "quantity": 1 },
                { "title": "Peopleware", "author": "DeMarco, Lister", "quantity": -1 }
            ]
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let report: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(report["created_ids"].as_array().map(Vec::len), Some(1));

    let failed: Vec<u64> = report["errors"]
        .as_array()
        .expect("No errors in report")
        .iter()
        .filter_map(|e| e["index"].as_u64())
        .collect();
    assert_eq!(failed, vec![1, 2]);
}
