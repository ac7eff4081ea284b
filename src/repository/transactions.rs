//! Circulation ledger repository

use chrono::NaiveDate;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{transaction::NewTransaction, BookTransaction},
};

#[derive(Clone)]
pub struct TransactionsRepository {
    pool: Pool<Postgres>,
}

impl TransactionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get transaction by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<BookTransaction> {
        sqlx::query_as::<_, BookTransaction>("SELECT * FROM book_transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Books a member currently has out
    pub async fn open_issues_for_member(&self, member_id: i32) -> AppResult<Vec<BookTransaction>> {
        let loans = sqlx::query_as::<_, BookTransaction>(
            r#"
            SELECT * FROM book_transactions
            WHERE member_id = $1
              AND transaction_type = 'Issue'
              AND return_date IS NULL
              AND cancelled_at IS NULL
            ORDER BY due_date, id
            "#,
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Open issues whose due date is before `today`
    pub async fn overdue_issue_ids(&self, today: NaiveDate) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT id FROM book_transactions
            WHERE transaction_type = 'Issue'
              AND return_date IS NULL
              AND cancelled_at IS NULL
              AND due_date < $1
            ORDER BY id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Lock a ledger row for the rest of the database transaction
    pub async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<BookTransaction> {
        sqlx::query_as::<_, BookTransaction>(
            "SELECT * FROM book_transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    /// Lock the member's oldest open issue of a book, if any
    pub async fn lock_open_issue(
        conn: &mut PgConnection,
        member_id: i32,
        book_id: i32,
    ) -> AppResult<Option<BookTransaction>> {
        let issue = sqlx::query_as::<_, BookTransaction>(
            r#"
            SELECT * FROM book_transactions
            WHERE member_id = $1
              AND book_id = $2
              AND transaction_type = 'Issue'
              AND return_date IS NULL
              AND cancelled_at IS NULL
            ORDER BY date_issued, id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(member_id)
        .bind(book_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(issue)
    }

    pub async fn insert(conn: &mut PgConnection, new: &NewTransaction) -> AppResult<BookTransaction> {
        let transaction = sqlx::query_as::<_, BookTransaction>(
            r#"
            INSERT INTO book_transactions (
                transaction_type, book_id, member_id, issue_id,
                date_issued, due_date, return_date, fine_amount, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(new.transaction_type)
        .bind(new.book_id)
        .bind(new.member_id)
        .bind(new.issue_id)
        .bind(new.date_issued)
        .bind(new.due_date)
        .bind(new.return_date)
        .bind(new.fine_amount)
        .bind(new.status)
        .fetch_one(&mut *conn)
        .await?;
        Ok(transaction)
    }

    /// Persist the derived state of a locked ledger row
    pub async fn save_state(conn: &mut PgConnection, transaction: &BookTransaction) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE book_transactions
            SET return_date = $1, fine_amount = $2, status = $3, cancelled_at = $4, updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(transaction.return_date)
        .bind(transaction.fine_amount)
        .bind(transaction.status)
        .bind(transaction.cancelled_at)
        .bind(transaction.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
