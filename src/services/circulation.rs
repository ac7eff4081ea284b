//! Circulation service: issue, return, cancel and overdue accrual.
//!
//! Each operation is one database transaction. Rows are locked in a fixed
//! order (book, member, ledger) before the rules run, so concurrent desks
//! serialize on the same book or member instead of racing.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        transaction::{IssueBook, ReturnBook},
        BookTransaction, TransactionType,
    },
    repository::{
        books::BooksRepository, members::MembersRepository,
        transactions::TransactionsRepository, Repository,
    },
    services::rules,
};

/// Outcome of an overdue refresh
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AccrualSummary {
    /// Open issues examined
    pub examined: usize,
    /// Issues whose fine changed
    pub updated: usize,
    /// Total newly posted to member dues
    pub posted: Decimal,
    /// Issues whose accrual failed and was rolled back
    pub failed: usize,
}

impl AccrualSummary {
    /// Tally one loan's outcome; a failure is logged and the sweep goes on
    fn record(&mut self, id: i32, outcome: AppResult<Decimal>) {
        match outcome {
            Ok(posted) if posted.is_zero() => {}
            Ok(posted) => {
                self.updated += 1;
                self.posted += posted;
            }
            Err(e) => {
                tracing::warn!("Overdue refresh: issue id={} skipped: {}", id, e);
                self.failed += 1;
            }
        }
    }
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl CirculationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_transaction(&self, id: i32) -> AppResult<BookTransaction> {
        self.repository.transactions.get_by_id(id).await
    }

    /// Lend a copy of a book to a member
    pub async fn issue_book(&self, request: IssueBook) -> AppResult<BookTransaction> {
        let today = today();
        let date_issued = request.date_issued.unwrap_or(today);

        let mut tx = self.repository.pool.begin().await?;

        let mut book = BooksRepository::lock(&mut tx, request.book_id).await?;
        let mut member = MembersRepository::lock(&mut tx, request.member_id).await?;

        let new = rules::issue(&mut book, &mut member, date_issued, request.due_date, today)
            .map_err(|e| {
                tracing::warn!(
                    "Issue refused: book id={} member id={}: {}",
                    request.book_id, request.member_id, e
                );
                e
            })?;

        BooksRepository::save_availability(&mut tx, &book).await?;
        MembersRepository::save_dues(&mut tx, &member).await?;
        let transaction = TransactionsRepository::insert(&mut tx, &new).await?;

        tx.commit().await?;

        tracing::info!(
            "Issued book id={} to member id={}: transaction id={} due {} ({} left)",
            book.id, member.id, transaction.id, transaction.due_date, book.available_quantity
        );
        Ok(transaction)
    }

    /// Take back a copy, closing the member's oldest open issue of that book
    pub async fn return_book(&self, request: ReturnBook) -> AppResult<BookTransaction> {
        if request.return_date.is_none() {
            return Err(AppError::Validation("return_date is required".to_string()));
        }

        let mut tx = self.repository.pool.begin().await?;

        let mut book = BooksRepository::lock(&mut tx, request.book_id).await?;
        let mut member = MembersRepository::lock(&mut tx, request.member_id).await?;
        let mut issue = TransactionsRepository::lock_open_issue(&mut tx, member.id, book.id)
            .await?
            .ok_or_else(|| {
                AppError::IllegalState(format!(
                    "Member {} has no outstanding loan of book {}",
                    member.id, book.id
                ))
            })?;

        let new = rules::return_book(&mut book, &mut member, &mut issue, request.return_date)?;

        BooksRepository::save_availability(&mut tx, &book).await?;
        MembersRepository::save_dues(&mut tx, &member).await?;
        TransactionsRepository::save_state(&mut tx, &issue).await?;
        let transaction = TransactionsRepository::insert(&mut tx, &new).await?;

        tx.commit().await?;

        tracing::info!(
            "Returned book id={} from member id={}: transaction id={} closes issue id={}, fine {} ({})",
            book.id, member.id, transaction.id, issue.id, transaction.fine_amount, transaction.status
        );
        Ok(transaction)
    }

    /// Reverse the effects of an issue or return
    pub async fn cancel_transaction(&self, id: i32) -> AppResult<BookTransaction> {
        // Unlocked read to learn which book and member to lock first
        let target = self.repository.transactions.get_by_id(id).await?;

        let mut tx = self.repository.pool.begin().await?;

        let mut book = BooksRepository::lock(&mut tx, target.book_id).await?;
        let mut member = MembersRepository::lock(&mut tx, target.member_id).await?;
        let mut transaction = TransactionsRepository::lock(&mut tx, id).await?;

        match transaction.transaction_type {
            TransactionType::Issue => {
                rules::cancel_issue(&mut book, &mut member, &mut transaction, Utc::now())?;
            }
            TransactionType::Return => {
                let issue_id = transaction.issue_id.ok_or_else(|| {
                    AppError::IllegalState(format!(
                        "Return {} is not linked to an issue",
                        transaction.id
                    ))
                })?;
                let mut issue = TransactionsRepository::lock(&mut tx, issue_id).await?;
                rules::cancel_return(
                    &mut book,
                    &mut member,
                    &mut transaction,
                    &mut issue,
                    today(),
                    Utc::now(),
                )?;
                TransactionsRepository::save_state(&mut tx, &issue).await?;
            }
        }

        BooksRepository::save_availability(&mut tx, &book).await?;
        MembersRepository::save_dues(&mut tx, &member).await?;
        TransactionsRepository::save_state(&mut tx, &transaction).await?;

        tx.commit().await?;

        tracing::info!(
            "Cancelled {} transaction id={} (book id={}, member id={})",
            transaction.transaction_type.as_str(),
            transaction.id,
            book.id,
            member.id
        );
        Ok(transaction)
    }

    /// Bring every overdue open issue's fine up to today
    pub async fn refresh_overdue(&self) -> AppResult<AccrualSummary> {
        let today = today();
        let ids = self.repository.transactions.overdue_issue_ids(today).await?;

        let mut summary = AccrualSummary {
            examined: ids.len(),
            ..Default::default()
        };

        for id in ids {
            let outcome = self.accrue_one(id, today).await;
            summary.record(id, outcome);
        }

        tracing::info!(
            "Overdue refresh: {} examined, {} updated, {} posted, {} failed",
            summary.examined, summary.updated, summary.posted, summary.failed
        );
        Ok(summary)
    }

    async fn accrue_one(&self, id: i32, today: NaiveDate) -> AppResult<Decimal> {
        let target = self.repository.transactions.get_by_id(id).await?;

        let mut tx = self.repository.pool.begin().await?;
        let mut member = MembersRepository::lock(&mut tx, target.member_id).await?;
        let mut issue = TransactionsRepository::lock(&mut tx, id).await?;

        // Returned or cancelled since it was listed
        if !issue.is_open_issue() {
            return Ok(Decimal::ZERO);
        }

        let posted = rules::accrue(&mut issue, &mut member, today)?;
        if !posted.is_zero() {
            MembersRepository::save_dues(&mut tx, &member).await?;
            TransactionsRepository::save_state(&mut tx, &issue).await?;
            tx.commit().await?;
            tracing::debug!("Accrued {} on issue id={} (member id={})", posted, id, member.id);
        }
        Ok(posted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_accrual_does_not_stop_the_tally() {
        let mut summary = AccrualSummary { examined: 4, ..Default::default() };

        summary.record(1, Ok(Decimal::from(30)));
        summary.record(2, Err(AppError::NotFound("Transaction with id 2 not found".to_string())));
        summary.record(3, Ok(Decimal::ZERO));
        summary.record(4, Ok(Decimal::from(20)));

        assert_eq!(summary.updated, 2);
        assert_eq!(summary.posted, Decimal::from(50));
        assert_eq!(summary.failed, 1);
    }
}
