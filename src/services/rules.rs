//! Circulation rules.
//!
//! Pure functions over in-memory records. They never touch the database:
//! the circulation service loads and locks the rows, calls these, then
//! writes the mutated records back inside the same database transaction.
//!
//! Fines are always recomputed from dates. An open Issue's `fine_amount`
//! is the amount already posted to the member for that loan, so accrual
//! only ever posts the difference and repeating it is harmless.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        transaction::NewTransaction, Book, BookTransaction, Member, TransactionStatus,
        TransactionType,
    },
};

/// Default loan period
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Fine per day past the due date
pub const FINE_PER_DAY: Decimal = Decimal::TEN;

pub fn default_due_date(date_issued: NaiveDate) -> AppResult<NaiveDate> {
    date_issued
        .checked_add_signed(Duration::days(LOAN_PERIOD_DAYS))
        .ok_or_else(|| {
            AppError::Validation(format!("Issue date {} is out of range", date_issued))
        })
}

/// Whole days between `due_date` and `on`, zero when not late
pub fn days_late(due_date: NaiveDate, on: NaiveDate) -> i64 {
    (on - due_date).num_days().max(0)
}

pub fn fine_for(due_date: NaiveDate, on: NaiveDate) -> Decimal {
    Decimal::from(days_late(due_date, on)) * FINE_PER_DAY
}

/// Status of a loan still out on `today`
pub fn open_status(due_date: NaiveDate, today: NaiveDate) -> TransactionStatus {
    if today > due_date {
        TransactionStatus::Late
    } else {
        TransactionStatus::Issued
    }
}

pub fn return_status(due_date: NaiveDate, return_date: NaiveDate) -> TransactionStatus {
    if return_date > due_date {
        TransactionStatus::LateReturn
    } else {
        TransactionStatus::Returned
    }
}

/// Move `member`'s dues by `delta`, never below zero
fn adjust_dues(member: &mut Member, delta: Decimal) {
    member.outstanding_dues = (member.outstanding_dues + delta).max(Decimal::ZERO);
}

/// Admit and apply an Issue. Nothing is mutated when it is refused.
pub fn issue(
    book: &mut Book,
    member: &mut Member,
    date_issued: NaiveDate,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<NewTransaction> {
    let due_date = match due_date {
        Some(due_date) => due_date,
        None => default_due_date(date_issued)?,
    };
    if due_date < date_issued {
        return Err(AppError::Validation(format!(
            "Due date {} is before issue date {}",
            due_date, date_issued
        )));
    }

    if book.available_quantity <= 0 {
        return Err(AppError::OutOfStock(format!(
            "No available copies of \"{}\"",
            book.title
        )));
    }

    if member.outstanding_dues >= member.debt_limit {
        return Err(AppError::DebtLimitExceeded(format!(
            "Member {} owes {} which reaches the debt limit of {}",
            member.id, member.outstanding_dues, member.debt_limit
        )));
    }

    book.available_quantity -= 1;

    // A backdated issue can already be overdue
    let fine_amount = fine_for(due_date, today);
    adjust_dues(member, fine_amount);

    Ok(NewTransaction {
        transaction_type: TransactionType::Issue,
        book_id: book.id,
        member_id: member.id,
        issue_id: None,
        date_issued,
        due_date,
        return_date: None,
        fine_amount,
        status: open_status(due_date, today),
    })
}

/// Bring an open Issue's fine and status up to `today`, posting only the
/// difference to the member. Returns the amount posted.
pub fn accrue(
    open_issue: &mut BookTransaction,
    member: &mut Member,
    today: NaiveDate,
) -> AppResult<Decimal> {
    if !open_issue.is_open_issue() {
        return Err(AppError::IllegalState(format!(
            "Transaction {} is not an open issue",
            open_issue.id
        )));
    }

    let fresh = fine_for(open_issue.due_date, today);
    let delta = fresh - open_issue.fine_amount;

    open_issue.fine_amount = fresh;
    open_issue.status = open_status(open_issue.due_date, today);
    adjust_dues(member, delta);

    Ok(delta)
}

/// Close `open_issue` with a Return on `return_date`.
///
/// The member ends up charged exactly the fine for this loan, whatever was
/// accrued on the Issue before.
pub fn return_book(
    book: &mut Book,
    member: &mut Member,
    open_issue: &mut BookTransaction,
    return_date: Option<NaiveDate>,
) -> AppResult<NewTransaction> {
    let return_date = return_date
        .ok_or_else(|| AppError::Validation("return_date is required".to_string()))?;

    if !open_issue.is_open_issue() {
        return Err(AppError::IllegalState(format!(
            "Transaction {} is not an open issue",
            open_issue.id
        )));
    }
    if return_date < open_issue.date_issued {
        return Err(AppError::Validation(format!(
            "Return date {} is before issue date {}",
            return_date, open_issue.date_issued
        )));
    }
    if book.available_quantity >= book.quantity {
        return Err(AppError::IllegalState(format!(
            "All copies of book {} are already on the shelf",
            book.id
        )));
    }

    book.available_quantity += 1;

    let fine_amount = fine_for(open_issue.due_date, return_date);
    let status = return_status(open_issue.due_date, return_date);
    adjust_dues(member, fine_amount - open_issue.fine_amount);

    open_issue.return_date = Some(return_date);
    open_issue.fine_amount = fine_amount;
    open_issue.status = status;

    Ok(NewTransaction {
        transaction_type: TransactionType::Return,
        book_id: book.id,
        member_id: member.id,
        issue_id: Some(open_issue.id),
        date_issued: open_issue.date_issued,
        due_date: open_issue.due_date,
        return_date: Some(return_date),
        fine_amount,
        status,
    })
}

/// Undo an Issue that is still out: copy back on the shelf, fine removed
pub fn cancel_issue(
    book: &mut Book,
    member: &mut Member,
    issue: &mut BookTransaction,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if issue.is_cancelled() {
        return Err(AppError::IllegalState(format!(
            "Transaction {} is already cancelled",
            issue.id
        )));
    }
    if !issue.is_open_issue() {
        return Err(AppError::IllegalState(format!(
            "Issue {} has been returned; cancel the return first",
            issue.id
        )));
    }
    if book.available_quantity >= book.quantity {
        return Err(AppError::IllegalState(format!(
            "No copy of book {} is out to put back",
            book.id
        )));
    }

    book.available_quantity += 1;
    adjust_dues(member, -issue.fine_amount);
    issue.cancelled_at = Some(now);

    Ok(())
}

/// Undo a Return: the copy goes back out and the loan reopens, re-accrued
/// against `today`.
pub fn cancel_return(
    book: &mut Book,
    member: &mut Member,
    ret: &mut BookTransaction,
    issue: &mut BookTransaction,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if ret.is_cancelled() {
        return Err(AppError::IllegalState(format!(
            "Transaction {} is already cancelled",
            ret.id
        )));
    }
    if ret.transaction_type != TransactionType::Return || ret.issue_id != Some(issue.id) {
        return Err(AppError::IllegalState(format!(
            "Transaction {} did not close issue {}",
            ret.id, issue.id
        )));
    }
    if issue.is_cancelled() || issue.return_date.is_none() {
        return Err(AppError::IllegalState(format!(
            "Issue {} is not closed",
            issue.id
        )));
    }
    if book.available_quantity <= 0 {
        return Err(AppError::IllegalState(format!(
            "No copy of book {} is on the shelf to take back out",
            book.id
        )));
    }

    book.available_quantity -= 1;
    adjust_dues(member, -issue.fine_amount);
    ret.cancelled_at = Some(now);

    issue.return_date = None;
    issue.fine_amount = Decimal::ZERO;
    issue.status = open_status(issue.due_date, today);
    accrue(issue, member, today)?;

    Ok(())
}

/// Apply a payment towards outstanding dues
pub fn pay(member: &mut Member, amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Payment amount must be positive".to_string()));
    }
    if amount > member.outstanding_dues {
        return Err(AppError::Validation(format!(
            "Payment {} exceeds outstanding dues {}",
            amount, member.outstanding_dues
        )));
    }
    member.outstanding_dues -= amount;
    Ok(())
}
