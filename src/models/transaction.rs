//! Circulation ledger: issue and return transactions

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

/// Kind of circulation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionType {
    Issue,
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Issue => "Issue",
            TransactionType::Return => "Return",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Issue" => Ok(TransactionType::Issue),
            "Return" => Ok(TransactionType::Return),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

/// Derived state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionStatus {
    Issued,
    Late,
    Returned,
    #[serde(rename = "Late Return")]
    LateReturn,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Issued => "Issued",
            TransactionStatus::Late => "Late",
            TransactionStatus::Returned => "Returned",
            TransactionStatus::LateReturn => "Late Return",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Issued" => Ok(TransactionStatus::Issued),
            "Late" => Ok(TransactionStatus::Late),
            "Returned" => Ok(TransactionStatus::Returned),
            "Late Return" => Ok(TransactionStatus::LateReturn),
            _ => Err(format!("Invalid transaction status: {}", s)),
        }
    }
}

// SQLx conversions: both enums are stored as their TEXT labels
macro_rules! text_enum_sqlx {
    ($ty:ty) => {
        impl sqlx::Type<Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = <String as Decode<Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

text_enum_sqlx!(TransactionType);
text_enum_sqlx!(TransactionStatus);

/// Ledger row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookTransaction {
    pub id: i32,
    pub transaction_type: TransactionType,
    pub book_id: i32,
    pub member_id: i32,
    /// For a Return, the Issue it closed
    pub issue_id: Option<i32>,
    pub date_issued: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub fine_amount: Decimal,
    pub status: TransactionStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookTransaction {
    /// An Issue that has been neither returned nor cancelled
    pub fn is_open_issue(&self) -> bool {
        self.transaction_type == TransactionType::Issue
            && self.return_date.is_none()
            && self.cancelled_at.is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some()
    }
}

/// Ledger row about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub book_id: i32,
    pub member_id: i32,
    pub issue_id: Option<i32>,
    pub date_issued: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub fine_amount: Decimal,
    pub status: TransactionStatus,
}

/// Issue a book to a member
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueBook {
    pub member_id: i32,
    pub book_id: i32,
    /// Defaults to today
    pub date_issued: Option<NaiveDate>,
    /// Defaults to `date_issued` + 14 days
    pub due_date: Option<NaiveDate>,
}

/// Return a book previously issued to a member
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBook {
    pub member_id: i32,
    pub book_id: i32,
    pub return_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&TransactionStatus::LateReturn).unwrap();
        assert_eq!(json, "\"Late Return\"");
        let parsed: TransactionStatus = serde_json::from_str("\"Late Return\"").unwrap();
        assert_eq!(parsed, TransactionStatus::LateReturn);
        assert_eq!("Late Return".parse::<TransactionStatus>().unwrap(), parsed);
    }

    #[test]
    fn test_unknown_labels_rejected() {
        assert!("Lost".parse::<TransactionStatus>().is_err());
        assert!("Renew".parse::<TransactionType>().is_err());
    }
}
