//! Member model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Hard ceiling for any member's debt limit
pub const MAX_DEBT_LIMIT: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Member model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub full_name: String,
    pub email: Option<String>,
    /// Unpaid fines
    pub outstanding_dues: Decimal,
    /// Issues are refused once dues reach this amount
    pub debt_limit: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateMember {
    pub full_name: String,
    pub email: Option<String>,
    /// Defaults to 0
    pub outstanding_dues: Option<Decimal>,
    /// Defaults to the system ceiling (500)
    pub debt_limit: Option<Decimal>,
}

/// Update member request. Dues are not editable here; see payments.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateMember {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub debt_limit: Option<Decimal>,
}

/// Payment towards a member's outstanding dues
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecordPayment {
    pub amount: Decimal,
}

/// Normalized, validated content of a member record
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct MemberFields {
    #[validate(length(min = 1, message = "Member Full Name is required."))]
    pub full_name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub outstanding_dues: Decimal,
    pub debt_limit: Decimal,
}

impl MemberFields {
    /// Trim and lower-case, then check every per-record rule.
    /// Email uniqueness is checked by the members service.
    pub fn normalized(self) -> AppResult<Self> {
        self.checked(true)
    }

    /// Accrued fines may already exceed the limit; that only blocks a new
    /// limit, not profile edits.
    fn checked(mut self, enforce_ceiling: bool) -> AppResult<Self> {
        self.full_name = self.full_name.trim().to_string();
        self.email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        self.validate()?;

        if self.outstanding_dues < Decimal::ZERO {
            return Err(AppError::Validation("Outstanding dues cannot be negative.".to_string()));
        }
        if self.debt_limit < Decimal::ZERO {
            return Err(AppError::Validation("Debt limit cannot be negative.".to_string()));
        }
        if self.debt_limit > MAX_DEBT_LIMIT {
            return Err(AppError::Validation(format!(
                "Debt limit cannot exceed {}.",
                MAX_DEBT_LIMIT
            )));
        }
        if enforce_ceiling && self.outstanding_dues > self.debt_limit {
            return Err(AppError::Validation(format!(
                "Outstanding dues ({}) exceed allowed debt limit ({}).",
                self.outstanding_dues, self.debt_limit
            )));
        }

        Ok(self)
    }

    /// Apply an allow-listed update
    pub fn apply(mut self, update: UpdateMember) -> AppResult<Self> {
        let limit_changed = update.debt_limit.is_some();
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(email) = update.email {
            self.email = Some(email);
        }
        if let Some(debt_limit) = update.debt_limit {
            self.debt_limit = debt_limit;
        }
        self.checked(limit_changed)
    }
}

impl From<CreateMember> for MemberFields {
    fn from(create: CreateMember) -> Self {
        Self {
            full_name: create.full_name,
            email: create.email,
            outstanding_dues: create.outstanding_dues.unwrap_or(Decimal::ZERO),
            debt_limit: create.debt_limit.unwrap_or(MAX_DEBT_LIMIT),
        }
    }
}

impl From<&Member> for MemberFields {
    fn from(member: &Member) -> Self {
        Self {
            full_name: member.full_name.clone(),
            email: member.email.clone(),
            outstanding_dues: member.outstanding_dues,
            debt_limit: member.debt_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, email: Option<&str>, dues: i64, limit: Option<i64>) -> CreateMember {
        CreateMember {
            full_name: name.to_string(),
            email: email.map(str::to_string),
            outstanding_dues: Some(Decimal::from(dues)),
            debt_limit: limit.map(Decimal::from),
        }
    }

    #[test]
    fn test_defaults() {
        let fields = MemberFields::from(CreateMember {
            full_name: "Ada Lovelace".to_string(),
            email: None,
            outstanding_dues: None,
            debt_limit: None,
        })
        .normalized()
        .unwrap();
        assert_eq!(fields.outstanding_dues, Decimal::ZERO);
        assert_eq!(fields.debt_limit, Decimal::from(500));
    }

    #[test]
    fn test_email_is_lowercased() {
        let fields = MemberFields::from(create("Ada", Some("  Ada@Example.ORG "), 0, None))
            .normalized()
            .unwrap();
        assert_eq!(fields.email.as_deref(), Some("ada@example.org"));
    }

    #[test]
    fn test_invalid_email_rejected() {
        let err = MemberFields::from(create("Ada", Some("not-an-email"), 0, None))
            .normalized()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_name_required() {
        assert!(MemberFields::from(create("  ", None, 0, None)).normalized().is_err());
    }

    #[test]
    fn test_debt_rules() {
        assert!(MemberFields::from(create("Ada", None, -1, None)).normalized().is_err());
        assert!(MemberFields::from(create("Ada", None, 0, Some(-5))).normalized().is_err());
        assert!(MemberFields::from(create("Ada", None, 0, Some(501))).normalized().is_err());
        assert!(MemberFields::from(create("Ada", None, 100, Some(50))).normalized().is_err());
        assert!(MemberFields::from(create("Ada", None, 500, Some(500))).normalized().is_ok());
        assert!(MemberFields::from(create("Ada", None, 0, Some(0))).normalized().is_ok());
    }

    #[test]
    fn test_update_cannot_touch_dues() {
        let parsed: Result<UpdateMember, _> =
            serde_json::from_str(r#"{"outstanding_dues": "0"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_lowering_limit_below_dues_rejected() {
        let fields = MemberFields::from(create("Ada", None, 120, Some(200))).normalized().unwrap();
        let err = fields
            .apply(UpdateMember { debt_limit: Some(Decimal::from(100)), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_rename_allowed_when_fines_exceed_limit() {
        let member = Member {
            id: 3,
            full_name: "Ada".to_string(),
            email: None,
            outstanding_dues: Decimal::from(510),
            debt_limit: Decimal::from(500),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let fields = MemberFields::from(&member)
            .apply(UpdateMember {
                full_name: Some("Ada King".to_string()),
                email: Some("ada@example.org".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(fields.full_name, "Ada King");
        assert_eq!(fields.outstanding_dues, Decimal::from(510));

        let err = MemberFields::from(&member)
            .apply(UpdateMember { debt_limit: Some(Decimal::from(500)), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
