//! Bearer token claims for library staff

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What a token holder may do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    /// Read-only access to catalog, members and ledger
    Viewer,
    /// Full circulation desk access
    Librarian,
}

impl std::str::FromStr for StaffRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(StaffRole::Viewer),
            "librarian" => Ok(StaffRole::Librarian),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffClaims {
    pub sub: String,
    pub role: StaffRole,
    pub exp: i64,
    pub iat: i64,
}

impl StaffClaims {
    pub fn new(sub: impl Into<String>, role: StaffRole, valid_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        let lifetime = i64::try_from(valid_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(3600);
        Self {
            sub: sub.into(),
            role,
            iat: now,
            exp: now.saturating_add(lifetime),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_write(&self) -> Result<(), AppError> {
        match self.role {
            StaffRole::Librarian => Ok(()),
            StaffRole::Viewer => Err(AppError::Authorization(
                "Librarian role required for this operation".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let claims = StaffClaims::new("desk-1", StaffRole::Librarian, 1);
        let token = claims.create_token("secret").unwrap();
        let parsed = StaffClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, "desk-1");
        assert_eq!(parsed.role, StaffRole::Librarian);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = StaffClaims::new("desk-1", StaffRole::Viewer, 1)
            .create_token("secret")
            .unwrap();
        assert!(StaffClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_viewer_cannot_write() {
        assert!(StaffClaims::new("a", StaffRole::Viewer, 1).require_write().is_err());
        assert!(StaffClaims::new("a", StaffRole::Librarian, 1).require_write().is_ok());
    }

    #[test]
    fn test_huge_lifetime_saturates() {
        let claims = StaffClaims::new("desk", StaffRole::Viewer, u64::MAX);
        assert_eq!(claims.exp, i64::MAX);

        let claims = StaffClaims::new("desk", StaffRole::Viewer, 1 << 62);
        assert!(claims.exp > claims.iat);
    }
}
