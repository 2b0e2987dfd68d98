//! Session extraction
//!
//! Identity is issued by an external provider sitting in front of this
//! service; it forwards the authenticated subject as `x-user-id` and
//! `x-user-role` headers. This module only reads those headers and gates
//! privileged routes on the staff roles.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Support,
    Customer,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "support" => Some(Role::Support),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }

    /// Roles allowed into the back office.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Manager)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

impl Session {
    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)
        };
        let user_id = header("x-user-id")?
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized)?;
        let role = Role::parse(header("x-user-role")?).ok_or(ApiError::Unauthorized)?;
        Ok(Session { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("OWNER"), Some(Role::Owner));
        assert_eq!(Role::parse("intruder"), None);
    }

    #[test]
    fn test_staff_gate() {
        for role in [Role::Owner, Role::Admin, Role::Manager] {
            assert!(role.is_staff());
        }
        for role in [Role::Support, Role::Customer] {
            assert!(!role.is_staff());
        }
    }
}
