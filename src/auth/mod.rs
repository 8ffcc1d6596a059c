//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified user id,
//! role and optional employee link as request headers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::entities::Role;
use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const EMPLOYEE_ID_HEADER: &str = "x-employee-id";

/// The authenticated caller of a workflow operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
    pub employee_id: Option<i32>,
}

impl Actor {
    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            employee_id: None,
        }
    }

    pub fn employee(user_id: Uuid, employee_id: i32) -> Self {
        Self {
            user_id,
            role: Role::User,
            employee_id: Some(employee_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "User {} is not an administrator",
                self.user_id
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, ServiceError> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()))
            .map_err(|_| ServiceError::Unauthorized(format!("Header {} is not valid text", name))),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER)?
            .ok_or_else(|| ServiceError::Unauthorized("Missing caller identity".to_string()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| ServiceError::Unauthorized("Caller identity is not a UUID".to_string()))?;

        let role = match header(parts, USER_ROLE_HEADER)? {
            Some(role) => role.parse::<Role>().map_err(ServiceError::Unauthorized)?,
            None => Role::User,
        };

        let employee_id = header(parts, EMPLOYEE_ID_HEADER)?
            .map(|id| {
                id.parse::<i32>().map_err(|_| {
                    ServiceError::InvalidInput(format!("Invalid employee id '{}'", id))
                })
            })
            .transpose()?;

        Ok(Actor {
            user_id,
            role,
            employee_id,
        })
    }
}
