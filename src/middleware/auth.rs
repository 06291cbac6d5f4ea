use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, models::Role, state::AppState};

/// Verified identity attached to a request. Token verification is the
/// only authentication concern here; issuing credentials belongs to the
/// identity provider.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin)
}

/// Admins pass seller gates too; they manage seller resources.
pub fn ensure_seller(user: &AuthUser) -> Result<(), AppError> {
    if user.role == Role::Seller || user.role == Role::Admin {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Unauthorized);
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized)?;

        let user_id =
            Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthorized)?;
        let role = Role::parse(&decoded.claims.role).ok_or(AppError::Unauthorized)?;

        Ok(AuthUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn admin_gate_rejects_non_admins() {
        assert!(ensure_admin(&auth(Role::Admin)).is_ok());
        assert!(matches!(
            ensure_admin(&auth(Role::Seller)),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            ensure_admin(&auth(Role::User)),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn seller_gate_admits_admins() {
        assert!(ensure_seller(&auth(Role::Seller)).is_ok());
        assert!(ensure_seller(&auth(Role::Admin)).is_ok());
        assert!(matches!(
            ensure_seller(&auth(Role::User)),
            Err(AppError::Forbidden)
        ));
    }
}
