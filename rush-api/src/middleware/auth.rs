use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rush_core::User;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

impl UserClaims {
    pub fn for_user(user: &User, ttl_seconds: u64) -> Self {
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            exp: (Utc::now() + Duration::seconds(ttl_seconds as i64)).timestamp() as usize,
        }
    }

    /// Users may only act on their own account and resources.
    pub fn ensure_self(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.sub != user_id {
            return Err(AppError::AuthorizationError(
                "Forbidden: this resource belongs to another user".to_string(),
            ));
        }
        Ok(())
    }

    pub fn encode(&self, secret: &str) -> Result<String, AppError> {
        encode(&Header::default(), self, &EncodingKey::from_secret(secret.as_bytes()))
            .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
    }
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn user_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("No JWT token".to_string()))?;

    let token_data = decode::<UserClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("Invalid JWT token".to_string()))?;

    req.extensions_mut().insert(token_data.claims);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "1020".into(),
            "Ana".into(),
            "Gomez".into(),
            "ana@campus.edu".into(),
            "3001234567".into(),
            "hash".into(),
        )
    }

    #[test]
    fn test_claims_round_trip_through_token() {
        let user = user();
        let token = UserClaims::for_user(&user, 60).encode("secret").unwrap();

        let decoded = decode::<UserClaims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(decoded.claims.sub, user.id);
        assert_eq!(decoded.claims.role, "passenger");
    }

    #[test]
    fn test_ensure_self_rejects_other_users() {
        let claims = UserClaims::for_user(&user(), 60);
        assert!(claims.ensure_self(claims.sub).is_ok());
        assert!(matches!(
            claims.ensure_self(Uuid::new_v4()),
            Err(AppError::AuthorizationError(_))
        ));
    }
}
