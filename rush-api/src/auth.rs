use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use rush_core::User;
use rush_shared::Masked;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::UserClaims,
    state::AppState,
    validation::{self, AppJson, Validate},
};

/// Profile fields accepted on registration and on profile updates.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileRequest {
    pub id_user: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub number: String,
    pub password: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Validate for ProfileRequest {
    fn validate(&self) -> Result<(), AppError> {
        validation::digits("id_user", &self.id_user)?;
        validation::letters("name", &self.name)?;
        validation::letters("last_name", &self.last_name)?;
        validation::email(&self.email)?;
        validation::digits("number", &self.number)?;
        validation::password(&self.password)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    id: Uuid,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    message: &'static str,
    access_token: String,
}

pub fn routes() -> axum::Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<ProfileRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    req.validate()?;

    let password_hash = hash_password(req.password).await?;
    let mut user = User::new(req.id_user, req.name, req.last_name, req.email, req.number, password_hash);
    user.photo_url = req.photo_url;

    state.users.create_user(&user).await?;
    info!("Registered user {} ({})", user.id, Masked::new(&user.email));

    Ok((StatusCode::CREATED, Json(RegisterResponse { id: user.id })))
}

async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(AppError::ValidationError("email and password required".to_string()));
    };

    let invalid = || AppError::ValidationError("Invalid credentials".to_string());
    let user = state.users.find_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let access_token = UserClaims::for_user(&user, state.auth.expiration).encode(&state.auth.secret)?;
    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        message: "Login successful",
        access_token,
    }))
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub(crate) async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
    .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| AppError::InternalServerError(format!("Stored hash is unreadable: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::InternalServerError(format!("Hashing task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileRequest {
        ProfileRequest {
            id_user: "1020304050".into(),
            name: "Ana Maria".into(),
            last_name: "Gomez".into(),
            email: "ana@campus.edu".into(),
            number: "3001234567".into(),
            password: "supersecret".into(),
            photo_url: None,
        }
    }

    #[test]
    fn test_profile_validation() {
        assert!(profile().validate().is_ok());

        let mut bad = profile();
        bad.id_user = "10-20".into();
        assert!(bad.validate().is_err());

        let mut bad = profile();
        bad.password = "short".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let raw = r#"{"id_user":"1","name":"A","last_name":"B","email":"a@b.co","number":"1","password":"12345678","role":"driver"}"#;
        assert!(serde_json::from_str::<ProfileRequest>(raw).is_err());
    }

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let hash = hash_password("supersecret".into()).await.unwrap();
        assert!(verify_password("supersecret".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("wrongpass".into(), hash).await.unwrap());
    }
}
