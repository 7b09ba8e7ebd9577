//! Registration, login, password reset and logout.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::password::{spawn_hash, spawn_verify};
use crate::auth::session::{session_cookie, session_token, SESSION_COOKIE};
use crate::errors::AppError;
use crate::models::user::UserRecord;
use crate::state::AppState;
use crate::store::UserMap;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgetPasswordRequest {
    pub username: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// POST /api/v1/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required.".to_string()));
    }
    if req.password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match.".to_string()));
    }

    let record = UserRecord {
        email: req.email.trim().to_string(),
        password_hash: spawn_hash(req.password).await?,
    };
    state
        .stores
        .users
        .update(|users: &mut UserMap| {
            if users.contains_key(&username) {
                return Err(AppError::Conflict("Username already exists.".to_string()));
            }
            users.insert(username.clone(), record);
            Ok(())
        })
        .await?;

    info!("Registered user {username}");
    Ok((
        StatusCode::CREATED,
        MessageResponse::new("Registration successful! Please login."),
    ))
}

/// POST /api/v1/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let username = req.username.trim();
    let users = state.stores.users.load().await?;
    let valid = match users.get(username) {
        Some(user) => {
            spawn_verify(req.password.trim().to_string(), user.password_hash.clone()).await
        }
        None => false,
    };
    if !valid {
        return Err(AppError::Unauthorized("Invalid username or password.".to_string()));
    }

    let token = state.sessions.create(username).await;
    info!("User {username} logged in");
    Ok((
        jar.add(session_cookie(token)),
        MessageResponse::new(format!("Welcome {username}!")),
    ))
}

/// POST /api/v1/auth/forget-password
pub async fn handle_forget_password(
    State(state): State<AppState>,
    Json(req): Json<ForgetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if req.new_password != req.confirm_password {
        return Err(AppError::Validation("Passwords do not match.".to_string()));
    }

    let username = req.username.trim().to_string();
    let new_hash = spawn_hash(req.new_password).await?;
    state
        .stores
        .users
        .update(|users: &mut UserMap| match users.get_mut(&username) {
            Some(user) => {
                user.password_hash = new_hash;
                Ok(())
            }
            None => Err(AppError::NotFound("Username not found.".to_string())),
        })
        .await?;

    info!("Password reset for {username}");
    Ok(MessageResponse::new("Password updated successfully! Please login."))
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = session_token(&jar) {
        state.sessions.remove(token).await;
    }
    (
        jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/")),
        MessageResponse::new("Logged out successfully."),
    )
}
