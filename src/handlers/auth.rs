use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::auth::{jwt, password};
use crate::models::user::{NewUser, PublicUser, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::json::JsonBody;
use crate::utils::response::{created, success};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterPayload {
    fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::ValidationError("username may not be blank".into()));
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err(AppError::ValidationError("a valid email is required".into()));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::ValidationError(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.password != self.password_confirmation {
            return Err(AppError::ValidationError(
                "password fields didn't match".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginData {
    access: String,
    refresh: String,
    user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    pub refresh: String,
}

#[derive(Serialize)]
struct AccessData {
    access: String,
}

/// POST /auth/register/
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<Response, AppError> {
    payload.validate()?;

    if User::username_taken(&state.pool, &payload.username).await? {
        return Err(AppError::ValidationError(
            "a user with that username already exists".into(),
        ));
    }

    let password_hash = password::hash(&payload.password)?;
    let user = User::create(
        &state.pool,
        NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
            first_name: payload.first_name,
            last_name: payload.last_name,
        },
    )
    .await
    .map_err(map_unique_violation)?;

    Ok(created(PublicUser::from(user), "User registered successfully").into_response())
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<Response, AppError> {
    let user = User::find_by_username(&state.pool, &payload.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify(&user.password_hash, &payload.password) {
        return Err(invalid_credentials());
    }

    let pair = jwt::issue_pair(&state.config.jwt, user.id)?;

    Ok(success(
        LoginData {
            access: pair.access,
            refresh: pair.refresh,
            user: PublicUser::from(user),
        },
        "Login successful",
    )
    .into_response())
}

/// POST /auth/token/refresh/
pub async fn refresh_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RefreshPayload>,
) -> Result<Response, AppError> {
    let access = jwt::refresh_access(&state.config.jwt, &payload.refresh)?;

    Ok(success(AccessData { access }, "Token refreshed").into_response())
}

fn invalid_credentials() -> AppError {
    // One message for both unknown user and bad password
    AppError::AuthError("Invalid username or password".into())
}

/// The uniqueness pre-check can race with a concurrent registration; the
/// database constraint is the source of truth.
fn map_unique_violation(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::ValidationError("a user with that username already exists".into())
        }
        _ => AppError::DatabaseError(e),
    }
}
