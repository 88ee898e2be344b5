use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::verify_password,
    error::ApiError,
    middleware::{auth_context::AuthContext, extract::AppJson},
    models::{ApiOk, AppState, User},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: String,
    pub tenant_id: Option<i64>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        UserProfile {
            id: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            tenant_id: u.tenant_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponseData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

pub type LoginResponse = ApiOk<LoginResponseData>;

pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email and password are required".into(),
        ));
    }

    // 1) Load user
    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    // 2) Verify password
    if !verify_password(&req.password, &user.password_hash) {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(ApiError::invalid_credentials());
    }

    // 3) Issue JWT
    let ttl = Duration::try_hours(state.token_ttl_hours)
        .ok_or_else(|| ApiError::Internal(format!("token ttl out of range: {}h", state.token_ttl_hours)))?;
    let (token, expires_at) = state
        .jwt
        .issue(&user, Utc::now(), ttl)
        .map_err(ApiError::Internal)?;

    tracing::info!(user_id = user.id, role = %user.role, "login");

    Ok(Json(ApiOk {
        data: LoginResponseData {
            token,
            expires_at,
            user: user.into(),
        },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    let user = state.store.get_user(auth.user_id).await?;
    Ok(Json(ApiOk { data: user.into() }))
}
