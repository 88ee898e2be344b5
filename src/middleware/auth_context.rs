use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::TokenError;
use crate::error::ApiError;
use crate::models::AppState;

/// Identity carried by the bearer token. Handlers trust it as is; no
/// role-based checks are made.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
    pub tenant_id: Option<i64>,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::invalid_token())?;

            let claims = state.jwt.verify(authz.token()).map_err(|e| {
                match e {
                    TokenError::Expired => tracing::debug!("expired token"),
                    TokenError::Invalid(reason) => tracing::debug!(%reason, "rejected token"),
                }
                ApiError::invalid_token()
            })?;

            let user_id = claims
                .sub
                .parse::<i64>()
                .map_err(|_| ApiError::invalid_token())?;

            Ok(AuthContext {
                user_id,
                role: claims.role,
                tenant_id: claims.tenant_id,
            })
        }
    }
}
