use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{auth, models::Role, store::UserStore, AppError, AppState};

/// Caller identity resolved from the bearer token and re-checked against the user store,
/// so deactivated or deleted accounts lose access before their token expires.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Missing authentication: no Bearer token".to_string()))?;

        let claims = auth::validate_token(bearer.token(), &state.config.jwt_secret).map_err(AppError::Unauthorized)?;

        let user_id: Uuid = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid subject in token".to_string()))?;

        let user = match state.store.get_user(user_id).await {
            Ok(user) => user,
            Err(AppError::NotFound(_)) => {
                tracing::warn!(%user_id, "Token subject no longer exists");
                return Err(AppError::Unauthorized("Account not found".to_string()));
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            tracing::debug!(%user_id, "Rejected request from deactivated account");
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            role: user.role,
        })
    }
}
