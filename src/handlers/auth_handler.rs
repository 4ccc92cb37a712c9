use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::{
    auth::{self, ResetToken},
    extractors::AuthenticatedUser,
    models::{
        user_input::{check_password_strength, normalize_email},
        LoginInput, LoginResponse, NewUser, OtpRequestInput, OtpVerifyInput, OtpVerifyResponse, RegisterInput,
        RegisterResponse, ResetPasswordInput, Role, SuccessResponse, User, UserPatch,
    },
    store::UserStore,
    AppError, AppResult, AppState,
};

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email, password or role".to_string())
}

/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Invalid coordinates or unexpected pharmacy block"),
        (status = 403, description = "Admin accounts cannot self-register"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    if input.role == Role::Admin {
        return Err(AppError::Forbidden("Admin accounts cannot self-register".to_string()));
    }

    let email = normalize_email(&input.email)?;
    check_password_strength(&input.password)?;
    let full_name = input.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::Validation("fullName is required".to_string()));
    }

    let storefront = match (input.role, input.pharmacy) {
        (Role::Pharmacy, Some(details)) => Some(details.into_storefront()?),
        (Role::Pharmacy, None) => {
            return Err(AppError::Validation(
                "pharmacy details are required for pharmacy accounts".to_string(),
            ))
        }
        (_, Some(_)) => {
            return Err(AppError::InvalidRequest(
                "pharmacy details are only accepted for pharmacy accounts".to_string(),
            ))
        }
        (_, None) => None,
    };

    let password_hash = auth::hash_password(&input.password).await?;
    let new_user = NewUser {
        role: input.role,
        email,
        password_hash,
        full_name,
        phone: input.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
    };

    let (user, pharmacy) = state.store.create_user(new_user, storefront).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account registered");
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, pharmacy })))
}

/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Bearer token issued", body = LoginResponse),
        (status = 401, description = "Wrong credentials or role"),
        (status = 403, description = "Account is deactivated")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<LoginResponse>> {
    let email = normalize_email(&input.email).map_err(|_| invalid_credentials())?;

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !auth::verify_password(&input.password, &user.password_hash).await? || user.role != input.role {
        tracing::debug!(user_id = %user.id, "Login rejected");
        return Err(invalid_credentials());
    }

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    let token = auth::issue_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_secs)?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_ttl_secs,
        user,
    }))
}

/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current authenticated user", body = User),
        (status = 401, description = "Unauthorized")
    ),
    tag = "auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.store.get_user(auth.user_id).await?;
    Ok(Json(user))
}

/// POST /api/auth/otp/request
///
/// Always answers 202 so callers cannot probe which emails have accounts.
#[utoipa::path(
    post,
    path = "/api/auth/otp/request",
    request_body = OtpRequestInput,
    responses(
        (status = 202, description = "A code was sent if the account exists", body = SuccessResponse),
        (status = 422, description = "Malformed email")
    ),
    tag = "auth"
)]
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    Json(input): Json<OtpRequestInput>,
) -> AppResult<(StatusCode, Json<SuccessResponse>)> {
    let email = normalize_email(&input.email)?;

    match state.store.find_user_by_email(&email).await? {
        Some(user) if user.is_active => {
            let code = state.otp.issue(&email).await;
            if let Err(e) = state.otp_delivery.deliver(&email, &code).await {
                tracing::error!(error = %e, user_id = %user.id, "OTP delivery failed");
            }
        }
        _ => tracing::debug!("OTP requested for unknown or inactive account"),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SuccessResponse {
            success: true,
            message: Some("If the account exists, a code has been sent".to_string()),
        }),
    ))
}

/// POST /api/auth/otp/verify
#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = OtpVerifyInput,
    responses(
        (status = 200, description = "Code accepted; short-lived reset token issued", body = OtpVerifyResponse),
        (status = 401, description = "Wrong or expired code")
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(input): Json<OtpVerifyInput>,
) -> AppResult<Json<OtpVerifyResponse>> {
    let email = normalize_email(&input.email)?;
    state.otp.verify_and_consume(&email, &input.code).await?;

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired code".to_string()))?;

    let reset_token = auth::generate_reset_token(user.id, &user.password_hash, &state.config.jwt_secret)?;
    Ok(Json(OtpVerifyResponse { reset_token }))
}

/// POST /api/auth/password/reset
#[utoipa::path(
    post,
    path = "/api/auth/password/reset",
    request_body = ResetPasswordInput,
    responses(
        (status = 200, description = "Password updated", body = SuccessResponse),
        (status = 401, description = "Invalid or expired reset token"),
        (status = 422, description = "Password too short")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ResetPasswordInput>,
) -> AppResult<Json<SuccessResponse>> {
    check_password_strength(&input.new_password)?;

    let token = ResetToken::parse(&input.reset_token)?;
    let user = match state.store.get_user(token.user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(AppError::Unauthorized("Invalid reset token".to_string())),
        Err(e) => return Err(e),
    };
    token.verify(&user.password_hash, &state.config.jwt_secret)?;

    let password_hash = auth::hash_password(&input.new_password).await?;
    state
        .store
        .update_user(
            user.id,
            UserPatch {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(Json(SuccessResponse {
        success: true,
        message: Some("Password updated".to_string()),
    }))
}
