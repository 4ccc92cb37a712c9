use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::pharmacy::Pharmacy;
use super::pharmacy_input::PharmacyDetailsInput;
use super::user::{Role, User, UserPatch};
use crate::{AppError, AppResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Lower-cases and sanity-checks an email address.
pub fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(AppError::Validation("email must be a valid address".to_string()));
    }
    Ok(email)
}

pub fn check_password_strength(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Self-registration. Only patients and pharmacy owners may register; pharmacy owners
/// must describe their storefront.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterInput {
    pub role: Role,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub pharmacy: Option<PharmacyDetailsInput>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: User,
    pub pharmacy: Option<Pharmacy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OtpRequestInput {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OtpVerifyInput {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyResponse {
    pub reset_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordInput {
    pub reset_token: String,
    pub new_password: String,
}

/// Admin edit of account fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserInput {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateUserInput {
    pub fn into_patch(self) -> AppResult<UserPatch> {
        let full_name = match self.full_name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(AppError::Validation("fullName must not be empty".to_string()));
                }
                Some(name)
            }
            None => None,
        };
        let patch = UserPatch {
            full_name,
            phone: self.phone.map(|p| Some(p.trim().to_string()).filter(|p| !p.is_empty())),
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(AppError::InvalidRequest("No fields to update".to_string()));
        }
        Ok(patch)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UserStatusInput {
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

/// Generic success response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: Option<String>,
}
