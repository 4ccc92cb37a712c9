use async_trait::async_trait;
use moka::future::Cache;
use rand::Rng;
use serde_json::json;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;
use subtle::ConstantTimeEq;

use crate::{AppError, AppResult};

const OTP_DIGITS: usize = 6;
const OTP_CACHE_CAPACITY: u64 = 10_000;
/// Verification attempts allowed per email within one TTL window, across re-issued codes.
const OTP_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
struct OtpEntry {
    code: String,
    expires_at: i64,
}

/// One-time codes keyed by normalized email. Entries are evicted after the TTL.
///
/// Attempts are counted in a second cache whose window starts at the first attempt and is
/// reset by a successful verification, not by issuing a new code.
#[derive(Clone)]
pub struct OtpCache {
    codes: Cache<String, OtpEntry>,
    attempts: Cache<String, Arc<AtomicU32>>,
    ttl_secs: u64,
}

impl OtpCache {
    pub fn new(ttl_secs: u64) -> Self {
        let codes = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .max_capacity(OTP_CACHE_CAPACITY)
            .build();
        let attempts = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .max_capacity(OTP_CACHE_CAPACITY)
            .build();
        Self {
            codes,
            attempts,
            ttl_secs,
        }
    }

    /// Generates a fresh code for `email`, replacing any outstanding one.
    pub async fn issue(&self, email: &str) -> String {
        let code = {
            let mut rng = rand::thread_rng();
            format!("{:0width$}", rng.gen_range(0..1_000_000u32), width = OTP_DIGITS)
        };
        let entry = OtpEntry {
            code: code.clone(),
            expires_at: chrono::Utc::now().timestamp() + self.ttl_secs as i64,
        };
        self.codes.insert(email.to_string(), entry).await;
        code
    }

    /// Checks `code` and consumes it on success. Each call spends one of `OTP_MAX_ATTEMPTS` for
    /// the email before comparing; once they are spent the code is dropped and the email stays
    /// locked for the rest of the window.
    pub async fn verify_and_consume(&self, email: &str, code: &str) -> AppResult<()> {
        let invalid = || AppError::Unauthorized("Invalid or expired code".to_string());

        let counter = self
            .attempts
            .get_with(email.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > OTP_MAX_ATTEMPTS {
            self.codes.invalidate(email).await;
            return Err(AppError::Unauthorized(
                "Too many attempts; request a new code later".to_string(),
            ));
        }

        let entry = self.codes.get(email).await.ok_or_else(invalid)?;
        if chrono::Utc::now().timestamp() > entry.expires_at {
            self.codes.invalidate(email).await;
            return Err(invalid());
        }
        if !bool::from(entry.code.as_bytes().ct_eq(code.trim().as_bytes())) {
            if attempt == OTP_MAX_ATTEMPTS {
                self.codes.invalidate(email).await;
                tracing::warn!(email, "OTP locked after repeated wrong codes");
            }
            return Err(invalid());
        }

        self.codes.invalidate(email).await;
        self.attempts.invalidate(email).await;
        Ok(())
    }
}

/// Hands a freshly issued code to the account holder.
#[async_trait]
pub trait OtpDelivery: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> AppResult<()>;
}

/// Development delivery: writes the code to the log.
pub struct LogDelivery;

#[async_trait]
impl OtpDelivery for LogDelivery {
    async fn deliver(&self, email: &str, code: &str) -> AppResult<()> {
        tracing::info!(email, code, "OTP issued (log delivery)");
        Ok(())
    }
}

/// Posts `{"email", "code"}` to an external mailer.
pub struct WebhookDelivery {
    client: reqwest::Client,
    url: String,
}

impl WebhookDelivery {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl OtpDelivery for WebhookDelivery {
    async fn deliver(&self, email: &str, code: &str) -> AppResult<()> {
        let response = self
            .client
            .post(&self.url)
            .timeout(Duration::from_secs(10))
            .json(&json!({ "email": email, "code": code }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "OTP webhook request failed");
                AppError::Internal(format!("OTP webhook request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, "OTP webhook returned error");
            return Err(AppError::Internal(format!("OTP webhook returned {}", status)));
        }

        tracing::debug!(email, "OTP handed to webhook");
        Ok(())
    }
}
