use axum::http::HeaderValue;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub bind_addr: String,
    pub cors_origin: String,
    pub search_default_radius_m: f64,
    pub search_max_radius_m: f64,
    pub low_stock_threshold: u32,
    pub otp_ttl_secs: u64,
    pub otp_webhook_url: Option<String>,
    /// Seeds an admin account at startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => return Err(format!("STORE_BACKEND must be postgres or memory, got {}", other)),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set when STORE_BACKEND=postgres".to_string());
        }

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set".to_string())?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(format!("JWT_SECRET must be at least {} bytes", MIN_JWT_SECRET_LEN));
        }

        let search_default_radius_m = parse_or("SEARCH_DEFAULT_RADIUS_M", 10_000.0)?;
        let search_max_radius_m = parse_or("SEARCH_MAX_RADIUS_M", 50_000.0)?;
        if search_default_radius_m <= 0.0 || search_default_radius_m > search_max_radius_m {
            return Err("SEARCH_DEFAULT_RADIUS_M must be positive and not exceed SEARCH_MAX_RADIUS_M".to_string());
        }

        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        if HeaderValue::from_str(&cors_origin).is_err() {
            return Err(format!("CORS_ORIGIN is not a valid header value: {}", cors_origin));
        }

        let admin_email = env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty());
        if admin_email.is_some() != admin_password.is_some() {
            return Err("ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string());
        }

        Ok(Self {
            store_backend,
            database_url,
            jwt_secret,
            jwt_ttl_secs: parse_or("JWT_TTL_SECS", 86_400)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cors_origin,
            search_default_radius_m,
            search_max_radius_m,
            low_stock_threshold: parse_or("LOW_STOCK_THRESHOLD", 10)?,
            otp_ttl_secs: parse_or("OTP_TTL_SECS", 300)?,
            otp_webhook_url: env::var("OTP_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            admin_email,
            admin_password,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt_secret: "test_secret_key_for_testing_purposes_only".to_string(),
            jwt_ttl_secs: 3600,
            bind_addr: "127.0.0.1:0".to_string(),
            cors_origin: "http://localhost:3000".to_string(),
            search_default_radius_m: 10_000.0,
            search_max_radius_m: 50_000.0,
            low_stock_threshold: 10,
            otp_ttl_secs: 300,
            otp_webhook_url: None,
            admin_email: None,
            admin_password: None,
        }
    }
}
