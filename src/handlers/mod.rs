pub mod admin_handler;
pub mod auth_handler;
pub mod chat_handler;
pub mod health;
pub mod metrics;
pub mod pharmacies_handler;
pub mod search_handler;

pub use health::health_check;
pub use metrics::{metrics_handler, setup_metrics_recorder, MetricsState};
