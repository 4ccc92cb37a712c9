pub mod matcher;
pub mod service;

pub use matcher::match_stock;
pub use service::{search, SearchLimits, SearchRequest};
