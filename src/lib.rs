pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod merge;
pub mod middleware;
pub mod quota_store;
pub mod rate_limiter;
pub mod reclaimer;
pub mod server;

pub use config::Config;
pub use error::ApiError;
pub use server::{build_router, Server};
