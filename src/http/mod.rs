//! HTTP boundary: the admission API and response translation.

mod response;
mod server;
mod service;

pub use response::{
    ban_message, ban_result, limit_message, quota_headers, too_many_requests, RateLimitedBody,
};
pub use server::HttpServer;
pub use service::AppState;
