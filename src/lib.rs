// Library interface for paperback_cache_warmer
// The binary and the integration tests both build on these modules

pub mod archive;
pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod forwarder;
pub mod helpers;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod sources;
