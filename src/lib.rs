// Notification Gate Library
//
// This library exposes the admission-control core and its HTTP surface
// for integration tests, benchmarks and embedding services.

pub mod api;
pub mod client;
pub mod config;
pub mod metrics;
pub mod rate_limit;
