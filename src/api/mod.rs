//! Server API: the HTTP client, resource types and per-resource services.

pub mod client;
pub mod error;
pub mod resources;
pub mod types;

pub use client::HttpClient;
pub use resources::Services;
