//! MDM migration proxy library.
//!
//! Sits in front of two device-management servers and moves enrolled devices
//! from the legacy server to the new one, gradually and deterministically.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod migration;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
