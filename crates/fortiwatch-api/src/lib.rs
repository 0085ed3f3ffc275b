// fortiwatch-api: Async Rust client for the FortiGate REST monitor API

pub mod auth;
pub mod client;
pub mod error;
pub mod resource;
pub mod retry;
pub mod transport;

pub use auth::Credentials;
pub use client::GatewayClient;
pub use error::Error;
pub use resource::Resource;
pub use retry::RetryPolicy;
pub use transport::{TlsMode, TransportConfig};
