//! # Configuration Module
//!
//! TOML-based configuration for gateway server and request client.

mod client;
mod common;
mod server;

pub use client::{example_client_config, ClientConfig, ClientSection};
pub use common::{
    ConfigError, IdentitySection, LimitsSection, LoggingSection, TimeoutsSection, TrustSection,
};
pub use server::{example_server_config, PolicySection, ServerConfig, ServerSection};
