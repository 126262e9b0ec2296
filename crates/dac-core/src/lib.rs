//! # dac-core
//!
//! Core functionality for the dac access gateway.
//!
//! This crate provides:
//! - Handshake suites (X25519/Ed25519, ECDH/ECDSA over P-256)
//! - AES-256-CBC, HMAC-SHA256, transcripts and key schedule
//! - Identity key files
//! - Configuration handling (TOML-based)

pub mod config;
pub mod crypto;

pub use config::{
    example_client_config, example_server_config, ClientConfig, ConfigError, IdentitySection,
    LimitsSection, LoggingSection, PolicySection, ServerConfig, TimeoutsSection, TrustSection,
};
pub use crypto::{
    constant_time_compare, create_suite, IdentityKey, KeyAgreement, KeyFile, KeySchedule, Suite,
    SuiteId,
};
