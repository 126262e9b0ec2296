//! # CLI Module
//!
//! Command-line interface for the access gateway.

mod app;
mod commands;
mod output;

pub use app::{exit_with_error, run};

use dac_protocol::PROTOCOL_VERSION;

/// Print the banner shown when no command is given
pub fn print_banner() {
    println!(
        r#"
  ██████╗  █████╗  ██████╗
  ██╔══██╗██╔══██╗██╔════╝
  ██║  ██║███████║██║
  ██║  ██║██╔══██║██║
  ██████╔╝██║  ██║╚██████╗
  ╚═════╝ ╚═╝  ╚═╝ ╚═════╝  gate v{} (protocol {})

Mutually authenticated access gateway
"#,
        env!("CARGO_PKG_VERSION"),
        PROTOCOL_VERSION
    );
}
