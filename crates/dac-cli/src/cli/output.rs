//! # CLI Output Helpers
//!
//! Consistent styled messages for the CLI.

use console::{style, StyledObject};

/// Output icons with platform-specific fallbacks
pub struct Icons;

impl Icons {
    #[cfg(unix)]
    pub const SUCCESS: &'static str = "✅";
    #[cfg(not(unix))]
    pub const SUCCESS: &'static str = "[OK] ";

    #[cfg(unix)]
    pub const ERROR: &'static str = "❌";
    #[cfg(not(unix))]
    pub const ERROR: &'static str = "[ERR] ";

    #[cfg(unix)]
    pub const WARNING: &'static str = "⚡";
    #[cfg(not(unix))]
    pub const WARNING: &'static str = "[!] ";

    #[cfg(unix)]
    pub const GRANTED: &'static str = "🔓";
    #[cfg(not(unix))]
    pub const GRANTED: &'static str = "[+] ";

    #[cfg(unix)]
    pub const DENIED: &'static str = "🔒";
    #[cfg(not(unix))]
    pub const DENIED: &'static str = "[-] ";
}

fn icon_success() -> StyledObject<&'static str> {
    style(Icons::SUCCESS).green().bold()
}

fn icon_error() -> StyledObject<&'static str> {
    style(Icons::ERROR).red().bold()
}

fn icon_warning() -> StyledObject<&'static str> {
    style(Icons::WARNING).yellow().bold()
}

pub fn print_success(msg: &str) {
    println!(" {}{}", icon_success(), msg);
}

/// Print an error message to stderr
pub fn print_error(msg: impl std::fmt::Display) {
    eprintln!(" {}Error: {}", icon_error(), msg);
}

/// Print a warning to stderr so it never mixes with key or config output
pub fn print_warning(msg: &str) {
    eprintln!(" {}{}", icon_warning(), msg);
}

pub fn print_granted(msg: &str) {
    println!(" {} {}", style(Icons::GRANTED).green().bold(), style(msg).green());
}

pub fn print_denied(msg: &str) {
    println!(" {} {}", style(Icons::DENIED).red().bold(), style(msg).red());
}

/// Key/value line for info listings
pub fn print_field(name: &str, value: impl std::fmt::Display) {
    println!("  {:<12} {}", style(name).cyan(), value);
}
