//! # CLI Application
//!
//! CLI definition and command dispatch using clap.

use clap::{Parser, Subcommand, ValueEnum};

use super::commands::{cmd_genkey, cmd_init, cmd_keyinfo, cmd_pubkey, cmd_request, cmd_serve};
use super::output;
use super::print_banner;
use dac_core::SuiteId;
use dac_protocol::Result;

/// dacgate - mutually authenticated access gateway
#[derive(Parser)]
#[command(
    name = "dacgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mutually authenticated access gateway",
    long_about = None,
    after_help = "Examples:\n  \
        dacgate genkey -s curve25519 -o server.key\n  \
        dacgate pubkey server.key\n  \
        dacgate init server > server.toml\n  \
        dacgate serve -c server.toml\n  \
        dacgate request -c client.toml ACTUATOR:door:unlock",
    styles = get_styles(),
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the access gateway
    #[command(visible_alias = "server")]
    Serve {
        /// Config file path
        #[arg(short, long, default_value = default_server_config())]
        config: String,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Minimal output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Send one access request to a gateway
    #[command(visible_alias = "req")]
    Request {
        /// Config file path
        #[arg(short, long, default_value = default_client_config())]
        config: String,

        /// Request string, e.g. ACTUATOR:door:unlock
        request: String,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Minimal output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate an identity key file
    #[command(visible_alias = "key")]
    Genkey {
        /// Primitive suite
        #[arg(short, long, value_enum, default_value = "curve25519")]
        suite: SuiteArg,

        /// Output file path
        #[arg(short, long, default_value = "dacgate.key")]
        output: String,
    },

    /// Print the public key of a key file
    Pubkey {
        /// Path to key file
        key_file: String,

        /// Output format: base64 (default) or hex
        #[arg(short, long, value_enum, default_value = "base64")]
        format: OutputFormat,
    },

    /// Show key file information
    Keyinfo {
        /// Path to key file
        key_file: String,
    },

    /// Print a config template
    Init {
        /// Config type: client or server
        #[arg(default_value = "client")]
        mode: String,
    },
}

/// Suite argument for genkey
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SuiteArg {
    /// X25519 + Ed25519 (recommended)
    Curve25519,
    /// ECDH + ECDSA over NIST P-256
    P256,
}

impl From<SuiteArg> for SuiteId {
    fn from(arg: SuiteArg) -> Self {
        match arg {
            SuiteArg::Curve25519 => SuiteId::Curve25519,
            SuiteArg::P256 => SuiteId::P256,
        }
    }
}

/// Output format for pubkey
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Base64 encoding
    Base64,
    /// Hexadecimal encoding
    Hex,
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .header(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .literal(clap::builder::styling::AnsiColor::BrightGreen.on_default())
        .placeholder(clap::builder::styling::AnsiColor::Cyan.on_default())
        .valid(clap::builder::styling::AnsiColor::BrightGreen.on_default())
        .invalid(clap::builder::styling::AnsiColor::BrightRed.on_default())
}

fn default_server_config() -> &'static str {
    "/etc/dacgate/server.toml"
}

fn default_client_config() -> &'static str {
    "/etc/dacgate/client.toml"
}

/// Run the CLI application
pub fn run() -> Result<()> {
    if std::env::args().len() < 2 {
        print_banner();
        let _ = Cli::try_parse();
        std::process::exit(1);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            verbose,
            quiet,
        } => cmd_serve(&config, verbose, quiet),

        Commands::Request {
            config,
            request,
            verbose,
            quiet,
        } => cmd_request(&config, &request, verbose, quiet),

        Commands::Genkey { suite, output } => cmd_genkey(suite.into(), &output),

        Commands::Pubkey { key_file, format } => cmd_pubkey(&key_file, format),

        Commands::Keyinfo { key_file } => cmd_keyinfo(&key_file),

        Commands::Init { mode } => cmd_init(&mode),
    }
}

/// Print error and exit
pub fn exit_with_error(e: impl std::fmt::Display) -> ! {
    output::print_error(e);
    std::process::exit(1);
}
