//! CLI module for scoped-memo
//!
//! - `serve`: run the HTTP server exposing the memoized host directory

pub mod serve;

use clap::{Parser, Subcommand};

/// scoped-memo - Scoped memoization demo server
#[derive(Parser)]
#[command(name = "scoped-memo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve(serve::ServeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::parse_from(["scoped-memo", "serve", "--port", "9000"]);
        let Command::Serve(args) = cli.command;
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.host, None);
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
