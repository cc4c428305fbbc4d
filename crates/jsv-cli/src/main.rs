//! # jsv CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jsv_cli::validate::{run_domains, run_validate, DomainsArgs, ValidateArgs};

/// JSON validator.
///
/// Validates JSON and YAML documents against the schemas configured per
/// domain and validation type. Application settings are read from `JSV_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(name = "jsv", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate documents against a domain's validation type.
    Validate(ValidateArgs),

    /// List loaded domains and their validation types.
    Domains(DomainsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Domains(args) => run_domains(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsv_core::CombinationApproach;
    use std::path::PathBuf;

    #[test]
    fn cli_parse_validate() {
        let cli = Cli::try_parse_from([
            "jsv",
            "validate",
            "--domain",
            "orders",
            "--type",
            "order",
            "a.json",
            "b.json",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.domain, "orders");
        assert_eq!(args.validation_type.as_deref(), Some("order"));
        assert_eq!(args.inputs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert!(!args.pointer);
    }

    #[test]
    fn cli_parse_external_schemas() {
        let cli = Cli::try_parse_from([
            "jsv",
            "validate",
            "--domain",
            "d",
            "--schema",
            "x.json",
            "--schema",
            "y.json",
            "--combination",
            "oneOf",
            "--pointer",
            "doc.json",
        ])
        .unwrap();
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.schemas.len(), 2);
        assert_eq!(args.combination, Some(CombinationApproach::OneOf));
        assert!(args.pointer);
    }

    #[test]
    fn cli_rejects_unknown_combination() {
        let result = Cli::try_parse_from([
            "jsv",
            "validate",
            "--domain",
            "d",
            "--combination",
            "someOf",
            "doc.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_requires_an_input() {
        assert!(Cli::try_parse_from(["jsv", "validate", "--domain", "d"]).is_err());
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let cli0 = Cli::try_parse_from(["jsv", "domains"]).unwrap();
        assert_eq!(cli0.verbose, 0);

        let cli1 = Cli::try_parse_from(["jsv", "-v", "domains"]).unwrap();
        assert_eq!(cli1.verbose, 1);

        let cli3 = Cli::try_parse_from(["jsv", "-vvv", "domains"]).unwrap();
        assert_eq!(cli3.verbose, 3);
    }
}
