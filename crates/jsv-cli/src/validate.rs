//! # Validate Subcommand
//!
//! Validates local documents against a configured domain and prints one
//! summary per document, as text or JSON.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use jsv_core::CombinationApproach;
use jsv_schema::{AppConfig, DomainRegistry, ValidationOutcome, ValidationRequest, Validator};

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration domain.
    #[arg(long)]
    pub domain: String,

    /// Validation type. Optional when the domain defines a single type.
    #[arg(long = "type")]
    pub validation_type: Option<String>,

    /// User-provided schema file. Repeat for several.
    #[arg(long = "schema")]
    pub schemas: Vec<PathBuf>,

    /// Combination approach for user-provided schemas (allOf, anyOf, oneOf).
    #[arg(long)]
    pub combination: Option<CombinationApproach>,

    /// Report locations as JSON Pointers instead of line numbers.
    #[arg(long)]
    pub pointer: bool,

    /// Print outcomes as JSON.
    #[arg(long)]
    pub json: bool,

    /// Resource root, overriding `JSV_RESOURCE_ROOT`.
    #[arg(long)]
    pub resources: Option<PathBuf>,

    /// Documents to validate.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,
}

/// Arguments for the domains subcommand.
#[derive(Args, Debug)]
pub struct DomainsArgs {
    /// Resource root, overriding `JSV_RESOURCE_ROOT`.
    #[arg(long)]
    pub resources: Option<PathBuf>,
}

/// Validate every input and return `0` when all are valid, `1` otherwise.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let config = load_config(args.resources.as_deref())?;
    let validator = build_validator(&config)?;

    let mut failed = 0usize;
    for input in &args.inputs {
        let request = ValidationRequest {
            domain: args.domain.clone(),
            validation_type: args.validation_type.clone(),
            external_schemas: args.schemas.clone(),
            external_combination: args.combination,
            location_as_pointer: args.pointer,
            ..ValidationRequest::default()
        }
        .with_document_file(input)
        .with_context(|| format!("cannot read {}", input.display()))?;
        let outcome = validator
            .validate(&request)
            .with_context(|| format!("cannot validate {}", input.display()))?;
        if !outcome.success {
            failed += 1;
        }
        println!("{}", render(input, &outcome, args.json)?);
    }

    if failed > 0 {
        tracing::info!(failed, total = args.inputs.len(), "validation finished with errors");
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Print every loaded domain with its validation types.
pub fn run_domains(args: &DomainsArgs) -> Result<u8> {
    let config = load_config(args.resources.as_deref())?;
    let registry = load_registry(&config)?;
    for domain in registry.iter() {
        println!("{}: {}", domain.id, domain.type_names().join(", "));
    }
    Ok(0)
}

fn load_config(resources: Option<&Path>) -> Result<AppConfig> {
    let mut config = AppConfig::from_env().context("invalid application configuration")?;
    if let Some(root) = resources {
        config.resource_root = root.to_path_buf();
    }
    Ok(config)
}

fn load_registry(config: &AppConfig) -> Result<DomainRegistry> {
    let registry = DomainRegistry::load(config).context("cannot load domains")?;
    ensure_domains(config, registry.is_empty())?;
    Ok(registry)
}

fn ensure_domains(config: &AppConfig, empty: bool) -> Result<()> {
    if empty {
        bail!(
            "no validation domains found under {}",
            config.resource_root.display()
        );
    }
    Ok(())
}

/// Wire the validator from the application configuration.
pub fn build_validator(config: &AppConfig) -> Result<Validator> {
    let validator = Validator::from_config(config).context("cannot set up validation")?;
    ensure_domains(config, validator.registry().is_empty())?;
    Ok(validator)
}

fn render(input: &Path, outcome: &ValidationOutcome, json: bool) -> Result<String> {
    if json {
        let report = serde_json::json!({
            "input": input.display().to_string(),
            "outcome": outcome,
        });
        return serde_json::to_string_pretty(&report).context("cannot serialize outcome");
    }

    let mut out = if outcome.success {
        format!("{}: valid", input.display())
    } else {
        format!("{}: {} error(s)", input.display(), outcome.errors.len())
    };
    if let Some(count) = outcome.item_count {
        out.push_str(&format!(" [{count} item(s)]"));
    }
    for record in &outcome.errors {
        if record.line > 0 {
            out.push_str(&format!("\n  line {}: {}", record.line, record.message));
        } else {
            out.push_str(&format!("\n  {}", record.message));
        }
    }
    Ok(out)
}
