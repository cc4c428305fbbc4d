//! # jsv-cli: JSON Validator Command-Line Interface
//!
//! Loads the configured domains, builds the validator once, and runs it over
//! local files.
//!
//! ## Subcommands
//!
//! - `validate`: validate one or more documents against a domain's
//!   validation type, optionally with user-provided schemas
//! - `domains`: list the loaded domains and their validation types
//!
//! ## Crate Policy
//!
//! - Argument parsing is separated from business logic.
//! - Handlers delegate to `jsv-schema`; no validation logic lives here.
//! - Handlers return an exit code: `0` success, `1` validation failure.
//!   Operational errors are reported by the binary with exit code `2`.

pub mod validate;
