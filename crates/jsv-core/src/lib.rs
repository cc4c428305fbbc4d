//! # jsv-core: Foundational Types for the JSON Validator
//!
//! Defines the primitives shared by every other crate in the workspace.
//! It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `DomainId`, `ValidationType` and
//!    `SchemaId` are newtypes. Schema identifiers are normalized at
//!    construction so lookups never depend on a trailing `#`.
//!
//! 2. **Single `CombinationApproach` enum.** One definition, exhaustive
//!    `match` everywhere.
//!
//! 3. **Structured errors.** Request, resolution and configuration failures
//!    are separate `thiserror` enums, unified by [`JsvError`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `jsv-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod approach;
pub mod error;
pub mod identity;

// Re-export primary types for ergonomic imports.
pub use approach::CombinationApproach;
pub use error::{ConfigurationError, JsvError, ResolutionError, ValidationError};
pub use identity::{DomainId, SchemaId, ValidationType};
