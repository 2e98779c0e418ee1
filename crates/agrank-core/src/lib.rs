//! agrank-core: Shared types, configuration, and error handling for agrank.
//!
//! This crate provides the foundational pieces used across all agrank crates:
//! - Proposition and exploit types with strongly typed ids
//! - The proposition/exploit store that every attack graph is derived from
//! - The policy deciding how several exploits on one transition combine
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use store::Store;
pub use types::{Exploit, ExploitId, ProbabilityPolicy, Proposition, PropositionId};
