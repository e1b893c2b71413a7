//! # persist-core: Foundational Types for the Life-Cycle Engine
//!
//! Defines the types every other crate in the workspace builds on. The
//! state machine in `persist-state` consumes these as facts about the world:
//! who an object is, how its class is shaped, which transaction mode is in
//! force, and how the provider is configured.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identity.** `ObjectId` wraps a UUID; there are no bare
//!    strings or integers standing in for object identity.
//!
//! 2. **One transaction contract.** The `Transaction` trait exposes exactly
//!    the six mode flags that drive transitions. `LocalTransaction` is the
//!    in-process implementation used by the reference session.
//!
//! 3. **Explicit identity durability.** `IdentityType::is_durable()` is the
//!    single place that decides whether key fields survive a commit into
//!    `HOLLOW`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `persist-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod temporal;
pub mod transaction;

// Re-export primary types for ergonomic imports.
pub use config::{ConfigError, PersistenceConfig};
pub use error::PersistError;
pub use identity::{IdentityType, ObjectId};
pub use metadata::{ClassMetaData, FetchPlan, FieldMetaData, DEFAULT_FETCH_GROUP};
pub use temporal::Timestamp;
pub use transaction::{LocalTransaction, Transaction, TransactionMode, TransactionOptions};
