//! # persist-state: Persistence Life-Cycle State Machine
//!
//! Tracks where a managed object stands relative to its datastore and the
//! current transaction. Twelve states, each a shared immutable singleton;
//! transitions run side effects against the object's surrogate
//! ([`ObjectProvider`]) and return the singleton for the next state.
//!
//! ## States
//!
//! - **Transient** (`transient.rs`): `TRANSIENT`, `T_CLEAN`, `T_DIRTY`.
//!   Objects without datastore identity, optionally enlisted for rollback.
//!
//! - **Persistent** (`persistent.rs`): `P_NEW`, `P_CLEAN`, `P_DIRTY`.
//!   Enlisted in the current transaction.
//!
//! - **Nontransactional** (`nontransactional.rs`): `P_NONTRANS`, `HOLLOW`.
//!   Persistent but outside any transaction; promoted on first access.
//!
//! - **Deleted** (`deleted.rs`): `P_NEW_DELETED`, `P_DELETED`.
//!
//! - **Detached** (`detached.rs`): `DETACHED_CLEAN`, `DETACHED_DIRTY`.
//!
//! ## Failures
//!
//! A transition either succeeds with the next state or fails with a
//! [`LifecycleError`]. Application misuse ([`LifecycleError::User`]) and
//! events the graph never produces ([`LifecycleError::IllegalTransition`])
//! are distinct variants. On failure the surrogate keeps its state.
//!
//! ## Reference Surrogate
//!
//! [`StateManager`] and [`Session`] implement the surrogate and its
//! execution context over an in-memory datastore. [`mock::MockObjectProvider`]
//! records calls instead of moving values, for checking side effects.

pub mod datastore;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod managed;
pub mod mock;
pub mod provider;
pub mod session;

mod deleted;
mod detached;
mod nontransactional;
mod persistent;
mod transient;

// ─── State machine re-exports ───────────────────────────────────────

pub use error::{LifecycleError, UserErrorKind};
pub use factory::LifeCycleStateFactory;
pub use lifecycle::{LifeCycleState, Operation, StateFlags, StateType};
pub use provider::{ExecutionContext, ObjectProvider};

// ─── Surrogate re-exports ───────────────────────────────────────────

pub use datastore::{MemoryDatastore, Row};
pub use managed::{StateManager, TransitionRecord};
pub use session::{Session, SessionContext};
