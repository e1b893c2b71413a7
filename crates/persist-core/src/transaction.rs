//! # Transaction Contract
//!
//! The life-cycle states read six flags from the transaction and nothing
//! else. `Transaction` is that contract; `LocalTransaction` is the
//! in-process implementation the reference session drives, and
//! `TransactionMode` is a copyable snapshot of the flags so a state can read
//! them once and then mutate the surrogate freely.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::PersistError;

/// Mode flags consumed by life-cycle transitions.
pub trait Transaction {
    /// Whether a transaction is currently in progress.
    fn is_active(&self) -> bool;
    /// Whether conflict detection is deferred to commit.
    fn optimistic(&self) -> bool;
    /// Whether field values survive commit.
    fn retain_values(&self) -> bool;
    /// Whether field values are restored to their pre-transaction values on rollback.
    fn restore_values(&self) -> bool;
    /// Whether fields may be read outside a transaction.
    fn nontransactional_read(&self) -> bool;
    /// Whether fields may be written outside a transaction.
    fn nontransactional_write(&self) -> bool;

    /// Snapshot of all six flags.
    fn mode(&self) -> TransactionMode {
        TransactionMode {
            active: self.is_active(),
            options: TransactionOptions {
                optimistic: self.optimistic(),
                retain_values: self.retain_values(),
                restore_values: self.restore_values(),
                nontransactional_read: self.nontransactional_read(),
                nontransactional_write: self.nontransactional_write(),
            },
        }
    }
}

/// Configurable transaction behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    pub optimistic: bool,
    pub retain_values: bool,
    pub restore_values: bool,
    pub nontransactional_read: bool,
    pub nontransactional_write: bool,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            optimistic: false,
            retain_values: false,
            restore_values: false,
            nontransactional_read: true,
            nontransactional_write: false,
        }
    }
}

/// A point-in-time copy of a transaction's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionMode {
    /// Whether the transaction was active when the snapshot was taken.
    pub active: bool,
    /// The transaction's options.
    pub options: TransactionOptions,
}

impl TransactionMode {
    /// An active transaction with the given options.
    pub fn active(options: TransactionOptions) -> Self {
        Self {
            active: true,
            options,
        }
    }

    /// No transaction in progress.
    pub fn inactive(options: TransactionOptions) -> Self {
        Self {
            active: false,
            options,
        }
    }

    /// Active and pessimistic: reads enlist the object immediately.
    pub fn is_pessimistic_active(&self) -> bool {
        self.active && !self.options.optimistic
    }
}

impl Transaction for TransactionMode {
    fn is_active(&self) -> bool {
        self.active
    }
    fn optimistic(&self) -> bool {
        self.options.optimistic
    }
    fn retain_values(&self) -> bool {
        self.options.retain_values
    }
    fn restore_values(&self) -> bool {
        self.options.restore_values
    }
    fn nontransactional_read(&self) -> bool {
        self.options.nontransactional_read
    }
    fn nontransactional_write(&self) -> bool {
        self.options.nontransactional_write
    }
    fn mode(&self) -> TransactionMode {
        *self
    }
}

/// In-process transaction with an atomically toggled active flag.
///
/// Shared between a session and the surrogates it hands out; the flag is
/// the only mutable part.
#[derive(Debug, Default)]
pub struct LocalTransaction {
    active: AtomicBool,
    options: TransactionOptions,
}

impl LocalTransaction {
    /// Create an inactive transaction with the given options.
    pub fn new(options: TransactionOptions) -> Self {
        Self {
            active: AtomicBool::new(false),
            options,
        }
    }

    /// Start the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionState`] if already active.
    pub fn begin(&self) -> Result<(), PersistError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| PersistError::TransactionState("transaction is already active".into()))
    }

    /// Mark the transaction finished.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionState`] if no transaction is active.
    pub fn end(&self) -> Result<(), PersistError> {
        self.active
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| PersistError::TransactionState("no transaction is active".into()))
    }
}

impl Transaction for LocalTransaction {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
    fn optimistic(&self) -> bool {
        self.options.optimistic
    }
    fn retain_values(&self) -> bool {
        self.options.retain_values
    }
    fn restore_values(&self) -> bool {
        self.options.restore_values
    }
    fn nontransactional_read(&self) -> bool {
        self.options.nontransactional_read
    }
    fn nontransactional_write(&self) -> bool {
        self.options.nontransactional_write
    }
}
