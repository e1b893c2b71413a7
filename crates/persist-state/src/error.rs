//! # Life-Cycle Errors
//!
//! Two failure kinds come out of a transition and callers must be able to
//! tell them apart without string matching:
//!
//! - [`LifecycleError::User`]: the application asked for something the
//!   object's state forbids (writing a deleted object, reading outside a
//!   transaction without permission). The surrogate keeps its state.
//! - [`LifecycleError::IllegalTransition`]: the driver delivered an event
//!   the state graph can never produce (a commit notification to a `HOLLOW`
//!   object). This is a defect in the caller, not in the application.
//!
//! Side-effect failures from the surrogate pass through unchanged as
//! [`LifecycleError::Provider`].

use persist_core::{ObjectId, PersistError};
use thiserror::Error;

use crate::lifecycle::{Operation, StateType};

/// Failure of a life-cycle transition.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Operation disallowed for the object's current state.
    #[error("{kind}: {object_id} is {state}, cannot {operation}")]
    User {
        /// What the application did wrong.
        kind: UserErrorKind,
        /// The object the operation targeted.
        object_id: ObjectId,
        /// State the object remains in.
        state: StateType,
        /// The rejected operation.
        operation: Operation,
    },

    /// Event that cannot occur in this state under a correct driver.
    #[error("illegal state transition: {operation} is not valid from {state}")]
    IllegalTransition {
        /// State that received the event.
        state: StateType,
        /// The event.
        operation: Operation,
    },

    /// A raw state-type code outside the fixed enumeration.
    #[error("unknown life-cycle state type code {0}")]
    UnknownStateType(u8),

    /// Failure raised by a surrogate side effect.
    #[error(transparent)]
    Provider(#[from] PersistError),
}

impl LifecycleError {
    pub(crate) fn illegal(state: StateType, operation: Operation) -> Self {
        Self::IllegalTransition { state, operation }
    }

    /// Whether the failure was caused by application usage.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// Whether the failure indicates a driver defect.
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}

/// Application mistakes reported through [`LifecycleError::User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserErrorKind {
    /// Persistence operation on an object that was never made persistent.
    NotPersistent,
    /// Field read outside a transaction while nontransactional read is off.
    NontransactionalReadNotPermitted,
    /// Field write outside a transaction while nontransactional write is off.
    NontransactionalWriteNotPermitted,
    /// Uncommitted changes would be lost by leaving transaction control.
    DirtyObjectNontransactional,
    /// A new object cannot leave transaction control before commit.
    NewObjectNontransactional,
    /// A new object has nothing durable to fall back to.
    NewObjectTransient,
    /// Uncommitted changes would be dropped by making the object transient.
    DirtyObjectTransient,
    /// Deleted objects cannot be written.
    DeletedObjectWrite,
    /// Unloaded fields of a deleted object cannot be fetched.
    DeletedObjectRead,
    /// Deleted objects stay enlisted until the transaction ends.
    DeletedObjectNontransactional,
    /// Deleted objects cannot be made transient before the transaction ends.
    DeletedObjectTransient,
    /// Deleted objects cannot be detached.
    DeletedObjectDetach,
    /// Field was not part of the detached copy.
    DetachedFieldNotLoaded,
    /// Detached objects must be attached before deletion.
    DetachedObjectDelete,
}

impl UserErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotPersistent => "object is not persistent",
            Self::NontransactionalReadNotPermitted => {
                "nontransactional read is not permitted outside a transaction"
            }
            Self::NontransactionalWriteNotPermitted => {
                "nontransactional write is not permitted outside a transaction"
            }
            Self::DirtyObjectNontransactional => "dirty object cannot be made nontransactional",
            Self::NewObjectNontransactional => "new object cannot be made nontransactional",
            Self::NewObjectTransient => "new object cannot be made transient",
            Self::DirtyObjectTransient => "dirty object cannot be made transient",
            Self::DeletedObjectWrite => "cannot write fields of a deleted object",
            Self::DeletedObjectRead => "cannot read unloaded fields of a deleted object",
            Self::DeletedObjectNontransactional => "deleted object cannot be made nontransactional",
            Self::DeletedObjectTransient => "deleted object cannot be made transient",
            Self::DeletedObjectDetach => "deleted object cannot be detached",
            Self::DetachedFieldNotLoaded => "field was not detached",
            Self::DetachedObjectDelete => "detached object must be attached before delete",
        }
    }
}

impl std::fmt::Display for UserErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
