//! # State Factory
//!
//! Maps a [`StateType`] (or its raw code) to the shared singleton. The
//! table is a `static` evaluated at compile time, so it exists exactly once
//! before any lookup and is never written afterwards.

use crate::deleted::{PersistentDeleted, PersistentNewDeleted};
use crate::detached::{DetachedClean, DetachedDirty};
use crate::error::LifecycleError;
use crate::lifecycle::{LifeCycleState, StateFlags, StateType};
use crate::nontransactional::{Hollow, PersistentNontransactional};
use crate::persistent::{PersistentClean, PersistentDirty, PersistentNew};
use crate::transient::{Transient, TransientClean, TransientDirty};

/// Indexed by `StateType::code()`.
static STATES: [LifeCycleState; StateType::COUNT] = [
    LifeCycleState::new(StateType::Transient, StateFlags::NONE, &Transient),
    LifeCycleState::new(
        StateType::PersistentClean,
        StateFlags {
            persistent: true,
            transactional: true,
            ..StateFlags::NONE
        },
        &PersistentClean,
    ),
    LifeCycleState::new(
        StateType::PersistentDirty,
        StateFlags {
            persistent: true,
            transactional: true,
            dirty: true,
            ..StateFlags::NONE
        },
        &PersistentDirty,
    ),
    LifeCycleState::new(
        StateType::PersistentNew,
        StateFlags {
            persistent: true,
            transactional: true,
            dirty: true,
            new: true,
            ..StateFlags::NONE
        },
        &PersistentNew,
    ),
    LifeCycleState::new(
        StateType::PersistentNewDeleted,
        StateFlags {
            persistent: true,
            transactional: true,
            dirty: true,
            new: true,
            deleted: true,
            detached: false,
        },
        &PersistentNewDeleted,
    ),
    LifeCycleState::new(
        StateType::PersistentDeleted,
        StateFlags {
            persistent: true,
            transactional: true,
            dirty: true,
            deleted: true,
            ..StateFlags::NONE
        },
        &PersistentDeleted,
    ),
    LifeCycleState::new(
        StateType::PersistentNontransactional,
        StateFlags {
            persistent: true,
            ..StateFlags::NONE
        },
        &PersistentNontransactional,
    ),
    LifeCycleState::new(
        StateType::TransientClean,
        StateFlags {
            transactional: true,
            ..StateFlags::NONE
        },
        &TransientClean,
    ),
    LifeCycleState::new(
        StateType::TransientDirty,
        StateFlags {
            transactional: true,
            dirty: true,
            ..StateFlags::NONE
        },
        &TransientDirty,
    ),
    LifeCycleState::new(
        StateType::Hollow,
        StateFlags {
            persistent: true,
            ..StateFlags::NONE
        },
        &Hollow,
    ),
    LifeCycleState::new(
        StateType::DetachedClean,
        StateFlags {
            detached: true,
            ..StateFlags::NONE
        },
        &DetachedClean,
    ),
    LifeCycleState::new(
        StateType::DetachedDirty,
        StateFlags {
            dirty: true,
            detached: true,
            ..StateFlags::NONE
        },
        &DetachedDirty,
    ),
];

/// Lookup of life-cycle state singletons.
pub struct LifeCycleStateFactory;

impl LifeCycleStateFactory {
    /// The singleton for `state_type`.
    pub fn get(state_type: StateType) -> &'static LifeCycleState {
        &STATES[usize::from(state_type.code())]
    }

    /// The singleton for a raw code.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnknownStateType`] for codes outside the
    /// enumeration. This is a programming error, never a user error.
    pub fn from_code(code: u8) -> Result<&'static LifeCycleState, LifecycleError> {
        StateType::try_from(code).map(Self::get)
    }

    /// Every singleton, ordered by code.
    pub fn all() -> impl Iterator<Item = &'static LifeCycleState> {
        STATES.iter()
    }
}
