//! # Transient States
//!
//! ```text
//!               make_transactional            write (tx active)
//! TRANSIENT ─────────────────────▶ T_CLEAN ───────────────────▶ T_DIRTY
//!     ▲                               │  ◀───── commit/rollback ───┘
//!     └──── make_nontransactional ────┘
//!
//! TRANSIENT / T_CLEAN / T_DIRTY ──make_persistent──▶ P_NEW
//! ```
//!
//! A transient object has no datastore identity. `T_CLEAN` and `T_DIRTY`
//! are transient objects enlisted in the transaction so their values can be
//! snapshotted and restored on rollback.

use persist_core::{FetchPlan, Transaction};

use crate::error::UserErrorKind;
use crate::lifecycle::{to_transient, user_error, Operation, StateTransitions, StateType, Transition};
use crate::provider::{transaction_mode, ObjectProvider};

/// Not managed.
#[derive(Debug)]
pub(crate) struct Transient;

impl StateTransitions for Transient {
    fn state_type(&self) -> StateType {
        StateType::Transient
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::Transient,
            Operation::DeletePersistent,
            UserErrorKind::NotPersistent,
        ))
    }

    fn make_transactional(&self, op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        op.register_transactional();
        Ok(StateType::TransientClean)
    }

    fn make_nontransactional(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Transient)
    }

    fn make_transient(&self, _op: &mut dyn ObjectProvider, _: bool, _: bool) -> Transition {
        Ok(StateType::Transient)
    }

    fn make_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.register_transactional();
        Ok(StateType::PersistentNew)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::Transient)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Transient)
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Ok(StateType::Transient)
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Ok(StateType::Transient)
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Transient)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Transient)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Transient)
    }
}

/// Transient, enlisted, unmodified.
#[derive(Debug)]
pub(crate) struct TransientClean;

impl StateTransitions for TransientClean {
    fn state_type(&self) -> StateType {
        StateType::TransientClean
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::TransientClean,
            Operation::DeletePersistent,
            UserErrorKind::NotPersistent,
        ))
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        to_transient(op)
    }

    fn make_transient(&self, _op: &mut dyn ObjectProvider, _: bool, _: bool) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn make_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.register_transactional();
        Ok(StateType::PersistentNew)
    }

    fn commit(&self, _op: &mut dyn ObjectProvider, _tx: &dyn Transaction) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn rollback(&self, _op: &mut dyn ObjectProvider, _tx: &dyn Transaction) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        if transaction_mode(op).active {
            op.save_fields();
            return Ok(StateType::TransientDirty);
        }
        Ok(StateType::TransientClean)
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientClean)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientClean)
    }
}

/// Transient, enlisted, modified in the current transaction.
#[derive(Debug)]
pub(crate) struct TransientDirty;

impl StateTransitions for TransientDirty {
    fn state_type(&self) -> StateType {
        StateType::TransientDirty
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::TransientDirty,
            Operation::DeletePersistent,
            UserErrorKind::NotPersistent,
        ))
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::TransientDirty,
            Operation::MakeNontransactional,
            UserErrorKind::DirtyObjectNontransactional,
        ))
    }

    fn make_transient(&self, _op: &mut dyn ObjectProvider, _: bool, _: bool) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn make_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.register_transactional();
        Ok(StateType::PersistentNew)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, _tx: &dyn Transaction) -> Transition {
        op.clear_saved_fields();
        Ok(StateType::TransientClean)
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        if tx.restore_values() || op.is_restore_values() {
            op.restore_fields();
        } else {
            op.clear_saved_fields();
        }
        Ok(StateType::TransientClean)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientDirty)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::TransientDirty)
    }
}
