//! # Transactional Persistent States
//!
//! ```text
//!                 write                    commit / rollback
//!  P_CLEAN ───────────────▶ P_DIRTY ─────────────────────────┐
//!     │                                                      ▼
//!     └──────── commit / rollback / evict ─────────▶ HOLLOW or P_NONTRANS
//!
//!  P_NEW ──commit──▶ HOLLOW (durable identity) or P_NONTRANS (retain values)
//!  P_NEW ──rollback──▶ TRANSIENT
//!  P_NEW ──delete──▶ P_NEW_DELETED
//! ```
//!
//! Commit keeps values (`P_NONTRANS`) when the transaction retains values,
//! and otherwise strips the object to its key (`HOLLOW`). Rollback makes the
//! same choice keyed on restore-values.

use persist_core::{FetchPlan, Transaction};

use crate::error::UserErrorKind;
use crate::lifecycle::{to_transient, user_error, Operation, StateTransitions, StateType, Transition};
use crate::provider::{transaction_mode, ObjectProvider};

/// Load fields for a retrieve: the fetch plan only, or everything.
pub(crate) fn load_for_retrieve(
    op: &mut dyn ObjectProvider,
    fg_only: bool,
) -> Result<(), persist_core::PersistError> {
    if fg_only {
        op.load_unloaded_fields_in_fetch_plan()
    } else {
        op.load_unloaded_fields()
    }
}

/// Reload fetch-plan fields and drop everything else.
pub(crate) fn refresh_fetch_plan(
    op: &mut dyn ObjectProvider,
) -> Result<(), persist_core::PersistError> {
    op.refresh_fields_in_fetch_plan()?;
    op.unload_non_fetch_plan_fields();
    Ok(())
}

/// Leave the transaction either holding values or hollowed out.
fn end_transaction(op: &mut dyn ObjectProvider, keep_values: bool) -> Transition {
    if keep_values {
        return Ok(StateType::PersistentNontransactional);
    }
    op.clear_non_primary_key_fields();
    Ok(StateType::Hollow)
}

// ─── P_NEW ───────────────────────────────────────────────────────────

/// Made persistent in the current transaction.
#[derive(Debug)]
pub(crate) struct PersistentNew;

impl StateTransitions for PersistentNew {
    fn state_type(&self) -> StateType {
        StateType::PersistentNew
    }

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::PersistentNew,
            Operation::MakeNontransactional,
            UserErrorKind::NewObjectNontransactional,
        ))
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        detach_all_on_commit: bool,
    ) -> Transition {
        if !detach_all_on_commit {
            return Err(user_error(
                op,
                StateType::PersistentNew,
                Operation::MakeTransient,
                UserErrorKind::NewObjectTransient,
            ));
        }
        to_transient(op)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        op.clear_saved_fields();
        let durable = op.class_metadata().identity_type().is_durable();
        // Without durable identity the object could never be reloaded from HOLLOW.
        end_transaction(op, tx.retain_values() || !durable)
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        if tx.restore_values() {
            op.restore_fields();
        }
        to_transient(op)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn retrieve(&self, op: &mut dyn ObjectProvider, fg_only: bool) -> Transition {
        load_for_retrieve(op, fg_only)?;
        Ok(StateType::PersistentNew)
    }

    fn retrieve_fetch_plan(&self, op: &mut dyn ObjectProvider, plan: &FetchPlan) -> Transition {
        op.load_unloaded_fields_of_class_in_fetch_plan(plan)?;
        Ok(StateType::PersistentNew)
    }

    fn refresh(&self, op: &mut dyn ObjectProvider) -> Transition {
        refresh_fetch_plan(op)?;
        Ok(StateType::PersistentNew)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNew)
    }
}

// ─── P_CLEAN ─────────────────────────────────────────────────────────

/// Persistent, enlisted, unmodified.
#[derive(Debug)]
pub(crate) struct PersistentClean;

impl StateTransitions for PersistentClean {
    fn state_type(&self) -> StateType {
        StateType::PersistentClean
    }

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::PersistentClean)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.clear_saved_fields();
        Ok(StateType::PersistentNontransactional)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        if use_fetch_plan {
            op.load_unloaded_fields_in_fetch_plan()?;
        }
        to_transient(op)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentClean)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        op.clear_saved_fields();
        end_transaction(op, tx.retain_values())
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        op.clear_saved_fields();
        end_transaction(op, tx.restore_values())
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::PersistentClean)
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        if transaction_mode(op).options.restore_values {
            op.save_fields();
        }
        Ok(StateType::PersistentDirty)
    }

    fn retrieve(&self, op: &mut dyn ObjectProvider, fg_only: bool) -> Transition {
        load_for_retrieve(op, fg_only)?;
        Ok(StateType::PersistentClean)
    }

    fn retrieve_fetch_plan(&self, op: &mut dyn ObjectProvider, plan: &FetchPlan) -> Transition {
        op.load_unloaded_fields_of_class_in_fetch_plan(plan)?;
        Ok(StateType::PersistentClean)
    }

    fn refresh(&self, op: &mut dyn ObjectProvider) -> Transition {
        refresh_fetch_plan(op)?;
        if transaction_mode(op).active {
            Ok(StateType::PersistentClean)
        } else {
            Ok(StateType::PersistentNontransactional)
        }
    }

    fn evict(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.clear_non_primary_key_fields();
        op.clear_saved_fields();
        Ok(StateType::Hollow)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentClean)
    }
}

// ─── P_DIRTY ─────────────────────────────────────────────────────────

/// Persistent, enlisted, modified in the current transaction.
#[derive(Debug)]
pub(crate) struct PersistentDirty;

impl StateTransitions for PersistentDirty {
    fn state_type(&self) -> StateType {
        StateType::PersistentDirty
    }

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::PersistentDirty)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        Err(user_error(
            op,
            StateType::PersistentDirty,
            Operation::MakeNontransactional,
            UserErrorKind::DirtyObjectNontransactional,
        ))
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        use_fetch_plan: bool,
        detach_all_on_commit: bool,
    ) -> Transition {
        if !detach_all_on_commit {
            return Err(user_error(
                op,
                StateType::PersistentDirty,
                Operation::MakeTransient,
                UserErrorKind::DirtyObjectTransient,
            ));
        }
        if use_fetch_plan {
            op.load_unloaded_fields_in_fetch_plan()?;
        }
        to_transient(op)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDirty)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        op.clear_saved_fields();
        end_transaction(op, tx.retain_values())
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        if tx.restore_values() {
            op.restore_fields();
            return Ok(StateType::PersistentNontransactional);
        }
        op.clear_non_primary_key_fields();
        op.clear_saved_fields();
        Ok(StateType::Hollow)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::PersistentDirty)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDirty)
    }

    fn retrieve(&self, op: &mut dyn ObjectProvider, fg_only: bool) -> Transition {
        load_for_retrieve(op, fg_only)?;
        Ok(StateType::PersistentDirty)
    }

    fn retrieve_fetch_plan(&self, op: &mut dyn ObjectProvider, plan: &FetchPlan) -> Transition {
        op.load_unloaded_fields_of_class_in_fetch_plan(plan)?;
        Ok(StateType::PersistentDirty)
    }

    fn refresh(&self, op: &mut dyn ObjectProvider) -> Transition {
        refresh_fetch_plan(op)?;
        if transaction_mode(op).is_pessimistic_active() {
            Ok(StateType::PersistentClean)
        } else {
            Ok(StateType::PersistentNontransactional)
        }
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDirty)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDirty)
    }
}
