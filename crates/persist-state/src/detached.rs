//! # Detached States
//!
//! A detached object carries the fields that were loaded when it left its
//! execution context. It can be read and modified offline and is brought back
//! by attach (or make-persistent), which enlists it in the current
//! transaction.

use crate::error::UserErrorKind;
use crate::lifecycle::{to_transient, user_error, Operation, StateTransitions, StateType, Transition};
use crate::provider::ObjectProvider;

fn read_detached(op: &dyn ObjectProvider, state: StateType, is_loaded: bool) -> Transition {
    if !is_loaded {
        return Err(user_error(
            op,
            state,
            Operation::ReadField,
            UserErrorKind::DetachedFieldNotLoaded,
        ));
    }
    Ok(state)
}

fn reattach(op: &mut dyn ObjectProvider, next: StateType) -> Transition {
    op.register_transactional();
    Ok(next)
}

fn reject_delete(op: &dyn ObjectProvider, state: StateType) -> Transition {
    Err(user_error(
        op,
        state,
        Operation::DeletePersistent,
        UserErrorKind::DetachedObjectDelete,
    ))
}

// ─── DETACHED_CLEAN ──────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct DetachedClean;

impl StateTransitions for DetachedClean {
    fn state_type(&self) -> StateType {
        StateType::DetachedClean
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject_delete(op, StateType::DetachedClean)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        to_transient(op)
    }

    fn make_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        reattach(op, StateType::PersistentClean)
    }

    fn read_field(&self, op: &mut dyn ObjectProvider, is_loaded: bool) -> Transition {
        read_detached(op, StateType::DetachedClean, is_loaded)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedDirty)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn attach(&self, op: &mut dyn ObjectProvider) -> Transition {
        reattach(op, StateType::PersistentClean)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }
}

// ─── DETACHED_DIRTY ──────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct DetachedDirty;

impl StateTransitions for DetachedDirty {
    fn state_type(&self) -> StateType {
        StateType::DetachedDirty
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject_delete(op, StateType::DetachedDirty)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        to_transient(op)
    }

    fn make_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        reattach(op, StateType::PersistentDirty)
    }

    fn read_field(&self, op: &mut dyn ObjectProvider, is_loaded: bool) -> Transition {
        read_detached(op, StateType::DetachedDirty, is_loaded)
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedDirty)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedDirty)
    }

    fn attach(&self, op: &mut dyn ObjectProvider) -> Transition {
        reattach(op, StateType::PersistentDirty)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedDirty)
    }
}

#[cfg(test)]
mod tests {
    use persist_core::TransactionOptions;

    use crate::factory::LifeCycleStateFactory;
    use crate::lifecycle::{LifeCycleState, StateType};
    use crate::mock::{MockObjectProvider, ProviderCall};

    fn state(st: StateType) -> &'static LifeCycleState {
        LifeCycleStateFactory::get(st)
    }

    #[test]
    fn test_write_dirties_detached_copy() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::DetachedClean)
            .transition_write_field(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::DetachedDirty);
        let again = next.transition_write_field(&mut op).unwrap();
        assert_eq!(again.state_type(), StateType::DetachedDirty);
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_unloaded_field_read_is_user_error() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let detached = state(StateType::DetachedClean);
        assert!(detached.transition_read_field(&mut op, true).is_ok());
        assert!(detached
            .transition_read_field(&mut op, false)
            .unwrap_err()
            .is_user_error());
    }

    #[test]
    fn test_attach_enlists_with_dirtiness_preserved() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        assert_eq!(
            state(StateType::DetachedClean)
                .transition_attach(&mut op)
                .unwrap()
                .state_type(),
            StateType::PersistentClean
        );
        assert_eq!(
            state(StateType::DetachedDirty)
                .transition_make_persistent(&mut op)
                .unwrap()
                .state_type(),
            StateType::PersistentDirty
        );
        assert_eq!(op.count(ProviderCall::RegisterTransactional), 2);
    }

    #[test]
    fn test_delete_requires_attach() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        assert!(state(StateType::DetachedDirty)
            .transition_delete_persistent(&mut op)
            .unwrap_err()
            .is_user_error());
    }

    #[test]
    fn test_transaction_events_are_illegal() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let tx = op.mode();
        for st in [StateType::DetachedClean, StateType::DetachedDirty] {
            let detached = state(st);
            assert!(detached.transition_commit(&mut op, &tx).unwrap_err().is_illegal_transition());
            assert!(detached.transition_rollback(&mut op, &tx).unwrap_err().is_illegal_transition());
            assert!(detached.transition_evict(&mut op).unwrap_err().is_illegal_transition());
            assert!(detached.transition_refresh(&mut op).unwrap_err().is_illegal_transition());
        }
    }

    #[test]
    fn test_make_transient_disconnects() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::DetachedDirty)
            .transition_make_transient(&mut op, false, false)
            .unwrap();
        assert_eq!(next.state_type(), StateType::Transient);
        assert_eq!(op.calls(), &[ProviderCall::Disconnect]);
    }
}
