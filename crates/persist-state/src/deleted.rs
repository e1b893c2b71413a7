//! # Deleted States
//!
//! A deleted object stays enlisted until the transaction ends. Commit makes
//! the deletion final and the object transient; rollback undoes it.

use persist_core::{FetchPlan, Transaction};

use crate::error::UserErrorKind;
use crate::lifecycle::{to_transient, user_error, Operation, StateTransitions, StateType, Transition};
use crate::provider::ObjectProvider;

fn commit_deletion(op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
    if !tx.retain_values() {
        op.clear_fields();
    }
    to_transient(op)
}

/// Rejections shared by both deleted states.
fn reject(op: &dyn ObjectProvider, state: StateType, operation: Operation) -> Transition {
    let kind = match operation {
        Operation::WriteField => UserErrorKind::DeletedObjectWrite,
        Operation::MakeNontransactional => UserErrorKind::DeletedObjectNontransactional,
        Operation::MakeTransient => UserErrorKind::DeletedObjectTransient,
        Operation::Detach => UserErrorKind::DeletedObjectDetach,
        _ => UserErrorKind::DeletedObjectRead,
    };
    Err(user_error(op, state, operation, kind))
}

// ─── P_NEW_DELETED ───────────────────────────────────────────────────

/// Made persistent and deleted in the same transaction.
#[derive(Debug)]
pub(crate) struct PersistentNewDeleted;

impl StateTransitions for PersistentNewDeleted {
    fn state_type(&self) -> StateType {
        StateType::PersistentNewDeleted
    }

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentNewDeleted, Operation::MakeNontransactional)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        reject(op, StateType::PersistentNewDeleted, Operation::MakeTransient)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNew)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        commit_deletion(op, tx)
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        if tx.restore_values() {
            op.restore_fields();
        }
        to_transient(op)
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentNewDeleted, Operation::WriteField)
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }

    fn detach(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentNewDeleted, Operation::Detach)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNewDeleted)
    }
}

// ─── P_DELETED ───────────────────────────────────────────────────────

/// Previously committed, deleted in the current transaction.
#[derive(Debug)]
pub(crate) struct PersistentDeleted;

impl StateTransitions for PersistentDeleted {
    fn state_type(&self) -> StateType {
        StateType::PersistentDeleted
    }

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn make_nontransactional(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentDeleted, Operation::MakeNontransactional)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        reject(op, StateType::PersistentDeleted, Operation::MakeTransient)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentClean)
    }

    fn commit(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        commit_deletion(op, tx)
    }

    fn rollback(&self, op: &mut dyn ObjectProvider, tx: &dyn Transaction) -> Transition {
        if tx.restore_values() {
            op.restore_fields();
            return Ok(StateType::PersistentNontransactional);
        }
        op.clear_non_primary_key_fields();
        Ok(StateType::Hollow)
    }

    fn read_field(&self, op: &mut dyn ObjectProvider, is_loaded: bool) -> Transition {
        if !is_loaded {
            return reject(op, StateType::PersistentDeleted, Operation::ReadField);
        }
        Ok(StateType::PersistentDeleted)
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentDeleted, Operation::WriteField)
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }

    fn detach(&self, op: &mut dyn ObjectProvider) -> Transition {
        reject(op, StateType::PersistentDeleted, Operation::Detach)
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentDeleted)
    }
}

#[cfg(test)]
mod tests {
    use persist_core::TransactionOptions;

    use crate::error::{LifecycleError, UserErrorKind};
    use crate::factory::LifeCycleStateFactory;
    use crate::lifecycle::{LifeCycleState, StateType};
    use crate::mock::{MockObjectProvider, ProviderCall};

    fn state(st: StateType) -> &'static LifeCycleState {
        LifeCycleStateFactory::get(st)
    }

    fn user_kind(err: LifecycleError) -> UserErrorKind {
        match err {
            LifecycleError::User { kind, .. } => kind,
            other => panic!("expected user error, got {other:?}"),
        }
    }

    // ── P_NEW_DELETED ────────────────────────────────────────────────

    #[test]
    fn test_new_deleted_read_is_idempotent() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let p_new_deleted = state(StateType::PersistentNewDeleted);
        for is_loaded in [true, false, true] {
            let next = p_new_deleted.transition_read_field(&mut op, is_loaded).unwrap();
            assert!(std::ptr::eq(next, p_new_deleted));
        }
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_new_deleted_write_is_user_error() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let err = state(StateType::PersistentNewDeleted)
            .transition_write_field(&mut op)
            .unwrap_err();
        assert_eq!(user_kind(err), UserErrorKind::DeletedObjectWrite);
    }

    #[test]
    fn test_new_deleted_commit_clears_unless_retaining() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let tx = op.mode();
        let next = state(StateType::PersistentNewDeleted)
            .transition_commit(&mut op, &tx)
            .unwrap();
        assert_eq!(next.state_type(), StateType::Transient);
        assert_eq!(op.calls(), &[ProviderCall::ClearFields, ProviderCall::Disconnect]);

        let mut op = MockObjectProvider::active(TransactionOptions {
            retain_values: true,
            ..TransactionOptions::default()
        });
        let tx = op.mode();
        state(StateType::PersistentNewDeleted)
            .transition_commit(&mut op, &tx)
            .unwrap();
        assert_eq!(op.calls(), &[ProviderCall::Disconnect]);
    }

    #[test]
    fn test_new_deleted_rollback_goes_transient() {
        let mut op = MockObjectProvider::active(TransactionOptions {
            restore_values: true,
            ..TransactionOptions::default()
        });
        let tx = op.mode();
        let next = state(StateType::PersistentNewDeleted)
            .transition_rollback(&mut op, &tx)
            .unwrap();
        assert_eq!(next.state_type(), StateType::Transient);
        assert_eq!(op.calls(), &[ProviderCall::RestoreFields, ProviderCall::Disconnect]);
    }

    #[test]
    fn test_new_deleted_make_persistent_undeletes() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::PersistentNewDeleted)
            .transition_make_persistent(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNew);
    }

    #[test]
    fn test_new_deleted_attach_is_illegal() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        assert!(state(StateType::PersistentNewDeleted)
            .transition_attach(&mut op)
            .unwrap_err()
            .is_illegal_transition());
    }

    // ── P_DELETED ────────────────────────────────────────────────────

    #[test]
    fn test_deleted_read_depends_on_loaded() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let p_deleted = state(StateType::PersistentDeleted);
        assert_eq!(
            p_deleted.transition_read_field(&mut op, true).unwrap().state_type(),
            StateType::PersistentDeleted
        );
        let err = p_deleted.transition_read_field(&mut op, false).unwrap_err();
        assert_eq!(user_kind(err), UserErrorKind::DeletedObjectRead);
    }

    #[test]
    fn test_deleted_rejections() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let p_deleted = state(StateType::PersistentDeleted);
        assert_eq!(
            user_kind(p_deleted.transition_write_field(&mut op).unwrap_err()),
            UserErrorKind::DeletedObjectWrite
        );
        assert_eq!(
            user_kind(p_deleted.transition_detach(&mut op).unwrap_err()),
            UserErrorKind::DeletedObjectDetach
        );
        assert_eq!(
            user_kind(p_deleted.transition_make_transient(&mut op, false, true).unwrap_err()),
            UserErrorKind::DeletedObjectTransient
        );
        assert_eq!(
            user_kind(p_deleted.transition_make_nontransactional(&mut op).unwrap_err()),
            UserErrorKind::DeletedObjectNontransactional
        );
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_deleted_rollback_by_restore_values() {
        let mut op = MockObjectProvider::active(TransactionOptions {
            restore_values: true,
            ..TransactionOptions::default()
        });
        let tx = op.mode();
        assert_eq!(
            state(StateType::PersistentDeleted)
                .transition_rollback(&mut op, &tx)
                .unwrap()
                .state_type(),
            StateType::PersistentNontransactional
        );

        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let tx = op.mode();
        assert_eq!(
            state(StateType::PersistentDeleted)
                .transition_rollback(&mut op, &tx)
                .unwrap()
                .state_type(),
            StateType::Hollow
        );
        assert_eq!(op.calls(), &[ProviderCall::ClearNonPrimaryKeyFields]);
    }

    #[test]
    fn test_deleted_make_persistent_goes_clean() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::PersistentDeleted)
            .transition_make_persistent(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentClean);
    }
}
