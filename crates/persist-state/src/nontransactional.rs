//! # Nontransactional Persistent States
//!
//! `P_NONTRANS` holds values that are not enlisted in any transaction;
//! `HOLLOW` holds only the key. Both are promoted into the transaction
//! (`P_CLEAN` / `P_DIRTY`) on first access under an active transaction. A
//! pessimistic transaction enlists on read; an optimistic one waits for the
//! first write.

use persist_core::FetchPlan;

use crate::error::UserErrorKind;
use crate::lifecycle::{to_transient, user_error, Operation, StateTransitions, StateType, Transition};
use crate::persistent::{load_for_retrieve, refresh_fetch_plan};
use crate::provider::{transaction_mode, ObjectProvider};

/// Enlist under a pessimistic active transaction, otherwise `P_NONTRANS`.
fn enlist_if_pessimistic(op: &mut dyn ObjectProvider) -> StateType {
    if transaction_mode(op).is_pessimistic_active() {
        op.register_transactional();
        StateType::PersistentClean
    } else {
        StateType::PersistentNontransactional
    }
}

fn make_transactional(op: &mut dyn ObjectProvider, refresh_fields: bool) -> Transition {
    if refresh_fields {
        op.refresh_loaded_fields()?;
    }
    op.register_transactional();
    Ok(StateType::PersistentClean)
}

fn make_transient(op: &mut dyn ObjectProvider, use_fetch_plan: bool) -> Transition {
    if use_fetch_plan {
        op.load_unloaded_fields_in_fetch_plan()?;
    }
    to_transient(op)
}

fn delete(op: &mut dyn ObjectProvider) -> Transition {
    op.register_transactional();
    Ok(StateType::PersistentDeleted)
}

// ─── P_NONTRANS ──────────────────────────────────────────────────────

/// Persistent with values, outside any transaction.
#[derive(Debug)]
pub(crate) struct PersistentNontransactional;

impl PersistentNontransactional {
    fn after_retrieve(op: &mut dyn ObjectProvider) -> StateType {
        let mode = transaction_mode(op);
        if !mode.active {
            return StateType::PersistentNontransactional;
        }
        op.save_fields();
        if mode.options.optimistic {
            StateType::PersistentNontransactional
        } else {
            op.register_transactional();
            StateType::PersistentClean
        }
    }
}

impl StateTransitions for PersistentNontransactional {
    fn state_type(&self) -> StateType {
        StateType::PersistentNontransactional
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        delete(op)
    }

    fn make_transactional(&self, op: &mut dyn ObjectProvider, refresh_fields: bool) -> Transition {
        make_transactional(op, refresh_fields)
    }

    fn make_nontransactional(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNontransactional)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        make_transient(op, use_fetch_plan)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::PersistentNontransactional)
    }

    fn read_field(&self, op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        if !transaction_mode(op).is_pessimistic_active() {
            return Ok(StateType::PersistentNontransactional);
        }
        op.save_fields();
        op.refresh_loaded_fields()?;
        op.register_transactional();
        Ok(StateType::PersistentClean)
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        // Write permission outside a transaction is checked by the caller.
        if !transaction_mode(op).active {
            return Ok(StateType::PersistentNontransactional);
        }
        op.save_fields();
        op.register_transactional();
        Ok(StateType::PersistentDirty)
    }

    fn retrieve(&self, op: &mut dyn ObjectProvider, fg_only: bool) -> Transition {
        load_for_retrieve(op, fg_only)?;
        Ok(Self::after_retrieve(op))
    }

    fn retrieve_fetch_plan(&self, op: &mut dyn ObjectProvider, plan: &FetchPlan) -> Transition {
        op.load_unloaded_fields_of_class_in_fetch_plan(plan)?;
        Ok(Self::after_retrieve(op))
    }

    fn refresh(&self, op: &mut dyn ObjectProvider) -> Transition {
        refresh_fetch_plan(op)?;
        Ok(StateType::PersistentNontransactional)
    }

    fn evict(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.clear_non_primary_key_fields();
        op.clear_saved_fields();
        Ok(StateType::Hollow)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn serialize(&self, op: &mut dyn ObjectProvider) -> Transition {
        Ok(enlist_if_pessimistic(op))
    }
}

// ─── HOLLOW ──────────────────────────────────────────────────────────

/// Persistent, key fields only.
#[derive(Debug)]
pub(crate) struct Hollow;

impl StateTransitions for Hollow {
    fn state_type(&self) -> StateType {
        StateType::Hollow
    }

    fn delete_persistent(&self, op: &mut dyn ObjectProvider) -> Transition {
        delete(op)
    }

    fn make_transactional(&self, op: &mut dyn ObjectProvider, refresh_fields: bool) -> Transition {
        make_transactional(op, refresh_fields)
    }

    fn make_nontransactional(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Hollow)
    }

    fn make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        make_transient(op, use_fetch_plan)
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Hollow)
    }

    fn read_field(&self, op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        let mode = transaction_mode(op);
        if !mode.active && !mode.options.nontransactional_read {
            return Err(user_error(
                op,
                StateType::Hollow,
                Operation::ReadField,
                UserErrorKind::NontransactionalReadNotPermitted,
            ));
        }
        op.load_unloaded_fields()?;
        Ok(enlist_if_pessimistic(op))
    }

    fn write_field(&self, op: &mut dyn ObjectProvider) -> Transition {
        let mode = transaction_mode(op);
        if !mode.active && !mode.options.nontransactional_write {
            return Err(user_error(
                op,
                StateType::Hollow,
                Operation::WriteField,
                UserErrorKind::NontransactionalWriteNotPermitted,
            ));
        }
        if !mode.active {
            return Ok(StateType::PersistentNontransactional);
        }
        if mode.options.restore_values {
            op.save_fields();
        }
        op.register_transactional();
        Ok(StateType::PersistentDirty)
    }

    fn retrieve(&self, op: &mut dyn ObjectProvider, fg_only: bool) -> Transition {
        load_for_retrieve(op, fg_only)?;
        Ok(enlist_if_pessimistic(op))
    }

    fn retrieve_fetch_plan(&self, op: &mut dyn ObjectProvider, plan: &FetchPlan) -> Transition {
        op.load_unloaded_fields_of_class_in_fetch_plan(plan)?;
        Ok(enlist_if_pessimistic(op))
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Hollow)
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::Hollow)
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Ok(StateType::DetachedClean)
    }

    fn serialize(&self, op: &mut dyn ObjectProvider) -> Transition {
        op.load_unloaded_fields()?;
        Ok(enlist_if_pessimistic(op))
    }
}

#[cfg(test)]
mod tests {
    use persist_core::{FetchPlan, TransactionOptions};

    use crate::error::{LifecycleError, UserErrorKind};
    use crate::factory::LifeCycleStateFactory;
    use crate::lifecycle::{LifeCycleState, StateType};
    use crate::mock::{MockObjectProvider, ProviderCall};

    fn state(st: StateType) -> &'static LifeCycleState {
        LifeCycleStateFactory::get(st)
    }

    fn optimistic() -> TransactionOptions {
        TransactionOptions {
            optimistic: true,
            ..TransactionOptions::default()
        }
    }

    fn no_nontransactional_access() -> TransactionOptions {
        TransactionOptions {
            nontransactional_read: false,
            nontransactional_write: false,
            ..TransactionOptions::default()
        }
    }

    // ── P_NONTRANS ───────────────────────────────────────────────────

    #[test]
    fn test_nontrans_pessimistic_read_enlists() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::PersistentNontransactional)
            .transition_read_field(&mut op, true)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentClean);
        assert_eq!(
            op.calls(),
            &[
                ProviderCall::SaveFields,
                ProviderCall::RefreshLoadedFields,
                ProviderCall::RegisterTransactional,
            ]
        );
    }

    #[test]
    fn test_nontrans_optimistic_read_stays() {
        let mut op = MockObjectProvider::active(optimistic());
        let next = state(StateType::PersistentNontransactional)
            .transition_read_field(&mut op, true)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNontransactional);
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_nontrans_write_enlists_only_when_active() {
        let mut op = MockObjectProvider::active(optimistic());
        let next = state(StateType::PersistentNontransactional)
            .transition_write_field(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentDirty);
        assert_eq!(op.count(ProviderCall::RegisterTransactional), 1);

        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::PersistentNontransactional)
            .transition_write_field(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNontransactional);
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_nontrans_retrieve_by_mode() {
        let p_nontrans = state(StateType::PersistentNontransactional);

        let mut op = MockObjectProvider::active(TransactionOptions::default());
        assert_eq!(
            p_nontrans.transition_retrieve(&mut op, false).unwrap().state_type(),
            StateType::PersistentClean
        );
        assert_eq!(
            op.calls(),
            &[
                ProviderCall::LoadUnloadedFields,
                ProviderCall::SaveFields,
                ProviderCall::RegisterTransactional,
            ]
        );

        let mut op = MockObjectProvider::active(optimistic());
        assert_eq!(
            p_nontrans.transition_retrieve(&mut op, true).unwrap().state_type(),
            StateType::PersistentNontransactional
        );
        assert_eq!(
            op.calls(),
            &[ProviderCall::LoadUnloadedFieldsInFetchPlan, ProviderCall::SaveFields]
        );

        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        assert_eq!(
            p_nontrans.transition_retrieve(&mut op, false).unwrap().state_type(),
            StateType::PersistentNontransactional
        );
        assert_eq!(op.calls(), &[ProviderCall::LoadUnloadedFields]);
    }

    #[test]
    fn test_nontrans_retrieve_fetch_plan_loads_plan() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let plan = FetchPlan::with_groups(["default", "detail"]);
        state(StateType::PersistentNontransactional)
            .transition_retrieve_fetch_plan(&mut op, &plan)
            .unwrap();
        assert_eq!(op.calls(), &[ProviderCall::LoadUnloadedFieldsOfClassInFetchPlan]);
    }

    #[test]
    fn test_nontrans_make_transactional_refreshes_on_request() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::PersistentNontransactional)
            .transition_make_transactional(&mut op, true)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentClean);
        assert_eq!(
            op.calls(),
            &[ProviderCall::RefreshLoadedFields, ProviderCall::RegisterTransactional]
        );
    }

    #[test]
    fn test_nontrans_commit_and_rollback_are_illegal() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let tx = op.mode();
        let p_nontrans = state(StateType::PersistentNontransactional);
        assert!(p_nontrans
            .transition_commit(&mut op, &tx)
            .unwrap_err()
            .is_illegal_transition());
        assert!(p_nontrans
            .transition_rollback(&mut op, &tx)
            .unwrap_err()
            .is_illegal_transition());
    }

    #[test]
    fn test_nontrans_evict_goes_hollow() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::PersistentNontransactional)
            .transition_evict(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::Hollow);
    }

    #[test]
    fn test_nontrans_serialize_enlists_under_pessimistic_transaction() {
        let p_nontrans = state(StateType::PersistentNontransactional);

        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = p_nontrans.transition_serialize(&mut op).unwrap();
        assert_eq!(next.state_type(), StateType::PersistentClean);
        assert_eq!(op.calls(), &[ProviderCall::RegisterTransactional]);

        for mut op in [
            MockObjectProvider::active(optimistic()),
            MockObjectProvider::inactive(TransactionOptions::default()),
        ] {
            let next = p_nontrans.transition_serialize(&mut op).unwrap();
            assert!(std::ptr::eq(next, p_nontrans));
            assert!(op.calls().is_empty());
        }
    }

    #[test]
    fn test_nontrans_delete_registers() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::PersistentNontransactional)
            .transition_delete_persistent(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentDeleted);
        assert_eq!(op.calls(), &[ProviderCall::RegisterTransactional]);
    }

    // ── HOLLOW ───────────────────────────────────────────────────────

    #[test]
    fn test_hollow_pessimistic_read_loads_once_and_enlists() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let next = state(StateType::Hollow)
            .transition_read_field(&mut op, false)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentClean);
        assert_eq!(op.count(ProviderCall::LoadUnloadedFields), 1);
        assert_eq!(op.count(ProviderCall::RegisterTransactional), 1);
    }

    #[test]
    fn test_hollow_nontransactional_read_goes_nontrans() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::Hollow)
            .transition_read_field(&mut op, false)
            .unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNontransactional);
        assert_eq!(op.calls(), &[ProviderCall::LoadUnloadedFields]);
    }

    #[test]
    fn test_hollow_read_without_permission_is_user_error() {
        let mut op = MockObjectProvider::inactive(no_nontransactional_access());
        let err = state(StateType::Hollow)
            .transition_read_field(&mut op, false)
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::User {
                kind: UserErrorKind::NontransactionalReadNotPermitted,
                state: StateType::Hollow,
                ..
            }
        ));
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_hollow_write_without_permission_is_user_error() {
        let mut op = MockObjectProvider::inactive(no_nontransactional_access());
        let err = state(StateType::Hollow)
            .transition_write_field(&mut op)
            .unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn test_hollow_write_permitted_outside_transaction() {
        let mut op = MockObjectProvider::inactive(TransactionOptions {
            nontransactional_write: true,
            ..TransactionOptions::default()
        });
        let next = state(StateType::Hollow).transition_write_field(&mut op).unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNontransactional);
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_hollow_active_write_snapshots_when_restoring() {
        let mut op = MockObjectProvider::active(TransactionOptions {
            restore_values: true,
            ..TransactionOptions::default()
        });
        let next = state(StateType::Hollow).transition_write_field(&mut op).unwrap();
        assert_eq!(next.state_type(), StateType::PersistentDirty);
        assert_eq!(
            op.calls(),
            &[ProviderCall::SaveFields, ProviderCall::RegisterTransactional]
        );
    }

    #[test]
    fn test_hollow_commit_and_rollback_are_illegal() {
        let mut op = MockObjectProvider::active(TransactionOptions::default());
        let tx = op.mode();
        let hollow = state(StateType::Hollow);
        let err = hollow.transition_commit(&mut op, &tx).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::IllegalTransition {
                state: StateType::Hollow,
                ..
            }
        ));
        assert!(hollow
            .transition_rollback(&mut op, &tx)
            .unwrap_err()
            .is_illegal_transition());
        assert!(op.calls().is_empty());
    }

    #[test]
    fn test_hollow_read_load_failure_propagates() {
        let mut op = MockObjectProvider::active(TransactionOptions::default()).failing_loads();
        let err = state(StateType::Hollow)
            .transition_read_field(&mut op, false)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Provider(_)));
        assert_eq!(op.count(ProviderCall::RegisterTransactional), 0);
    }

    #[test]
    fn test_hollow_serialize_loads_everything() {
        let mut op = MockObjectProvider::active(optimistic());
        let next = state(StateType::Hollow).transition_serialize(&mut op).unwrap();
        assert_eq!(next.state_type(), StateType::PersistentNontransactional);
        assert_eq!(op.calls(), &[ProviderCall::LoadUnloadedFields]);
    }

    #[test]
    fn test_hollow_make_transient_disconnects() {
        let mut op = MockObjectProvider::inactive(TransactionOptions::default());
        let next = state(StateType::Hollow)
            .transition_make_transient(&mut op, false, false)
            .unwrap();
        assert_eq!(next.state_type(), StateType::Transient);
        assert_eq!(op.calls(), &[ProviderCall::Disconnect]);
    }
}
