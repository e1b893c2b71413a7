//! # Transition Matrix
//!
//! Every (state, operation, transaction mode) combination driven against the
//! recording surrogate. Checks closure of the state graph, which events are
//! structurally illegal, and that failed transitions leave the surrogate
//! untouched.

use persist_core::{FetchPlan, TransactionMode, TransactionOptions};
use persist_state::mock::MockObjectProvider;
use persist_state::{LifeCycleState, LifeCycleStateFactory, LifecycleError, Operation, StateType};
use proptest::prelude::*;

fn dispatch(
    state: &'static LifeCycleState,
    operation: Operation,
    op: &mut MockObjectProvider,
    flag: bool,
) -> Result<&'static LifeCycleState, LifecycleError> {
    let tx = op.mode();
    match operation {
        Operation::DeletePersistent => state.transition_delete_persistent(op),
        Operation::MakeTransactional => state.transition_make_transactional(op, flag),
        Operation::MakeNontransactional => state.transition_make_nontransactional(op),
        Operation::MakeTransient => state.transition_make_transient(op, flag, !flag),
        Operation::MakePersistent => state.transition_make_persistent(op),
        Operation::Commit => state.transition_commit(op, &tx),
        Operation::Rollback => state.transition_rollback(op, &tx),
        Operation::ReadField => state.transition_read_field(op, flag),
        Operation::WriteField => state.transition_write_field(op),
        Operation::Retrieve => state.transition_retrieve(op, flag),
        Operation::RetrieveFetchPlan => {
            state.transition_retrieve_fetch_plan(op, &FetchPlan::default())
        }
        Operation::Refresh => state.transition_refresh(op),
        Operation::Evict => state.transition_evict(op),
        Operation::Detach => state.transition_detach(op),
        Operation::Attach => state.transition_attach(op),
        Operation::Serialize => state.transition_serialize(op),
    }
}

/// Events a state can never receive from a correct driver.
fn structurally_illegal(state: StateType, operation: Operation) -> bool {
    use Operation::*;
    use StateType::*;
    match state {
        Transient => matches!(operation, Commit | Rollback | Detach | Attach),
        TransientClean | TransientDirty => matches!(operation, Detach | Attach),
        PersistentNontransactional | Hollow => matches!(operation, Commit | Rollback | Attach),
        DetachedClean | DetachedDirty => matches!(
            operation,
            MakeTransactional
                | MakeNontransactional
                | Commit
                | Rollback
                | Retrieve
                | RetrieveFetchPlan
                | Refresh
                | Evict
        ),
        PersistentNew | PersistentClean | PersistentDirty | PersistentNewDeleted
        | PersistentDeleted => operation == Attach,
    }
}

fn modes() -> Vec<TransactionMode> {
    let mut out = Vec::new();
    for active in [false, true] {
        for bits in 0u8..32 {
            let options = TransactionOptions {
                optimistic: bits & 1 != 0,
                retain_values: bits & 2 != 0,
                restore_values: bits & 4 != 0,
                nontransactional_read: bits & 8 != 0,
                nontransactional_write: bits & 16 != 0,
            };
            out.push(if active {
                TransactionMode::active(options)
            } else {
                TransactionMode::inactive(options)
            });
        }
    }
    out
}

#[test]
fn illegal_transitions_match_the_graph() {
    for st in StateType::ALL {
        for operation in Operation::ALL {
            for mode in modes() {
                for flag in [false, true] {
                    let mut op = MockObjectProvider::new(mode);
                    let result = dispatch(LifeCycleStateFactory::get(st), operation, &mut op, flag);
                    let illegal = matches!(result, Err(LifecycleError::IllegalTransition { .. }));
                    assert_eq!(
                        illegal,
                        structurally_illegal(st, operation),
                        "{st} / {operation} under {mode:?} (flag={flag}): got {result:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn hollow_never_accepts_transaction_end() {
    for mode in modes() {
        let mut op = MockObjectProvider::new(mode);
        let hollow = LifeCycleStateFactory::get(StateType::Hollow);
        assert!(dispatch(hollow, Operation::Commit, &mut op, false)
            .unwrap_err()
            .is_illegal_transition());
        assert!(dispatch(hollow, Operation::Rollback, &mut op, false)
            .unwrap_err()
            .is_illegal_transition());
        assert!(op.calls().is_empty());
    }
}

#[test]
fn detach_from_dirty_is_detached_clean_in_every_mode() {
    for mode in modes() {
        let mut op = MockObjectProvider::new(mode);
        let next = LifeCycleStateFactory::get(StateType::PersistentDirty)
            .transition_detach(&mut op)
            .unwrap();
        assert_eq!(next.state_type(), StateType::DetachedClean);
    }
}

// ── Properties ───────────────────────────────────────────────────────

fn state_type() -> impl Strategy<Value = StateType> {
    prop::sample::select(StateType::ALL.to_vec())
}

fn operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(Operation::ALL.to_vec())
}

fn mode() -> impl Strategy<Value = TransactionMode> {
    prop::sample::select(modes())
}

proptest! {
    /// Every successful transition lands on a factory singleton.
    #[test]
    fn transitions_are_closed(st in state_type(), operation in operation(), mode in mode(), flag in any::<bool>()) {
        let mut op = MockObjectProvider::new(mode);
        if let Ok(next) = dispatch(LifeCycleStateFactory::get(st), operation, &mut op, flag) {
            prop_assert!(std::ptr::eq(next, LifeCycleStateFactory::get(next.state_type())));
        }
    }

    /// A rejected transition performs no side effects.
    #[test]
    fn rejected_transitions_touch_nothing(st in state_type(), operation in operation(), mode in mode(), flag in any::<bool>()) {
        let mut op = MockObjectProvider::new(mode);
        if dispatch(LifeCycleStateFactory::get(st), operation, &mut op, flag).is_err() {
            prop_assert!(op.calls().is_empty(), "{} / {}: {:?}", st, operation, op.calls());
        }
    }

    /// Flags are consistent along any walk through the graph.
    #[test]
    fn flags_hold_along_walks(
        walk in prop::collection::vec((operation(), any::<bool>()), 1..24),
        mode in mode(),
    ) {
        let mut op = MockObjectProvider::new(mode);
        let mut current = LifeCycleStateFactory::get(StateType::Transient);
        for (operation, flag) in walk {
            if let Ok(next) = dispatch(current, operation, &mut op, flag) {
                current = next;
            }
            prop_assert!(!current.is_deleted() || current.is_persistent());
            prop_assert!(!current.is_new() || current.is_dirty());
            prop_assert!(!(current.is_detached() && current.is_transactional()));
        }
    }

    /// Reading a new-deleted object is a no-op however often it happens.
    #[test]
    fn new_deleted_read_is_idempotent(loads in prop::collection::vec(any::<bool>(), 1..8), mode in mode()) {
        let mut op = MockObjectProvider::new(mode);
        let p_new_deleted = LifeCycleStateFactory::get(StateType::PersistentNewDeleted);
        for is_loaded in loads {
            let next = p_new_deleted.transition_read_field(&mut op, is_loaded).unwrap();
            prop_assert!(std::ptr::eq(next, p_new_deleted));
        }
        prop_assert!(op.calls().is_empty());
    }

    /// Commit with retain and rollback with restore both leave a dirty
    /// object clean and nontransactional.
    #[test]
    fn dirty_commit_rollback_duality(optimistic in any::<bool>()) {
        let options = TransactionOptions {
            optimistic,
            retain_values: true,
            restore_values: true,
            ..TransactionOptions::default()
        };
        let p_dirty = LifeCycleStateFactory::get(StateType::PersistentDirty);

        let mut op = MockObjectProvider::active(options);
        let committed = dispatch(p_dirty, Operation::Commit, &mut op, false).unwrap();
        let mut op = MockObjectProvider::active(options);
        let rolled_back = dispatch(p_dirty, Operation::Rollback, &mut op, false).unwrap();

        for next in [committed, rolled_back] {
            prop_assert_eq!(next.state_type(), StateType::PersistentNontransactional);
            prop_assert!(!next.is_dirty());
            prop_assert!(!next.is_transactional());
        }
    }
}
