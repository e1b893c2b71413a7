//! # Life-Cycle State Contract
//!
//! A managed object is always in exactly one of twelve states. Each state is
//! a shared, immutable [`LifeCycleState`] singleton handed out by the
//! [`LifeCycleStateFactory`](crate::factory::LifeCycleStateFactory); the
//! surrogate holds a `&'static LifeCycleState` and swaps it for whatever a
//! transition returns.
//!
//! ## Dispatch
//!
//! Every state's behavior lives in a zero-sized type implementing
//! [`StateTransitions`]. The trait's default methods reject the event with
//! [`LifecycleError::IllegalTransition`], so a state only spells out the
//! transitions that are legal from its node of the graph.
//!
//! ## Ordering
//!
//! Side effects on the surrogate run inside the behavior method, before the
//! singleton for the next state is resolved. If a side effect fails the
//! error propagates and the surrogate keeps its current state.

use serde::{Deserialize, Serialize};

use persist_core::{FetchPlan, Transaction};

use crate::error::{LifecycleError, UserErrorKind};
use crate::factory::LifeCycleStateFactory;
use crate::provider::{DisconnectGuard, ObjectProvider};

// ─── State Types ─────────────────────────────────────────────────────

/// Tag identifying a life-cycle state. The discriminant is the state's
/// numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateType {
    /// Not managed.
    #[serde(rename = "TRANSIENT")]
    Transient = 0,
    /// Persistent, enlisted, unmodified.
    #[serde(rename = "P_CLEAN")]
    PersistentClean = 1,
    /// Persistent, enlisted, modified.
    #[serde(rename = "P_DIRTY")]
    PersistentDirty = 2,
    /// Made persistent in the current transaction.
    #[serde(rename = "P_NEW")]
    PersistentNew = 3,
    /// Made persistent and deleted in the current transaction.
    #[serde(rename = "P_NEW_DELETED")]
    PersistentNewDeleted = 4,
    /// Previously committed, deleted in the current transaction.
    #[serde(rename = "P_DELETED")]
    PersistentDeleted = 5,
    /// Persistent with values, not enlisted in any transaction.
    #[serde(rename = "P_NONTRANS")]
    PersistentNontransactional = 6,
    /// Transient but enlisted, unmodified.
    #[serde(rename = "T_CLEAN")]
    TransientClean = 7,
    /// Transient but enlisted, modified.
    #[serde(rename = "T_DIRTY")]
    TransientDirty = 8,
    /// Persistent, only key fields loaded.
    #[serde(rename = "HOLLOW")]
    Hollow = 9,
    /// Detached copy without changes.
    #[serde(rename = "DETACHED_CLEAN")]
    DetachedClean = 10,
    /// Detached copy modified since detach.
    #[serde(rename = "DETACHED_DIRTY")]
    DetachedDirty = 11,
}

impl StateType {
    /// Number of states.
    pub const COUNT: usize = 12;

    /// Every state, ordered by code.
    pub const ALL: [StateType; Self::COUNT] = [
        Self::Transient,
        Self::PersistentClean,
        Self::PersistentDirty,
        Self::PersistentNew,
        Self::PersistentNewDeleted,
        Self::PersistentDeleted,
        Self::PersistentNontransactional,
        Self::TransientClean,
        Self::TransientDirty,
        Self::Hollow,
        Self::DetachedClean,
        Self::DetachedDirty,
    ];

    /// Numeric code used by the factory.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Canonical short name (e.g. `"P_CLEAN"`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transient => "TRANSIENT",
            Self::PersistentClean => "P_CLEAN",
            Self::PersistentDirty => "P_DIRTY",
            Self::PersistentNew => "P_NEW",
            Self::PersistentNewDeleted => "P_NEW_DELETED",
            Self::PersistentDeleted => "P_DELETED",
            Self::PersistentNontransactional => "P_NONTRANS",
            Self::TransientClean => "T_CLEAN",
            Self::TransientDirty => "T_DIRTY",
            Self::Hollow => "HOLLOW",
            Self::DetachedClean => "DETACHED_CLEAN",
            Self::DetachedDirty => "DETACHED_DIRTY",
        }
    }
}

impl TryFrom<u8> for StateType {
    type Error = LifecycleError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or(LifecycleError::UnknownStateType(code))
    }
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Operations ──────────────────────────────────────────────────────

/// Life-cycle events a state can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    DeletePersistent,
    MakeTransactional,
    MakeNontransactional,
    MakeTransient,
    MakePersistent,
    Commit,
    Rollback,
    ReadField,
    WriteField,
    Retrieve,
    RetrieveFetchPlan,
    Refresh,
    Evict,
    Detach,
    Attach,
    Serialize,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Self::DeletePersistent,
        Self::MakeTransactional,
        Self::MakeNontransactional,
        Self::MakeTransient,
        Self::MakePersistent,
        Self::Commit,
        Self::Rollback,
        Self::ReadField,
        Self::WriteField,
        Self::Retrieve,
        Self::RetrieveFetchPlan,
        Self::Refresh,
        Self::Evict,
        Self::Detach,
        Self::Attach,
        Self::Serialize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DeletePersistent => "delete_persistent",
            Self::MakeTransactional => "make_transactional",
            Self::MakeNontransactional => "make_nontransactional",
            Self::MakeTransient => "make_transient",
            Self::MakePersistent => "make_persistent",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::ReadField => "read_field",
            Self::WriteField => "write_field",
            Self::Retrieve => "retrieve",
            Self::RetrieveFetchPlan => "retrieve_fetch_plan",
            Self::Refresh => "refresh",
            Self::Evict => "evict",
            Self::Detach => "detach",
            Self::Attach => "attach",
            Self::Serialize => "serialize",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Flags ───────────────────────────────────────────────────────────

/// Classification facts about a state. Fixed per state, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateFlags {
    pub persistent: bool,
    pub transactional: bool,
    pub dirty: bool,
    pub new: bool,
    pub deleted: bool,
    pub detached: bool,
}

impl StateFlags {
    pub const NONE: StateFlags = StateFlags {
        persistent: false,
        transactional: false,
        dirty: false,
        new: false,
        deleted: false,
        detached: false,
    };
}

// ─── Behavior Contract ───────────────────────────────────────────────

/// Outcome of a behavior method: the type of the next state.
pub(crate) type Transition = Result<StateType, LifecycleError>;

/// Per-state transition table. Every method not overridden is illegal.
pub(crate) trait StateTransitions: Send + Sync + std::fmt::Debug {
    fn state_type(&self) -> StateType;

    fn delete_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::DeletePersistent))
    }

    fn make_transactional(&self, _op: &mut dyn ObjectProvider, _refresh_fields: bool) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::MakeTransactional))
    }

    fn make_nontransactional(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::MakeNontransactional))
    }

    fn make_transient(
        &self,
        _op: &mut dyn ObjectProvider,
        _use_fetch_plan: bool,
        _detach_all_on_commit: bool,
    ) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::MakeTransient))
    }

    fn make_persistent(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::MakePersistent))
    }

    fn commit(&self, _op: &mut dyn ObjectProvider, _tx: &dyn Transaction) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Commit))
    }

    fn rollback(&self, _op: &mut dyn ObjectProvider, _tx: &dyn Transaction) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Rollback))
    }

    fn read_field(&self, _op: &mut dyn ObjectProvider, _is_loaded: bool) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::ReadField))
    }

    fn write_field(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::WriteField))
    }

    fn retrieve(&self, _op: &mut dyn ObjectProvider, _fg_only: bool) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Retrieve))
    }

    fn retrieve_fetch_plan(&self, _op: &mut dyn ObjectProvider, _plan: &FetchPlan) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::RetrieveFetchPlan))
    }

    fn refresh(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Refresh))
    }

    fn evict(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Evict))
    }

    fn detach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Detach))
    }

    fn attach(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Attach))
    }

    fn serialize(&self, _op: &mut dyn ObjectProvider) -> Transition {
        Err(LifecycleError::illegal(self.state_type(), Operation::Serialize))
    }
}

/// Build a user error for `op` in `state`.
pub(crate) fn user_error(
    op: &dyn ObjectProvider,
    state: StateType,
    operation: Operation,
    kind: UserErrorKind,
) -> LifecycleError {
    LifecycleError::User {
        kind,
        object_id: op.internal_object_id().clone(),
        state,
        operation,
    }
}

/// Move to `TRANSIENT`, disconnecting the surrogate on the way out.
pub(crate) fn to_transient(op: &mut dyn ObjectProvider) -> Transition {
    let _disconnect = DisconnectGuard::new(op);
    Ok(StateType::Transient)
}

// ─── LifeCycleState ──────────────────────────────────────────────────

/// A life-cycle state singleton.
///
/// Holds no reference to any managed object; the same instance serves every
/// object currently in this state, on any thread.
pub struct LifeCycleState {
    state_type: StateType,
    flags: StateFlags,
    behavior: &'static dyn StateTransitions,
}

impl LifeCycleState {
    pub(crate) const fn new(
        state_type: StateType,
        flags: StateFlags,
        behavior: &'static dyn StateTransitions,
    ) -> Self {
        Self {
            state_type,
            flags,
            behavior,
        }
    }

    pub fn state_type(&self) -> StateType {
        self.state_type
    }

    pub fn flags(&self) -> StateFlags {
        self.flags
    }

    pub fn is_persistent(&self) -> bool {
        self.flags.persistent
    }

    pub fn is_transactional(&self) -> bool {
        self.flags.transactional
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.dirty
    }

    pub fn is_new(&self) -> bool {
        self.flags.new
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.deleted
    }

    pub fn is_detached(&self) -> bool {
        self.flags.detached
    }

    /// Canonical short name (e.g. `"HOLLOW"`).
    pub fn name(&self) -> &'static str {
        self.state_type.name()
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// The application deleted the object.
    pub fn transition_delete_persistent(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.delete_persistent(op)?;
        Ok(self.change_state(op, Operation::DeletePersistent, next))
    }

    /// Enlist a nontransactional object in the current transaction.
    pub fn transition_make_transactional(
        &self,
        op: &mut dyn ObjectProvider,
        refresh_fields: bool,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.make_transactional(op, refresh_fields)?;
        Ok(self.change_state(op, Operation::MakeTransactional, next))
    }

    /// Release the object from transaction control.
    pub fn transition_make_nontransactional(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.make_nontransactional(op)?;
        Ok(self.change_state(op, Operation::MakeNontransactional, next))
    }

    /// Sever persistence; the object becomes plain data.
    pub fn transition_make_transient(
        &self,
        op: &mut dyn ObjectProvider,
        use_fetch_plan: bool,
        detach_all_on_commit: bool,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self
            .behavior
            .make_transient(op, use_fetch_plan, detach_all_on_commit)?;
        Ok(self.change_state(op, Operation::MakeTransient, next))
    }

    /// Make the object persistent (or re-attach a detached one).
    pub fn transition_make_persistent(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.make_persistent(op)?;
        Ok(self.change_state(op, Operation::MakePersistent, next))
    }

    /// The transaction committed.
    pub fn transition_commit(
        &self,
        op: &mut dyn ObjectProvider,
        tx: &dyn Transaction,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.commit(op, tx)?;
        Ok(self.change_state(op, Operation::Commit, next))
    }

    /// The transaction rolled back.
    pub fn transition_rollback(
        &self,
        op: &mut dyn ObjectProvider,
        tx: &dyn Transaction,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.rollback(op, tx)?;
        Ok(self.change_state(op, Operation::Rollback, next))
    }

    /// A field is about to be read. `is_loaded` says whether its value is
    /// already in memory.
    pub fn transition_read_field(
        &self,
        op: &mut dyn ObjectProvider,
        is_loaded: bool,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.read_field(op, is_loaded)?;
        Ok(self.change_state(op, Operation::ReadField, next))
    }

    /// A field is about to be written.
    pub fn transition_write_field(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.write_field(op)?;
        Ok(self.change_state(op, Operation::WriteField, next))
    }

    /// Load fields: the fetch plan only when `fg_only`, otherwise all.
    pub fn transition_retrieve(
        &self,
        op: &mut dyn ObjectProvider,
        fg_only: bool,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.retrieve(op, fg_only)?;
        Ok(self.change_state(op, Operation::Retrieve, next))
    }

    /// Load the fields selected by an explicit fetch plan.
    pub fn transition_retrieve_fetch_plan(
        &self,
        op: &mut dyn ObjectProvider,
        plan: &FetchPlan,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.retrieve_fetch_plan(op, plan)?;
        Ok(self.change_state(op, Operation::RetrieveFetchPlan, next))
    }

    /// Reload fetch-plan fields from the datastore and unload the rest.
    pub fn transition_refresh(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.refresh(op)?;
        Ok(self.change_state(op, Operation::Refresh, next))
    }

    /// Drop non-key field values.
    pub fn transition_evict(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.evict(op)?;
        Ok(self.change_state(op, Operation::Evict, next))
    }

    /// Detach the object from its execution context.
    pub fn transition_detach(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.detach(op)?;
        Ok(self.change_state(op, Operation::Detach, next))
    }

    /// Re-attach a detached object.
    pub fn transition_attach(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.attach(op)?;
        Ok(self.change_state(op, Operation::Attach, next))
    }

    /// The object is being serialized.
    pub fn transition_serialize(
        &self,
        op: &mut dyn ObjectProvider,
    ) -> Result<&'static LifeCycleState, LifecycleError> {
        let next = self.behavior.serialize(op)?;
        Ok(self.change_state(op, Operation::Serialize, next))
    }

    fn change_state(
        &self,
        op: &dyn ObjectProvider,
        operation: Operation,
        next: StateType,
    ) -> &'static LifeCycleState {
        if next != self.state_type {
            tracing::debug!(
                object_id = %op.internal_object_id(),
                from = %self.state_type,
                to = %next,
                %operation,
                "lifecycle change"
            );
        }
        LifeCycleStateFactory::get(next)
    }
}

impl std::fmt::Debug for LifeCycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifeCycleState")
            .field("state_type", &self.state_type)
            .field("flags", &self.flags)
            .finish()
    }
}

impl std::fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl PartialEq for LifeCycleState {
    fn eq(&self, other: &Self) -> bool {
        self.state_type == other.state_type
    }
}

impl Eq for LifeCycleState {}
