//! # Reference Managed Object
//!
//! [`StateManager`] is an in-memory surrogate: it holds one slot per field
//! (`None` = not loaded), a snapshot for restore-on-rollback, and the current
//! life-cycle state singleton. Every public operation runs the matching
//! transition and installs the returned state only when the transition
//! succeeds.
//!
//! Field values are `serde_json::Value`s; rows live in the session's
//! [`MemoryDatastore`](crate::datastore::MemoryDatastore).

use std::sync::Arc;

use persist_core::{ClassMetaData, FetchPlan, ObjectId, PersistError, Timestamp, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datastore::Row;
use crate::error::{LifecycleError, UserErrorKind};
use crate::factory::LifeCycleStateFactory;
use crate::lifecycle::{user_error, LifeCycleState, Operation, StateType};
use crate::provider::{transaction_mode, ExecutionContext, ObjectProvider};
use crate::session::SessionContext;

/// Record of one successful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub operation: Operation,
    pub from_state: StateType,
    pub to_state: StateType,
    pub timestamp: Timestamp,
}

type Slots = Vec<Option<Value>>;

/// In-memory surrogate for one managed object.
#[derive(Debug)]
pub struct StateManager {
    id: ObjectId,
    metadata: Arc<ClassMetaData>,
    context: Arc<SessionContext>,
    state: &'static LifeCycleState,
    fields: Slots,
    saved: Option<Slots>,
    fetch_plan: FetchPlan,
    restore_values: bool,
    connected: bool,
    enlisted: bool,
    history: Vec<TransitionRecord>,
}

impl StateManager {
    /// A transient object with every field loaded. Missing trailing values
    /// are filled with `null`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::FieldOutOfRange`] if more values than fields
    /// are supplied.
    pub fn new_transient(
        context: Arc<SessionContext>,
        metadata: Arc<ClassMetaData>,
        mut values: Vec<Value>,
    ) -> Result<Self, PersistError> {
        let field_count = metadata.field_count();
        if values.len() > field_count {
            return Err(PersistError::FieldOutOfRange {
                class_name: metadata.class_name.clone(),
                field: field_count,
                field_count,
            });
        }
        values.resize(field_count, Value::Null);
        Ok(Self::with_slots(
            ObjectId::new(),
            context,
            metadata,
            StateType::Transient,
            values.into_iter().map(Some).collect(),
        ))
    }

    /// A `HOLLOW` object for a stored row, with only key fields loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::ObjectNotFound`] if the datastore holds no
    /// row for `id`.
    pub fn hollow(
        context: Arc<SessionContext>,
        metadata: Arc<ClassMetaData>,
        id: ObjectId,
    ) -> Result<Self, PersistError> {
        let row = context
            .datastore()
            .get(&id)
            .ok_or_else(|| PersistError::ObjectNotFound(id.clone()))?;
        let fields = (0..metadata.field_count())
            .map(|i| {
                metadata
                    .is_primary_key(i)
                    .then(|| row.get(i).cloned().unwrap_or(Value::Null))
            })
            .collect();
        Ok(Self::with_slots(id, context, metadata, StateType::Hollow, fields))
    }

    fn with_slots(
        id: ObjectId,
        context: Arc<SessionContext>,
        metadata: Arc<ClassMetaData>,
        state: StateType,
        fields: Slots,
    ) -> Self {
        Self {
            id,
            metadata,
            context,
            state: LifeCycleStateFactory::get(state),
            fields,
            saved: None,
            fetch_plan: FetchPlan::default(),
            restore_values: false,
            connected: true,
            enlisted: false,
            history: Vec::new(),
        }
    }

    pub fn with_fetch_plan(mut self, plan: FetchPlan) -> Self {
        self.fetch_plan = plan;
        self
    }

    pub fn with_restore_values(mut self, restore_values: bool) -> Self {
        self.restore_values = restore_values;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn object_id(&self) -> &ObjectId {
        &self.id
    }

    pub fn state(&self) -> &'static LifeCycleState {
        self.state
    }

    pub fn state_type(&self) -> StateType {
        self.state.state_type()
    }

    pub fn metadata(&self) -> &Arc<ClassMetaData> {
        &self.metadata
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        matches!(self.fields.get(index), Some(Some(_)))
    }

    /// The in-memory value of a loaded field, without any transition.
    pub fn loaded_value(&self, index: usize) -> Option<&Value> {
        self.fields.get(index).and_then(Option::as_ref)
    }

    /// Whether a snapshot for restore-on-rollback is held.
    pub fn has_saved_fields(&self) -> bool {
        self.saved.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the object asked to be enlisted in the current transaction.
    pub fn is_enlisted(&self) -> bool {
        self.enlisted
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    // ── Field Access ─────────────────────────────────────────────────

    /// Read a field, loading it from the datastore if the state allows.
    ///
    /// # Errors
    ///
    /// Fails when the current state forbids the read or the value cannot be
    /// fetched. The state is unchanged on failure.
    pub fn read_field(&mut self, index: usize) -> Result<Value, LifecycleError> {
        self.check_field(index)?;
        let is_loaded = self.is_loaded(index);
        self.apply(Operation::ReadField, |s, op| s.transition_read_field(op, is_loaded))?;
        if !self.is_loaded(index) && self.connected {
            self.load(vec![index], false)?;
        }
        Ok(self.loaded_value(index).cloned().unwrap_or(Value::Null))
    }

    /// Write a field.
    ///
    /// Outside a transaction a nontransactional object is written through
    /// to the datastore immediately.
    ///
    /// # Errors
    ///
    /// Fails when the current state forbids the write.
    pub fn write_field(&mut self, index: usize, value: Value) -> Result<(), LifecycleError> {
        self.check_field(index)?;
        if self.state_type() == StateType::PersistentNontransactional {
            let mode = transaction_mode(self);
            if !mode.active && !mode.options.nontransactional_write {
                return Err(user_error(
                    self,
                    StateType::PersistentNontransactional,
                    Operation::WriteField,
                    UserErrorKind::NontransactionalWriteNotPermitted,
                ));
            }
        }
        self.apply(Operation::WriteField, |s, op| s.transition_write_field(op))?;
        if let Some(slot) = self.fields.get_mut(index) {
            *slot = Some(value);
        }
        if self.state_type() == StateType::PersistentNontransactional
            && !transaction_mode(self).active
        {
            self.write_row();
        }
        Ok(())
    }

    // ── Life-Cycle Operations ────────────────────────────────────────

    pub fn make_persistent(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::MakePersistent, |s, op| s.transition_make_persistent(op))
    }

    pub fn delete_persistent(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::DeletePersistent, |s, op| {
            s.transition_delete_persistent(op)
        })
    }

    pub fn make_transactional(&mut self, refresh_fields: bool) -> Result<StateType, LifecycleError> {
        self.apply(Operation::MakeTransactional, |s, op| {
            s.transition_make_transactional(op, refresh_fields)
        })
    }

    pub fn make_nontransactional(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::MakeNontransactional, |s, op| {
            s.transition_make_nontransactional(op)
        })
    }

    pub fn make_transient(
        &mut self,
        use_fetch_plan: bool,
        detach_all_on_commit: bool,
    ) -> Result<StateType, LifecycleError> {
        self.apply(Operation::MakeTransient, |s, op| {
            s.transition_make_transient(op, use_fetch_plan, detach_all_on_commit)
        })
    }

    pub fn commit(&mut self, tx: &dyn Transaction) -> Result<StateType, LifecycleError> {
        let next = self.apply(Operation::Commit, |s, op| s.transition_commit(op, tx))?;
        self.enlisted = false;
        Ok(next)
    }

    pub fn rollback(&mut self, tx: &dyn Transaction) -> Result<StateType, LifecycleError> {
        let next = self.apply(Operation::Rollback, |s, op| s.transition_rollback(op, tx))?;
        self.enlisted = false;
        Ok(next)
    }

    pub fn retrieve(&mut self, fg_only: bool) -> Result<StateType, LifecycleError> {
        self.apply(Operation::Retrieve, |s, op| s.transition_retrieve(op, fg_only))
    }

    pub fn retrieve_fetch_plan(&mut self, plan: &FetchPlan) -> Result<StateType, LifecycleError> {
        self.apply(Operation::RetrieveFetchPlan, |s, op| {
            s.transition_retrieve_fetch_plan(op, plan)
        })
    }

    pub fn refresh(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::Refresh, |s, op| s.transition_refresh(op))
    }

    pub fn evict(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::Evict, |s, op| s.transition_evict(op))
    }

    pub fn detach(&mut self) -> Result<StateType, LifecycleError> {
        let next = self.apply(Operation::Detach, |s, op| s.transition_detach(op))?;
        self.enlisted = false;
        Ok(next)
    }

    pub fn attach(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::Attach, |s, op| s.transition_attach(op))
    }

    pub fn serialize(&mut self) -> Result<StateType, LifecycleError> {
        self.apply(Operation::Serialize, |s, op| s.transition_serialize(op))
    }

    /// Write pending changes to the datastore: delete the row of a deleted
    /// object, store the loaded fields of a new or dirty one.
    pub(crate) fn flush(&mut self) {
        let state = self.state;
        if !state.is_persistent() {
            return;
        }
        if state.is_deleted() {
            self.context.datastore().remove(&self.id);
            tracing::debug!(object_id = %self.id, "row deleted");
        } else if state.is_dirty() {
            self.write_row();
        }
    }

    fn write_row(&mut self) {
        let datastore = self.context.datastore();
        let mut row: Row = datastore
            .get(&self.id)
            .unwrap_or_else(|| vec![Value::Null; self.metadata.field_count()]);
        for (stored, slot) in row.iter_mut().zip(&self.fields) {
            if let Some(value) = slot {
                *stored = value.clone();
            }
        }
        datastore.put(self.id.clone(), row);
        tracing::debug!(object_id = %self.id, "row written");
    }

    fn apply<F>(&mut self, operation: Operation, f: F) -> Result<StateType, LifecycleError>
    where
        F: FnOnce(&'static LifeCycleState, &mut Self) -> Result<&'static LifeCycleState, LifecycleError>,
    {
        let current = self.state;
        let next = f(current, self)?;
        self.state = next;
        self.history.push(TransitionRecord {
            operation,
            from_state: current.state_type(),
            to_state: next.state_type(),
            timestamp: Timestamp::now(),
        });
        Ok(next.state_type())
    }

    fn check_field(&self, index: usize) -> Result<(), PersistError> {
        if index >= self.metadata.field_count() {
            return Err(PersistError::FieldOutOfRange {
                class_name: self.metadata.class_name.clone(),
                field: index,
                field_count: self.metadata.field_count(),
            });
        }
        Ok(())
    }

    fn row(&self) -> Result<Row, PersistError> {
        if !self.connected {
            return Err(PersistError::Datastore {
                object_id: self.id.clone(),
                reason: "surrogate is disconnected".into(),
            });
        }
        self.context
            .datastore()
            .get(&self.id)
            .ok_or_else(|| PersistError::ObjectNotFound(self.id.clone()))
    }

    /// Load `indices` from the stored row. Without `overwrite` only unloaded
    /// slots are filled, and nothing is fetched if all are loaded.
    fn load(&mut self, indices: Vec<usize>, overwrite: bool) -> Result<(), PersistError> {
        let wanted: Vec<usize> = indices
            .into_iter()
            .filter(|&i| overwrite || matches!(self.fields.get(i), Some(None)))
            .collect();
        if wanted.is_empty() {
            return Ok(());
        }
        let row = self.row()?;
        for i in wanted {
            if let Some(slot) = self.fields.get_mut(i) {
                *slot = Some(row.get(i).cloned().unwrap_or(Value::Null));
            }
        }
        Ok(())
    }

    fn plan_fields(&self, plan: &FetchPlan) -> Vec<usize> {
        self.metadata.fetch_plan_fields(plan)
    }
}

impl ObjectProvider for StateManager {
    fn load_unloaded_fields(&mut self) -> Result<(), PersistError> {
        self.load((0..self.fields.len()).collect(), false)
    }

    fn load_unloaded_fields_in_fetch_plan(&mut self) -> Result<(), PersistError> {
        let fields = self.plan_fields(&self.fetch_plan);
        self.load(fields, false)
    }

    fn load_unloaded_fields_of_class_in_fetch_plan(
        &mut self,
        plan: &FetchPlan,
    ) -> Result<(), PersistError> {
        let fields = self.plan_fields(plan);
        self.load(fields, false)
    }

    fn refresh_fields_in_fetch_plan(&mut self) -> Result<(), PersistError> {
        let fields = self.plan_fields(&self.fetch_plan);
        self.load(fields, true)
    }

    fn refresh_loaded_fields(&mut self) -> Result<(), PersistError> {
        let loaded = (0..self.fields.len()).filter(|&i| self.is_loaded(i)).collect();
        self.load(loaded, true)
    }

    fn unload_non_fetch_plan_fields(&mut self) {
        let keep = self.plan_fields(&self.fetch_plan);
        for (i, slot) in self.fields.iter_mut().enumerate() {
            if !keep.contains(&i) {
                *slot = None;
            }
        }
    }

    fn save_fields(&mut self) {
        self.saved = Some(self.fields.clone());
    }

    fn restore_fields(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.fields = saved;
        }
    }

    fn clear_saved_fields(&mut self) {
        self.saved = None;
    }

    fn clear_fields(&mut self) {
        self.fields.iter_mut().for_each(|slot| *slot = None);
    }

    fn clear_non_primary_key_fields(&mut self) {
        for (i, slot) in self.fields.iter_mut().enumerate() {
            if !self.metadata.is_primary_key(i) {
                *slot = None;
            }
        }
    }

    fn register_transactional(&mut self) {
        self.connected = true;
        self.enlisted = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.enlisted = false;
    }

    fn execution_context(&self) -> &dyn ExecutionContext {
        &*self.context
    }

    fn class_metadata(&self) -> &ClassMetaData {
        &self.metadata
    }

    fn internal_object_id(&self) -> &ObjectId {
        &self.id
    }

    fn is_restore_values(&self) -> bool {
        self.restore_values
    }
}
