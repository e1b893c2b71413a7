//! # Session
//!
//! Owns a set of [`StateManager`]s, a [`LocalTransaction`] they share through
//! [`SessionContext`], and the configuration that shapes their behavior.
//!
//! ## Commit
//!
//! 1. New, dirty and deleted objects are flushed to the datastore.
//! 2. The transaction is marked finished.
//! 3. Every transactional object receives the commit notification (or is
//!    detached, with `detach_all_on_commit`).
//!
//! A failing notification is logged and does not stop the others; the first
//! failure is returned once all objects have been visited. Rollback follows
//! the same shape without the flush, and drops any row a new object wrote
//! early (a refresh of a new object flushes it first).

use std::collections::BTreeMap;
use std::sync::Arc;

use persist_core::{
    ClassMetaData, FetchPlan, LocalTransaction, ObjectId, PersistError, PersistenceConfig,
    Transaction, TransactionOptions,
};
use serde_json::Value;

use crate::datastore::MemoryDatastore;
use crate::error::LifecycleError;
use crate::lifecycle::StateType;
use crate::managed::StateManager;
use crate::provider::ExecutionContext;

// ─── Execution Context ───────────────────────────────────────────────

/// What every surrogate of a session shares: the transaction and the
/// datastore.
#[derive(Debug)]
pub struct SessionContext {
    transaction: LocalTransaction,
    datastore: MemoryDatastore,
}

impl SessionContext {
    pub fn new(options: TransactionOptions, datastore: MemoryDatastore) -> Self {
        Self {
            transaction: LocalTransaction::new(options),
            datastore,
        }
    }

    pub fn local_transaction(&self) -> &LocalTransaction {
        &self.transaction
    }

    pub fn datastore(&self) -> &MemoryDatastore {
        &self.datastore
    }
}

impl ExecutionContext for SessionContext {
    fn transaction(&self) -> &dyn Transaction {
        &self.transaction
    }
}

// ─── Session ─────────────────────────────────────────────────────────

/// Unit of work over managed objects.
#[derive(Debug)]
pub struct Session {
    config: PersistenceConfig,
    context: Arc<SessionContext>,
    objects: BTreeMap<ObjectId, StateManager>,
}

impl Session {
    /// A session over a fresh, empty datastore.
    pub fn new(config: PersistenceConfig) -> Self {
        Self::with_datastore(config, MemoryDatastore::new())
    }

    /// A session over a shared datastore.
    pub fn with_datastore(config: PersistenceConfig, datastore: MemoryDatastore) -> Self {
        let context = Arc::new(SessionContext::new(config.transaction, datastore));
        Self {
            config,
            context,
            objects: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn datastore(&self) -> &MemoryDatastore {
        self.context.datastore()
    }

    pub fn is_active(&self) -> bool {
        self.context.local_transaction().is_active()
    }

    pub fn object(&self, id: &ObjectId) -> Option<&StateManager> {
        self.objects.get(id)
    }

    pub fn state_of(&self, id: &ObjectId) -> Option<StateType> {
        self.objects.get(id).map(StateManager::state_type)
    }

    /// Managed objects in identity order.
    pub fn objects(&self) -> impl Iterator<Item = &StateManager> {
        self.objects.values()
    }

    // ── Transaction Demarcation ──────────────────────────────────────

    /// Start a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionState`] if one is already active.
    pub fn begin(&self) -> Result<(), PersistError> {
        self.context.local_transaction().begin()?;
        tracing::info!(objects = self.objects.len(), "transaction begun");
        Ok(())
    }

    /// Flush and commit the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionState`] if no transaction is
    /// active, otherwise the first failed commit notification.
    pub fn commit(&mut self) -> Result<(), LifecycleError> {
        let tx = self.context.local_transaction();
        if !tx.is_active() {
            return Err(PersistError::TransactionState("no transaction is active".into()).into());
        }
        for sm in self.objects.values_mut() {
            if sm.state().is_transactional() {
                sm.flush();
            }
        }
        tx.end()?;

        let detach_all = self.config.detach_all_on_commit;
        let mut notified = 0usize;
        let mut first_failure = None;
        for sm in self.objects.values_mut() {
            let state = sm.state();
            if !state.is_transactional() {
                continue;
            }
            let result = if detach_all && state.is_persistent() && !state.is_deleted() {
                sm.detach()
            } else {
                sm.commit(tx)
            };
            match result {
                Ok(_) => notified += 1,
                Err(e) => {
                    tracing::warn!(object_id = %sm.object_id(), error = %e, "commit notification failed");
                    first_failure.get_or_insert(e);
                }
            }
        }
        tracing::info!(notified, detach_all, "transaction committed");
        first_failure.map_or(Ok(()), Err)
    }

    /// Roll back the active transaction.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionState`] if no transaction is
    /// active, otherwise the first failed rollback notification.
    pub fn rollback(&mut self) -> Result<(), LifecycleError> {
        let tx = self.context.local_transaction();
        tx.end()?;

        let datastore = self.context.datastore();
        let mut notified = 0usize;
        let mut first_failure = None;
        for sm in self.objects.values_mut() {
            if !sm.state().is_transactional() {
                continue;
            }
            if sm.state().is_new() {
                datastore.remove(sm.object_id());
            }
            match sm.rollback(tx) {
                Ok(_) => notified += 1,
                Err(e) => {
                    tracing::warn!(object_id = %sm.object_id(), error = %e, "rollback notification failed");
                    first_failure.get_or_insert(e);
                }
            }
        }
        tracing::info!(notified, "transaction rolled back");
        first_failure.map_or(Ok(()), Err)
    }

    // ── Object Management ────────────────────────────────────────────

    /// Start managing a transient object.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::FieldOutOfRange`] if more values than fields
    /// are supplied.
    pub fn add_transient(
        &mut self,
        metadata: Arc<ClassMetaData>,
        values: Vec<Value>,
    ) -> Result<ObjectId, PersistError> {
        let sm = StateManager::new_transient(Arc::clone(&self.context), metadata, values)?;
        Ok(self.insert(sm))
    }

    /// Create a transient object and make it persistent.
    pub fn persist(
        &mut self,
        metadata: Arc<ClassMetaData>,
        values: Vec<Value>,
    ) -> Result<ObjectId, LifecycleError> {
        let id = self.add_transient(metadata, values)?;
        self.make_persistent(&id)?;
        Ok(id)
    }

    /// Look up a stored object, returning it `HOLLOW` if not yet managed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::ObjectNotFound`] if the datastore has no row.
    pub fn find(
        &mut self,
        metadata: Arc<ClassMetaData>,
        id: &ObjectId,
    ) -> Result<ObjectId, PersistError> {
        if self.objects.contains_key(id) {
            return Ok(id.clone());
        }
        let sm = StateManager::hollow(Arc::clone(&self.context), metadata, id.clone())?;
        Ok(self.insert(sm))
    }

    fn insert(&mut self, sm: StateManager) -> ObjectId {
        let sm = sm
            .with_fetch_plan(self.config.fetch_plan())
            .with_restore_values(self.config.restore_values);
        let id = sm.object_id().clone();
        self.objects.insert(id.clone(), sm);
        id
    }

    fn manager(&mut self, id: &ObjectId) -> Result<&mut StateManager, PersistError> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| PersistError::NotManaged(id.clone()))
    }

    // ── Per-Object Operations ────────────────────────────────────────

    pub fn read_field(&mut self, id: &ObjectId, index: usize) -> Result<Value, LifecycleError> {
        self.manager(id)?.read_field(index)
    }

    pub fn write_field(
        &mut self,
        id: &ObjectId,
        index: usize,
        value: Value,
    ) -> Result<(), LifecycleError> {
        self.manager(id)?.write_field(index, value)
    }

    pub fn make_persistent(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.make_persistent()
    }

    pub fn delete_persistent(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.delete_persistent()
    }

    pub fn make_transactional(
        &mut self,
        id: &ObjectId,
        refresh_fields: bool,
    ) -> Result<StateType, LifecycleError> {
        self.manager(id)?.make_transactional(refresh_fields)
    }

    pub fn make_nontransactional(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.make_nontransactional()
    }

    /// Sever persistence, honoring the session's `detach_all_on_commit`.
    pub fn make_transient(
        &mut self,
        id: &ObjectId,
        use_fetch_plan: bool,
    ) -> Result<StateType, LifecycleError> {
        let detach_all = self.config.detach_all_on_commit;
        self.manager(id)?.make_transient(use_fetch_plan, detach_all)
    }

    pub fn retrieve(&mut self, id: &ObjectId, fg_only: bool) -> Result<StateType, LifecycleError> {
        self.manager(id)?.retrieve(fg_only)
    }

    pub fn retrieve_fetch_plan(
        &mut self,
        id: &ObjectId,
        plan: &FetchPlan,
    ) -> Result<StateType, LifecycleError> {
        self.manager(id)?.retrieve_fetch_plan(plan)
    }

    /// Refresh an object from the datastore. A new object is flushed first
    /// so it has a row to reload from.
    pub fn refresh(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        let sm = self.manager(id)?;
        let state = sm.state();
        if state.is_new() && !state.is_deleted() {
            sm.flush();
        }
        sm.refresh()
    }

    pub fn evict(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.evict()
    }

    /// Detach an object. Pending changes of a persistent object are flushed
    /// first so the detached copy matches what was stored.
    pub fn detach(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        let sm = self.manager(id)?;
        let state = sm.state();
        if state.is_persistent() && state.is_dirty() && !state.is_deleted() {
            sm.flush();
        }
        sm.detach()
    }

    pub fn attach(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.attach()
    }

    pub fn serialize(&mut self, id: &ObjectId) -> Result<StateType, LifecycleError> {
        self.manager(id)?.serialize()
    }
}
