//! # Managed-Object Capability Contract
//!
//! The state machine drives a managed object exclusively through
//! [`ObjectProvider`]. Any surrogate implementation works as long as it
//! satisfies this trait; the states never see a concrete object model.
//!
//! Datastore-facing operations (`load_*`, `refresh_*`) are fallible and
//! their errors propagate out of the transition unchanged. Operations on
//! in-memory field images are infallible.

use persist_core::{ClassMetaData, FetchPlan, ObjectId, PersistError, Transaction, TransactionMode};

/// The owner of a surrogate: the session it belongs to.
pub trait ExecutionContext {
    /// The transaction the context is running under.
    fn transaction(&self) -> &dyn Transaction;
}

/// Runtime surrogate paired with a managed domain object.
pub trait ObjectProvider {
    /// Load every field not yet loaded.
    fn load_unloaded_fields(&mut self) -> Result<(), PersistError>;
    /// Load the unloaded fields selected by the context's fetch plan.
    fn load_unloaded_fields_in_fetch_plan(&mut self) -> Result<(), PersistError>;
    /// Load the unloaded fields of this object's class selected by `plan`.
    fn load_unloaded_fields_of_class_in_fetch_plan(
        &mut self,
        plan: &FetchPlan,
    ) -> Result<(), PersistError>;
    /// Reload fetch-plan fields from the datastore, overwriting memory.
    fn refresh_fields_in_fetch_plan(&mut self) -> Result<(), PersistError>;
    /// Reload the fields that are currently loaded.
    fn refresh_loaded_fields(&mut self) -> Result<(), PersistError>;
    /// Mark every field outside the fetch plan as unloaded.
    fn unload_non_fetch_plan_fields(&mut self);

    /// Snapshot field values for a later [`restore_fields`](Self::restore_fields).
    fn save_fields(&mut self);
    /// Put back the snapshot taken by [`save_fields`](Self::save_fields).
    fn restore_fields(&mut self);
    /// Discard the snapshot.
    fn clear_saved_fields(&mut self);
    /// Unload every field, key fields included.
    fn clear_fields(&mut self);
    /// Unload every field except the primary key.
    fn clear_non_primary_key_fields(&mut self);

    /// Enlist the object with the current transaction.
    fn register_transactional(&mut self);
    /// Release all persistence tracking for the object.
    fn disconnect(&mut self);

    fn execution_context(&self) -> &dyn ExecutionContext;
    fn class_metadata(&self) -> &ClassMetaData;
    /// Identity used in error messages and lifecycle logs.
    fn internal_object_id(&self) -> &ObjectId;
    /// Surrogate-level restore-values flag.
    fn is_restore_values(&self) -> bool;
}

/// Read the transaction flags once so the caller can mutate `op` afterwards.
pub(crate) fn transaction_mode(op: &dyn ObjectProvider) -> TransactionMode {
    op.execution_context().transaction().mode()
}

/// Disconnects the wrapped surrogate when dropped, whether or not the
/// surrounding transition completes.
pub(crate) struct DisconnectGuard<'a, P: ObjectProvider + ?Sized> {
    op: &'a mut P,
}

impl<'a, P: ObjectProvider + ?Sized> DisconnectGuard<'a, P> {
    pub(crate) fn new(op: &'a mut P) -> Self {
        Self { op }
    }
}

impl<P: ObjectProvider + ?Sized> Drop for DisconnectGuard<'_, P> {
    fn drop(&mut self) {
        self.op.disconnect();
    }
}
