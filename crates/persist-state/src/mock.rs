//! # Recording Surrogate
//!
//! An [`ObjectProvider`] that performs no field work and records every call
//! the state machine makes into it. Used to check the side effects of a
//! transition (which calls, how many, in what order) independently of any
//! field storage.
//!
//! Datastore-facing calls can be made to fail with
//! [`MockObjectProvider::failing_loads`] to exercise error propagation.

use persist_core::{
    ClassMetaData, FetchPlan, FieldMetaData, IdentityType, ObjectId, PersistError, Transaction,
    TransactionMode, TransactionOptions,
};

use crate::provider::{ExecutionContext, ObjectProvider};

/// A call made by the state machine into a surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCall {
    LoadUnloadedFields,
    LoadUnloadedFieldsInFetchPlan,
    LoadUnloadedFieldsOfClassInFetchPlan,
    RefreshFieldsInFetchPlan,
    RefreshLoadedFields,
    UnloadNonFetchPlanFields,
    SaveFields,
    RestoreFields,
    ClearSavedFields,
    ClearFields,
    ClearNonPrimaryKeyFields,
    RegisterTransactional,
    Disconnect,
}

/// Execution context with a fixed transaction mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockContext {
    pub mode: TransactionMode,
}

impl ExecutionContext for MockContext {
    fn transaction(&self) -> &dyn Transaction {
        &self.mode
    }
}

/// Surrogate that records calls instead of moving field values.
#[derive(Debug, Clone)]
pub struct MockObjectProvider {
    id: ObjectId,
    metadata: ClassMetaData,
    context: MockContext,
    restore_values: bool,
    fail_loads: bool,
    calls: Vec<ProviderCall>,
}

impl MockObjectProvider {
    /// A surrogate for a class with application identity under `mode`.
    pub fn new(mode: TransactionMode) -> Self {
        Self {
            id: ObjectId::new(),
            metadata: ClassMetaData::new(
                "mock.Widget",
                IdentityType::Application,
                vec![FieldMetaData::primary_key("id"), FieldMetaData::new("name")],
            ),
            context: MockContext { mode },
            restore_values: false,
            fail_loads: false,
            calls: Vec::new(),
        }
    }

    /// An active transaction with `options`.
    pub fn active(options: TransactionOptions) -> Self {
        Self::new(TransactionMode::active(options))
    }

    /// No transaction in progress, with `options`.
    pub fn inactive(options: TransactionOptions) -> Self {
        Self::new(TransactionMode::inactive(options))
    }

    pub fn with_identity(mut self, identity_type: IdentityType) -> Self {
        self.metadata.identity_type = identity_type;
        self
    }

    pub fn with_restore_values(mut self, restore_values: bool) -> Self {
        self.restore_values = restore_values;
        self
    }

    /// Make every datastore-facing call fail.
    pub fn failing_loads(mut self) -> Self {
        self.fail_loads = true;
        self
    }

    pub fn mode(&self) -> TransactionMode {
        self.context.mode
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> &[ProviderCall] {
        &self.calls
    }

    /// How many times `call` was made.
    pub fn count(&self, call: ProviderCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn datastore(&mut self, call: ProviderCall) -> Result<(), PersistError> {
        if self.fail_loads {
            return Err(PersistError::Datastore {
                object_id: self.id.clone(),
                reason: "injected failure".into(),
            });
        }
        self.calls.push(call);
        Ok(())
    }
}

impl ObjectProvider for MockObjectProvider {
    fn load_unloaded_fields(&mut self) -> Result<(), PersistError> {
        self.datastore(ProviderCall::LoadUnloadedFields)
    }

    fn load_unloaded_fields_in_fetch_plan(&mut self) -> Result<(), PersistError> {
        self.datastore(ProviderCall::LoadUnloadedFieldsInFetchPlan)
    }

    fn load_unloaded_fields_of_class_in_fetch_plan(
        &mut self,
        _plan: &FetchPlan,
    ) -> Result<(), PersistError> {
        self.datastore(ProviderCall::LoadUnloadedFieldsOfClassInFetchPlan)
    }

    fn refresh_fields_in_fetch_plan(&mut self) -> Result<(), PersistError> {
        self.datastore(ProviderCall::RefreshFieldsInFetchPlan)
    }

    fn refresh_loaded_fields(&mut self) -> Result<(), PersistError> {
        self.datastore(ProviderCall::RefreshLoadedFields)
    }

    fn unload_non_fetch_plan_fields(&mut self) {
        self.calls.push(ProviderCall::UnloadNonFetchPlanFields);
    }

    fn save_fields(&mut self) {
        self.calls.push(ProviderCall::SaveFields);
    }

    fn restore_fields(&mut self) {
        self.calls.push(ProviderCall::RestoreFields);
    }

    fn clear_saved_fields(&mut self) {
        self.calls.push(ProviderCall::ClearSavedFields);
    }

    fn clear_fields(&mut self) {
        self.calls.push(ProviderCall::ClearFields);
    }

    fn clear_non_primary_key_fields(&mut self) {
        self.calls.push(ProviderCall::ClearNonPrimaryKeyFields);
    }

    fn register_transactional(&mut self) {
        self.calls.push(ProviderCall::RegisterTransactional);
    }

    fn disconnect(&mut self) {
        self.calls.push(ProviderCall::Disconnect);
    }

    fn execution_context(&self) -> &dyn ExecutionContext {
        &self.context
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
