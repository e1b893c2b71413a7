//! # Error Types
//!
//! Errors raised by the collaborators around the state machine: the
//! datastore behind field loading, session bookkeeping, and field indexing.
//! The state machine never inspects these; it propagates them unchanged so
//! the caller sees the original failure.

use thiserror::Error;

use crate::identity::ObjectId;

/// Failure raised by a managed-object surrogate or its datastore.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The datastore could not satisfy a load or refresh.
    #[error("datastore error for {object_id}: {reason}")]
    Datastore {
        /// The object whose fields were being fetched.
        object_id: ObjectId,
        /// Datastore-supplied detail.
        reason: String,
    },

    /// The object no longer exists in the datastore.
    #[error("object {0} not found in datastore")]
    ObjectNotFound(ObjectId),

    /// The object is not managed by the session it was addressed through.
    #[error("object {0} is not managed by this session")]
    NotManaged(ObjectId),

    /// A field index outside the class metadata was addressed.
    #[error("field {field} out of range for class {class_name} ({field_count} fields)")]
    FieldOutOfRange {
        /// Class the field was looked up on.
        class_name: String,
        /// Requested field index.
        field: usize,
        /// Number of fields declared on the class.
        field_count: usize,
    },

    /// Transaction begin/end called in the wrong state.
    #[error("transaction state error: {0}")]
    TransactionState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datastore_error_names_object() {
        let id = ObjectId::new();
        let err = PersistError::Datastore {
            object_id: id.clone(),
            reason: "connection reset".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("connection reset"));
    }
}
