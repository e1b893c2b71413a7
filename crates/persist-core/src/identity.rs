//! # Object Identity
//!
//! `ObjectId` is the internal identity a surrogate reports in error messages
//! and lifecycle logs. `IdentityType` records how the class assigns identity,
//! which decides whether an object can be re-found after its non-key fields
//! are cleared.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Internal identifier of a managed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    /// Generate a new random object identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object:{}", self.0)
    }
}

/// How instances of a class are identified in the datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityType {
    /// Identity is formed from application-managed primary-key fields.
    Application,
    /// Identity is a surrogate key assigned by the datastore.
    Datastore,
    /// No durable identity; the object cannot be looked up again once its
    /// values are discarded.
    Nondurable,
}

impl IdentityType {
    /// Whether key fields survive the transaction boundary, so the object
    /// can be reloaded from `HOLLOW`.
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Nondurable)
    }
}

impl std::fmt::Display for IdentityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Application => "application",
            Self::Datastore => "datastore",
            Self::Nondurable => "nondurable",
        };
        f.write_str(s)
    }
}
