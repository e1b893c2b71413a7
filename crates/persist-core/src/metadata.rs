//! # Class Metadata and Fetch Plans
//!
//! The state machine never parses mapping files; it only needs to know a
//! class's identity type, which fields form the key, and which fields a
//! fetch plan covers. `ClassMetaData` carries exactly those facts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityType;

/// Name of the fetch group every non-lazy field belongs to.
pub const DEFAULT_FETCH_GROUP: &str = "default";

/// Metadata for a single persistent field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetaData {
    /// Field name.
    pub name: String,
    /// Whether the field is part of the primary key.
    #[serde(default)]
    pub primary_key: bool,
    /// Fetch groups the field belongs to.
    #[serde(default = "default_groups")]
    pub fetch_groups: BTreeSet<String>,
}

fn default_groups() -> BTreeSet<String> {
    BTreeSet::from([DEFAULT_FETCH_GROUP.to_string()])
}

impl FieldMetaData {
    /// A non-key field in the default fetch group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: false,
            fetch_groups: default_groups(),
        }
    }

    /// A primary-key field.
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name)
        }
    }

    /// Remove the field from the default fetch group.
    pub fn lazy(mut self) -> Self {
        self.fetch_groups.remove(DEFAULT_FETCH_GROUP);
        self
    }

    /// Add the field to a named fetch group.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.fetch_groups.insert(group.into());
        self
    }
}

/// The set of fetch groups active for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPlan {
    /// Active group names.
    pub groups: BTreeSet<String>,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            groups: default_groups(),
        }
    }
}

impl FetchPlan {
    /// A plan covering the given groups only.
    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the plan selects the field.
    pub fn includes(&self, field: &FieldMetaData) -> bool {
        field.primary_key || field.fetch_groups.iter().any(|g| self.groups.contains(g))
    }
}

/// Metadata for a persistable class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetaData {
    /// Fully qualified class name.
    pub class_name: String,
    /// How instances are identified.
    pub identity_type: IdentityType,
    /// Declared persistent fields, indexed by position.
    pub fields: Vec<FieldMetaData>,
}

impl ClassMetaData {
    /// Create class metadata.
    pub fn new(
        class_name: impl Into<String>,
        identity_type: IdentityType,
        fields: Vec<FieldMetaData>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            identity_type,
            fields,
        }
    }

    pub fn identity_type(&self) -> IdentityType {
        self.identity_type
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Look up a field index by name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether field `index` is part of the primary key. Out-of-range
    /// indices are never key fields.
    pub fn is_primary_key(&self, index: usize) -> bool {
        self.fields.get(index).is_some_and(|f| f.primary_key)
    }

    /// Indices of the fields selected by `plan`. Key fields are always
    /// selected.
    pub fn fetch_plan_fields(&self, plan: &FetchPlan) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| plan.includes(f))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_class() -> ClassMetaData {
        ClassMetaData::new(
            "bank.Account",
            IdentityType::Application,
            vec![
                FieldMetaData::primary_key("number"),
                FieldMetaData::new("owner"),
                FieldMetaData::new("balance").in_group("money"),
                FieldMetaData::new("history").lazy(),
            ],
        )
    }

    #[test]
    fn test_default_plan_skips_lazy_fields() {
        let cmd = account_class();
        assert_eq!(cmd.fetch_plan_fields(&FetchPlan::default()), vec![0, 1, 2]);
    }

    #[test]
    fn test_named_group_plan_keeps_key_fields() {
        let cmd = account_class();
        let plan = FetchPlan::with_groups(["money"]);
        assert_eq!(cmd.fetch_plan_fields(&plan), vec![0, 2]);
    }

    #[test]
    fn test_primary_key_lookup() {
        let cmd = account_class();
        assert!(cmd.is_primary_key(0));
        assert!(!cmd.is_primary_key(1));
        assert!(!cmd.is_primary_key(99));
        assert_eq!(cmd.field_index("balance"), Some(2));
        assert_eq!(cmd.field_index("missing"), None);
    }

    #[test]
    fn test_field_metadata_deserializes_with_defaults() {
        let f: FieldMetaData = serde_json::from_str(r#"{"name":"owner"}"#).unwrap();
        assert!(!f.primary_key);
        assert!(f.fetch_groups.contains(DEFAULT_FETCH_GROUP));
    }
}
