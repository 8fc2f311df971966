//! Convenience types shared by the client and the engines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::kind::ResourceKind;

/// Attribute name to value mapping for one object.
pub type Attributes = Map<String, Value>;

/// Name of the remote-assigned identifier attribute.
pub const ID_ATTRIBUTE: &str = "id";

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The remote identifier.
    pub id: i64,
    /// The object's display name.
    #[serde(default, alias = "displayName")]
    pub name: String,
}

impl SearchHit {
    /// Create a search hit.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A transient local copy of an object owned by EndPointMonitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResource {
    /// The resource kind.
    pub kind: ResourceKind,
    /// The remote-assigned identifier.
    pub id: i64,
    /// Every attribute except `id`.
    pub attributes: Attributes,
}

impl RemoteResource {
    /// Create a remote resource.
    pub fn new(kind: ResourceKind, id: i64, mut attributes: Attributes) -> Self {
        attributes.remove(ID_ATTRIBUTE);
        Self {
            kind,
            id,
            attributes,
        }
    }

    /// Decode an API response body. The body must be an object carrying an
    /// integer `id`.
    pub fn from_json(kind: ResourceKind, value: Value) -> Result<Self, ProviderError> {
        let attributes = match value {
            Value::Object(attributes) => attributes,
            other => {
                return Err(ProviderError::Deserialization {
                    message: format!("expected {} object, got {}", kind, value_type_name(&other)),
                    body: other.to_string(),
                });
            },
        };

        let Some(id) = attributes.get(ID_ATTRIBUTE).and_then(Value::as_i64) else {
            return Err(ProviderError::Deserialization {
                message: format!("{} response has no integer id", kind),
                body: Value::Object(attributes).to_string(),
            });
        };

        Ok(Self::new(kind, id, attributes))
    }

    /// The declarative state: attributes plus `id`.
    pub fn state(&self) -> Attributes {
        let mut state = self.attributes.clone();
        state.insert(ID_ATTRIBUTE.to_string(), Value::from(self.id));
        state
    }
}

/// Outcome of a remote delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// The object existed and was removed.
    Deleted,
    /// The object was already gone (HTTP 404).
    AlreadyAbsent,
}

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<Value>,
    /// The value after the change (None if removing).
    pub after: Option<Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Returns `true` if applying this plan would change nothing.
    pub fn is_no_op(&self) -> bool {
        self.changes.is_empty()
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata: type name, version and the registered type names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// The provider type name, used as a prefix for every type.
    pub type_name: String,
    /// The provider version.
    pub version: String,
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
