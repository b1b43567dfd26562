//! Schema - Declared attribute types for each resource type
//!
//! Providers declare one schema per resource type. The host owns planning and
//! diffing; the schema here is used to validate declared attributes before
//! any remote call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values, compared case-insensitively)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Set; carried as a list, order is irrelevant
    Set(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block with its own attribute schema
    Block(Box<ResourceSchema>),
}

impl AttributeType {
    /// Enum over string literals
    pub fn one_of(values: &[&str]) -> Self {
        AttributeType::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    /// Set of nested blocks
    pub fn set_of(block: ResourceSchema) -> Self {
        AttributeType::Set(Box::new(AttributeType::Block(Box::new(block))))
    }

    /// Map of strings
    pub fn string_map() -> Self {
        AttributeType::Map(Box::new(AttributeType::String))
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, .. }, v) => {
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(schema), Value::Map(map)) => match schema.validate(map) {
                Ok(()) => Ok(()),
                Err(mut errors) => Err(errors.remove(0)),
            },

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' conflicts with '{other}'")]
    Conflict { name: String, other: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Filled in by the provider when not declared
    pub computed: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    /// Value must not be shown in plans or logs
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    /// Attributes that must not be declared together with this one
    pub conflicts_with: Vec<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            description: None,
            conflicts_with: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Names of attributes whose values must never be displayed
    pub fn sensitive_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.sensitive)
            .map(|a| a.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Collect every problem with a declared attribute set.
    ///
    /// Undeclared required attributes with a default pass; attributes
    /// unknown to the schema are ignored.
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors: Vec<TypeError> = self
            .attributes
            .iter()
            .filter(|(name, a)| a.required && a.default.is_none() && !attributes.contains_key(*name))
            .map(|(name, _)| TypeError::MissingRequired { name: name.clone() })
            .collect();

        errors.extend(attributes.iter().filter_map(|(name, value)| {
            self.attributes
                .get(name)
                .and_then(|a| a.attr_type.validate(value).err())
        }));

        let declared = |name: &str| attributes.get(name).is_some_and(|v| !v.is_empty());
        let mut conflicts = std::collections::BTreeSet::new();
        for (name, schema) in &self.attributes {
            for other in &schema.conflicts_with {
                if declared(name) && declared(other) {
                    let pair = if name <= other {
                        (name.clone(), other.clone())
                    } else {
                        (other.clone(), name.clone())
                    };
                    conflicts.insert(pair);
                }
            }
        }
        for (name, other) in conflicts {
            errors.push(TypeError::Conflict { name, other });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_rejects_int() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_ignores_case() {
        let t = AttributeType::one_of(&["allow", "deny"]);
        assert!(t.validate(&Value::String("allow".to_string())).is_ok());
        assert!(t.validate(&Value::String("DENY".to_string())).is_ok());
        assert!(t.validate(&Value::String("drop".to_string())).is_err());
    }

    #[test]
    fn validate_set_of_blocks() {
        let block = ResourceSchema::new("member")
            .attribute(AttributeSchema::new("role", AttributeType::String).required());
        let t = AttributeType::set_of(block);

        let good = Value::List(vec![Value::Map(
            [("role".to_string(), Value::String("owner".to_string()))]
                .into_iter()
                .collect(),
        )]);
        assert!(t.validate(&good).is_ok());

        let bad = Value::List(vec![Value::Map(HashMap::new())]);
        assert!(matches!(
            t.validate(&bad),
            Err(TypeError::ListItemError { index: 0, .. })
        ));
    }

    #[test]
    fn undeclared_required_attribute_is_reported() {
        let schema = ResourceSchema::new("rancher_secret")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let attrs = HashMap::new();
        let result = schema.validate(&attrs);
        assert!(result.is_err());
    }

    #[test]
    fn conflicting_attributes() {
        let schema = ResourceSchema::new("rancher_environment")
            .attribute(
                AttributeSchema::new("orchestration", AttributeType::String)
                    .conflicts_with("project_template_id"),
            )
            .attribute(
                AttributeSchema::new("project_template_id", AttributeType::String)
                    .conflicts_with("orchestration"),
            );

        let mut attrs = HashMap::new();
        attrs.insert("orchestration".to_string(), Value::from("cattle"));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("project_template_id".to_string(), Value::from("1pt1"));
        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TypeError::Conflict { .. }));
    }

    #[test]
    fn sensitive_attributes_are_listed() {
        let schema = ResourceSchema::new("rancher_secret")
            .attribute(AttributeSchema::new("value", AttributeType::String).sensitive())
            .attribute(AttributeSchema::new("name", AttributeType::String));
        assert_eq!(schema.sensitive_attributes(), vec!["value"]);
    }
}
