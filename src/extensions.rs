//! Type information for extension namespaces (`ns:field` keys).
//!
//! The registry is a plain value owned by the caller and handed to
//! [`Recording::validate_with`](crate::metadata::Recording). Namespaces it does not know about
//! are passed through unchecked.

use crate::validate::ValidationReport;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    #[error("Field key {0:?} is not of the form namespace:field")]
    InvalidKey(String),
    #[error("Extension namespace {0:?} is not registered")]
    UnknownNamespace(String),
    #[error("Field {0} is not defined by its extension")]
    UnknownField(String),
    #[error("Field {key} should hold a value of type {expected:?}")]
    WrongType { key: String, expected: FieldType },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Bool,
    Array,
    Object,
    Any,
}

impl FieldType {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

/// Splits `ns:field`, requiring both halves to be non-empty.
pub fn split_key(key: &str) -> Result<(&str, &str), ExtensionError> {
    match key.split_once(':') {
        Some((ns, field)) if !ns.is_empty() && !field.is_empty() && !field.contains(':') => {
            Ok((ns, field))
        }
        _ => Err(ExtensionError::InvalidKey(key.to_string())),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    namespace: String,
    version: String,
    fields: BTreeMap<String, FieldType>,
}

impl Extension {
    pub fn new(namespace: &str, version: &str) -> Result<Self, ExtensionError> {
        if namespace.is_empty() || namespace.contains(':') {
            return Err(ExtensionError::InvalidKey(namespace.to_string()));
        }
        Ok(Extension {
            namespace: namespace.to_string(),
            version: version.to_string(),
            fields: BTreeMap::new(),
        })
    }

    pub fn with_field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.insert(name.to_string(), ty);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }
}

/// Registered extensions by namespace. Entries stay until removed or cleared.
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    extensions: HashMap<String, Extension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the extension previously registered under the same namespace.
    pub fn register(&mut self, extension: Extension) -> Option<Extension> {
        self.extensions
            .insert(extension.namespace.clone(), extension)
    }

    pub fn unregister(&mut self, namespace: &str) -> Option<Extension> {
        self.extensions.remove(namespace)
    }

    pub fn clear(&mut self) {
        self.extensions.clear();
    }

    pub fn get(&self, namespace: &str) -> Option<&Extension> {
        self.extensions.get(namespace)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn lookup(&self, key: &str) -> Result<FieldType, ExtensionError> {
        let (ns, field) = split_key(key)?;
        self.extensions
            .get(ns)
            .ok_or_else(|| ExtensionError::UnknownNamespace(ns.to_string()))?
            .field_type(field)
            .ok_or_else(|| ExtensionError::UnknownField(key.to_string()))
    }

    pub fn check(&self, key: &str, value: &Value) -> Result<(), ExtensionError> {
        let expected = self.lookup(key)?;
        if expected.matches(value) {
            Ok(())
        } else {
            Err(ExtensionError::WrongType {
                key: key.to_string(),
                expected,
            })
        }
    }

    /// Adds a finding for every malformed key and for every field of a registered namespace
    /// that is unknown or has the wrong type.
    pub fn check_fields(
        &self,
        base: &str,
        fields: &Map<String, Value>,
        report: &mut ValidationReport,
    ) {
        for (key, value) in fields {
            let path = format!("{base}.{key}");
            let ns = match split_key(key) {
                Ok((ns, _)) => ns,
                Err(e) => {
                    report.push(path, e.to_string(), None);
                    continue;
                }
            };
            if ns == "core" || !self.extensions.contains_key(ns) {
                continue;
            }
            if let Err(e) = self.check(key, value) {
                report.push(path, e.to_string(), Some(value));
            }
        }
    }
}
