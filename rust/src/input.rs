//! Construction from untyped input.
//!
//! JSON documents and other loosely typed sources hand over a value that
//! may be a string, `false`, `null` or something else entirely. Strings are
//! parsed, `false` and `null` ask for a freshly generated kennitala, and
//! every other value is rejected before normalization.

use serde_json::Value;

use crate::kennitala::{EntityKind, Kennitala, KennitalaError};

impl Kennitala {
    /// Build from an untyped value, generating a person for `false`/`null`.
    pub fn from_value(value: &Value) -> Result<Self, KennitalaError> {
        Self::from_value_as(value, EntityKind::Person)
    }

    /// Build from an untyped value, generating `kind` for `false`/`null`.
    pub fn from_value_as(value: &Value, kind: EntityKind) -> Result<Self, KennitalaError> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Bool(false) | Value::Null => Ok(Self::generate(kind)),
            _ => Err(KennitalaError::InvalidArgumentType),
        }
    }
}

impl TryFrom<&Value> for Kennitala {
    type Error = KennitalaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}
