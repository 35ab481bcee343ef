//! Declarative rule configuration
//!
//! Rules can be declared as data (JSON, or anything serde reads into a
//! `serde_json::Value`) instead of in code. This is where the loosely typed
//! checks live: a `watched_fields` that is not an array of strings, or a
//! `derive` that does not name a known derivation, is rejected here before
//! anything is installed on a collection.
//!
//! ```json
//! {
//!   "cached_field": "fullName",
//!   "watched_fields": ["first", "last"],
//!   "derive": { "join": { "glue": " " } }
//! }
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::derive::{Derivation, FieldsJoiner};
use crate::error::{CacheFieldError, CacheFieldResult};
use crate::validation::{sanitize_for_logging, validate_field_name};

/// One cached field rule, as declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFieldConfig {
    pub cached_field: String,
    pub watched_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derive: Option<DeriveConfig>,
}

/// How the cached value is derived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeriveConfig {
    /// Name of a derivation in the [`DerivationRegistry`]
    Named(String),
    /// Inline joiner settings
    Join { join: JoinOptions },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl CacheFieldConfig {
    /// Parse a declaration, checking the type of every entry
    pub fn from_value(value: &Value) -> CacheFieldResult<Self> {
        let Some(object) = value.as_object() else {
            return Err(CacheFieldError::configuration(
                "declaration",
                describe(value),
                "must be an object",
            ));
        };

        let cached_field = match object.get("cached_field") {
            Some(Value::String(name)) => name.clone(),
            other => {
                return Err(CacheFieldError::configuration(
                    "cached_field",
                    describe_opt(other),
                    "must be a string",
                ))
            }
        };

        let watched_fields = match object.get("watched_fields") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name.clone()),
                    other => Err(CacheFieldError::configuration(
                        "watched_fields",
                        describe(other),
                        "must be an array of strings",
                    )),
                })
                .collect::<CacheFieldResult<Vec<_>>>()?,
            other => {
                return Err(CacheFieldError::configuration(
                    "watched_fields",
                    describe_opt(other),
                    "must be an array of strings",
                ))
            }
        };

        let derive = match object.get("derive") {
            None | Some(Value::Null) => None,
            Some(raw @ (Value::String(_) | Value::Object(_))) => {
                let parsed = serde_json::from_value::<DeriveConfig>(raw.clone()).map_err(|e| {
                    CacheFieldError::configuration(
                        "derive",
                        describe(raw),
                        format!("is not a valid derive declaration: {}", e),
                    )
                })?;
                Some(parsed)
            }
            Some(other) => {
                return Err(CacheFieldError::configuration(
                    "derive",
                    describe(other),
                    "must be a derivation name or a join object",
                ))
            }
        };

        Ok(Self {
            cached_field,
            watched_fields,
            derive,
        })
    }

    /// Resolve the declared derive against a registry
    ///
    /// `Ok(None)` means no derive was declared and the default applies.
    pub fn resolve_derive(
        &self,
        registry: &DerivationRegistry,
    ) -> CacheFieldResult<Option<Derivation>> {
        self.derive.as_ref().map(|d| registry.resolve(d)).transpose()
    }
}

/// Named derivations that declarations can refer to
#[derive(Debug, Clone)]
pub struct DerivationRegistry {
    derivations: HashMap<String, Derivation>,
}

impl Default for DerivationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DerivationRegistry {
    pub fn empty() -> Self {
        Self {
            derivations: HashMap::new(),
        }
    }

    /// Registry holding `"join"`, the default fields joiner
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("join", Derivation::joiner());
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, derivation: Derivation) -> &mut Self {
        self.derivations.insert(name.into(), derivation);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Derivation> {
        self.derivations.get(name)
    }

    pub fn resolve(&self, config: &DeriveConfig) -> CacheFieldResult<Derivation> {
        match config {
            DeriveConfig::Named(name) => self.get(name).cloned().ok_or_else(|| {
                CacheFieldError::configuration(
                    "derive",
                    sanitize_for_logging(name),
                    "is not a known derivation",
                )
            }),
            DeriveConfig::Join { join } => {
                let mut joiner = FieldsJoiner::default();
                if let Some(glue) = &join.glue {
                    joiner = joiner.with_glue(glue.clone());
                }
                if let Some(fields) = &join.fields {
                    for field in fields {
                        validate_field_name(field, "derive.join.fields")?;
                    }
                    joiner = joiner.with_fields(fields.iter().cloned());
                }
                Ok(joiner.into())
            }
        }
    }
}

fn describe(value: &Value) -> String {
    sanitize_for_logging(&value.to_string())
}

fn describe_opt(value: Option<&Value>) -> String {
    value.map_or_else(|| "<missing>".to_string(), describe)
}
