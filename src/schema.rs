//! Query schemas: named, ordered parameter lists bound to a predicate.
//!
//! A schema fixes the positional order of arguments in generated goals.
//! Structured input arrives either as a plain JSON object or as a
//! [`SchemaInstance`]; both are read through [`ArgSource`] so the translator
//! has one code path for them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{ConfigError, QueryError};
use crate::lexical;

/// Predicate name plus ordered parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySchema {
    /// Predicate the schema describes; falls back to the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    /// Parameter names in argument order
    #[serde(default)]
    pub params: Vec<String>,
}

impl QuerySchema {
    /// Create a schema bound to `predicate`.
    pub fn new<I, S>(predicate: impl Into<String>, params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            predicate: Some(predicate.into()),
            params: params.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Create a schema that uses the configured default predicate.
    pub fn without_predicate<I, S>(params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            predicate: None,
            params: params.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Check predicate and parameter names.
    ///
    /// Parameters must start with a letter so that capitalising them yields a
    /// named (not anonymous) variable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(predicate) = &self.predicate {
            if !lexical::is_predicate_name(predicate) {
                return Err(ConfigError::InvalidPredicateName(predicate.clone()));
            }
        }
        let mut seen = HashSet::new();
        for param in &self.params {
            let valid = param.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                && param.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(ConfigError::InvalidSchema(format!(
                    "parameter '{param}' must be an identifier starting with a letter"
                )));
            }
            if !seen.insert(param.as_str()) {
                return Err(ConfigError::InvalidSchema(format!(
                    "duplicate parameter '{param}'"
                )));
            }
        }
        Ok(())
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Build a validated instance. Unknown keys are rejected; missing ones are unbound.
    pub fn instance(&self, values: Map<String, Value>) -> Result<SchemaInstance, QueryError> {
        let ordered = self
            .ordered_values(&values)?
            .into_iter()
            .map(|(_, v)| v.cloned().unwrap_or(Value::Null))
            .collect();
        Ok(SchemaInstance {
            schema: self.clone(),
            values: ordered,
        })
    }

    /// Instance with every parameter left unbound.
    pub fn unbound_instance(&self) -> SchemaInstance {
        SchemaInstance {
            schema: self.clone(),
            values: vec![Value::Null; self.params.len()],
        }
    }

    /// Extract `(param, value)` pairs in declared order from any argument source.
    ///
    /// `None` means the caller did not supply the parameter.
    pub fn ordered_values<'a, A: ArgSource + ?Sized>(
        &'a self,
        source: &'a A,
    ) -> Result<Vec<(&'a str, Option<&'a Value>)>, QueryError> {
        if let Some(unknown) = source.keys().into_iter().find(|k| !self.params.iter().any(|p| p == k)) {
            return Err(QueryError::UnknownArgument {
                name: unknown.to_string(),
                predicate: self.predicate.clone().unwrap_or_else(|| "<default>".to_string()),
                expected: self.params.join(", "),
            });
        }
        Ok(self
            .params
            .iter()
            .map(|p| (p.as_str(), source.value(p)))
            .collect())
    }
}

/// Key-ordered read access to structured query arguments.
pub trait ArgSource {
    /// Keys the caller supplied.
    fn keys(&self) -> Vec<&str>;

    /// Value for `name`, if supplied.
    fn value(&self, name: &str) -> Option<&Value>;
}

impl ArgSource for Map<String, Value> {
    fn keys(&self) -> Vec<&str> {
        Map::keys(self).map(String::as_str).collect()
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// Arguments already validated against a schema, stored in parameter order.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaInstance {
    schema: QuerySchema,
    values: Vec<Value>,
}

impl SchemaInstance {
    pub fn schema(&self) -> &QuerySchema {
        &self.schema
    }

    /// Set one parameter; unknown names are rejected.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), QueryError> {
        match self.schema.params.iter().position(|p| p == name) {
            Some(idx) => {
                self.values[idx] = value;
                Ok(())
            }
            None => Err(QueryError::UnknownArgument {
                name: name.to_string(),
                predicate: self
                    .schema
                    .predicate
                    .clone()
                    .unwrap_or_else(|| "<default>".to_string()),
                expected: self.schema.params.join(", "),
            }),
        }
    }

    /// Builder-style [`SchemaInstance::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.set(name, value.into())?;
        Ok(self)
    }
}

impl ArgSource for SchemaInstance {
    fn keys(&self) -> Vec<&str> {
        self.schema.params.iter().map(String::as_str).collect()
    }

    fn value(&self, name: &str) -> Option<&Value> {
        self.schema
            .params
            .iter()
            .position(|p| p == name)
            .map(|idx| &self.values[idx])
    }
}
