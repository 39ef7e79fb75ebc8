//! Query results as plain data.
//!
//! A goal without named variables proves to `true` or `false`. A goal with
//! named variables yields one [`Binding`] per solution, in engine order and with
//! duplicates kept. When it has no solutions at all the result is `false`,
//! never an empty list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Variable name to value, in the order the variables appear in the goal.
pub type Binding = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResult {
    Proved(bool),
    Solutions(Vec<Binding>),
}

impl QueryResult {
    /// Assemble solution rows into bindings over `vars`.
    ///
    /// Variables the engine left unbound map to `null`.
    pub(crate) fn from_rows(vars: &[String], rows: Vec<BTreeMap<String, Value>>) -> Self {
        if rows.is_empty() {
            return QueryResult::Proved(false);
        }
        let solutions = rows
            .into_iter()
            .map(|mut row| {
                vars.iter()
                    .map(|var| (var.clone(), row.remove(var).unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        QueryResult::Solutions(solutions)
    }

    /// `Some(bool)` for a proof result.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryResult::Proved(b) => Some(*b),
            QueryResult::Solutions(_) => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_bool() == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.as_bool() == Some(false)
    }

    pub fn solutions(&self) -> Option<&[Binding]> {
        match self {
            QueryResult::Solutions(s) => Some(s),
            QueryResult::Proved(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            QueryResult::Proved(b) => Value::Bool(*b),
            QueryResult::Solutions(s) => {
                Value::Array(s.iter().cloned().map(Value::Object).collect())
            }
        }
    }

    /// Encoding used when a result crosses a tool-call boundary.
    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl From<bool> for QueryResult {
    fn from(b: bool) -> Self {
        QueryResult::Proved(b)
    }
}
