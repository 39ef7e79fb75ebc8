//! Translation of query inputs into Prolog goals.
//!
//! Three input shapes are accepted:
//!
//! - a complete goal, `partner(john, Y)`;
//! - a bare argument list for the default predicate, `john, Y`;
//! - structured arguments keyed by schema parameter, `{"man": null, "woman": "bianca"}`.
//!
//! Each becomes exactly one goal string. A `null` argument becomes a variable
//! named after its parameter with the first letter capitalised (`man` becomes
//! `Man`), so its solutions come back under that name.

use serde_json::{Map, Value};

use crate::config::PrologConfig;
use crate::error::QueryError;
use crate::lexical;
use crate::schema::{ArgSource, QuerySchema, SchemaInstance};

/// A request for [`crate::PrologRunnable`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// No input: the zero-arity default predicate.
    Empty,
    /// A goal, or an argument list when a default predicate is configured.
    Text(String),
    /// Arguments keyed by the configured schema's parameter names.
    Args(Map<String, Value>),
    /// Arguments validated against their own schema.
    Instance(SchemaInstance),
}

impl QueryInput {
    /// Interpret a JSON value as input: null, string or object.
    pub fn from_json(value: Value) -> Result<Self, QueryError> {
        match value {
            Value::Null => Ok(QueryInput::Empty),
            Value::String(s) => Ok(QueryInput::Text(s)),
            Value::Object(map) => Ok(QueryInput::Args(map)),
            other => Err(QueryError::InvalidInput(format!(
                "expected a string, an object or null, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<Map<String, Value>> for QueryInput {
    fn from(args: Map<String, Value>) -> Self {
        QueryInput::Args(args)
    }
}

impl From<SchemaInstance> for QueryInput {
    fn from(instance: SchemaInstance) -> Self {
        QueryInput::Instance(instance)
    }
}

impl<T: Into<QueryInput>> From<Option<T>> for QueryInput {
    fn from(input: Option<T>) -> Self {
        input.map_or(QueryInput::Empty, Into::into)
    }
}

/// Builds goal strings for one configuration.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    default_predicate: Option<&'a str>,
    schema: Option<&'a QuerySchema>,
}

impl<'a> Translator<'a> {
    pub fn new(default_predicate: Option<&'a str>, schema: Option<&'a QuerySchema>) -> Self {
        Self {
            default_predicate,
            schema,
        }
    }

    pub fn for_config(config: &'a PrologConfig) -> Self {
        Self::new(config.default_predicate(), config.query_schema())
    }

    /// Normalise `input` into a single goal.
    pub fn translate(&self, input: &QueryInput) -> Result<String, QueryError> {
        let goal = match input {
            QueryInput::Empty => self.empty_goal()?,
            QueryInput::Text(text) => self.text_goal(text)?,
            QueryInput::Args(args) => {
                let schema = self.schema.ok_or(QueryError::MissingSchema)?;
                self.structured_goal(schema, args)?
            }
            QueryInput::Instance(instance) => self.structured_goal(instance.schema(), instance)?,
        };
        log::debug!("translated {:?} into goal {}", input, goal);
        Ok(goal)
    }

    fn empty_goal(&self) -> Result<String, QueryError> {
        if let Some(predicate) = self.default_predicate {
            return Ok(predicate.to_string());
        }
        match self.schema {
            Some(schema) if schema.arity() == 0 => schema
                .predicate()
                .map(str::to_string)
                .ok_or(QueryError::EmptyInput),
            _ => Err(QueryError::EmptyInput),
        }
    }

    fn text_goal(&self, text: &str) -> Result<String, QueryError> {
        let text = strip_full_stop(text.trim());
        lexical::check_brackets(text).map_err(QueryError::MismatchedParentheses)?;

        if text.is_empty() {
            return self.empty_goal();
        }

        if let Some((name, inner)) = lexical::outer_compound(text) {
            if inner.trim().is_empty() {
                // `hello()` is not valid Prolog; it means the atom goal `hello`.
                return Ok(name.to_string());
            }
            return Ok(text.to_string());
        }

        match self.default_predicate {
            Some(predicate) => Ok(format!("{}({})", predicate, text)),
            None => {
                let parts = lexical::split_top_level(text);
                if parts.len() > 1 && parts.iter().all(|p| lexical::is_simple_term(p)) {
                    Err(QueryError::NoDefaultPredicate(text.to_string()))
                } else {
                    Ok(text.to_string())
                }
            }
        }
    }

    fn structured_goal<A: ArgSource + ?Sized>(
        &self,
        schema: &QuerySchema,
        source: &A,
    ) -> Result<String, QueryError> {
        let predicate = schema
            .predicate()
            .or(self.default_predicate)
            .ok_or(QueryError::MissingPredicate)?;

        let args = schema
            .ordered_values(source)?
            .into_iter()
            .map(|(name, value)| match value {
                None | Some(Value::Null) => Ok(lexical::capitalize(name)),
                Some(value) => format_value(value),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(compound(predicate, &args))
    }
}

/// `name` for zero arguments, `name(a, b)` otherwise.
fn compound(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{}({})", name, args.join(", "))
    }
}

/// Render a supplied argument value as Prolog text.
fn format_value(value: &Value) -> Result<String, QueryError> {
    match value {
        Value::Null => Ok("_".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(format_number(n)),
        Value::String(s) => Ok(lexical::format_text(s)),
        Value::Array(items) => {
            let items = items
                .iter()
                .map(format_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Object(_) => Err(QueryError::InvalidInput(
            "object values cannot be used as Prolog arguments".to_string(),
        )),
    }
}

/// Prolog requires a fraction before an exponent: `1e+20` must be `1.0e+20`.
fn format_number(n: &serde_json::Number) -> String {
    let text = n.to_string();
    if n.is_f64() && !text.contains('.') {
        match text.find(['e', 'E']) {
            Some(pos) => format!("{}.0{}", &text[..pos], &text[pos..]),
            None => format!("{}.0", text),
        }
    } else {
        text
    }
}

fn strip_full_stop(text: &str) -> &str {
    if lexical::mask(text).trim_end().ends_with('.') {
        text.trim_end().trim_end_matches('.').trim_end()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn partner_schema() -> QuerySchema {
        QuerySchema::new("partner", ["man", "woman"]).unwrap()
    }

    fn args(value: Value) -> QueryInput {
        QueryInput::from_json(value).unwrap()
    }

    #[test]
    fn test_full_goal_passes_through() {
        let t = Translator::new(None, None);
        assert_eq!(t.translate(&"partner(X, Y)".into()).unwrap(), "partner(X, Y)");
        assert_eq!(t.translate(&"X = 1, Y is X + 1".into()).unwrap(), "X = 1, Y is X + 1");
        assert_eq!(t.translate(&"parent(A, B, _).".into()).unwrap(), "parent(A, B, _)");
    }

    #[test]
    fn test_default_predicate_wraps_arguments() {
        let t = Translator::new(Some("partner"), None);
        assert_eq!(t.translate(&"peter, X".into()).unwrap(), "partner(peter, X)");
        assert_eq!(t.translate(&"partner(john, Y)".into()).unwrap(), "partner(john, Y)");
        assert_eq!(t.translate(&"f(a), Y".into()).unwrap(), "partner(f(a), Y)");
    }

    #[test]
    fn test_zero_arity_forms() {
        let t = Translator::new(Some("hello"), None);
        assert_eq!(t.translate(&QueryInput::Empty).unwrap(), "hello");
        assert_eq!(t.translate(&"".into()).unwrap(), "hello");
        assert_eq!(t.translate(&"hello()".into()).unwrap(), "hello");

        let bare = Translator::new(None, None);
        assert_eq!(bare.translate(&"hello()".into()).unwrap(), "hello");
    }

    #[test]
    fn test_empty_without_default_is_rejected() {
        let t = Translator::new(None, None);
        assert!(matches!(t.translate(&QueryInput::Empty), Err(QueryError::EmptyInput)));
        assert!(matches!(t.translate(&"   ".into()), Err(QueryError::EmptyInput)));
    }

    #[test]
    fn test_argument_list_without_default() {
        let t = Translator::new(None, None);
        let err = t.translate(&"john, Y".into()).unwrap_err();
        assert!(matches!(err, QueryError::NoDefaultPredicate(_)));
        assert!(err.to_string().contains("No default predicate set"));
    }

    #[test]
    fn test_mismatched_parentheses() {
        let t = Translator::new(None, None);
        let err = t.translate(&"partner(X, Y".into()).unwrap_err();
        assert!(err.to_string().contains("Mismatched parentheses in query"));
    }

    #[test]
    fn test_structured_placeholder_and_literal() {
        let schema = partner_schema();
        let t = Translator::new(None, Some(&schema));
        let goal = t
            .translate(&args(json!({"man": null, "woman": "bianca"})))
            .unwrap();
        assert_eq!(goal, "partner(Man, bianca)");
    }

    #[test]
    fn test_structured_value_kinds() {
        let schema = QuerySchema::new("trip", ["from", "to", "budget", "stops", "via"]).unwrap();
        let t = Translator::new(None, Some(&schema));
        let goal = t
            .translate(&args(json!({
                "from": "Rio de Janeiro",
                "to": "Cost",
                "budget": 1500.5,
                "stops": ["rome", "New York"],
                "via": "_"
            })))
            .unwrap();
        assert_eq!(goal, "trip('Rio de Janeiro', Cost, 1500.5, [rome, 'New York'], _)");
    }

    #[test]
    fn test_float_exponent_formatting() {
        assert_eq!(format_number(&serde_json::Number::from_f64(1e20).unwrap()), "1.0e+20");
        assert_eq!(format_number(&serde_json::Number::from(42)), "42");
    }

    #[test]
    fn test_structured_missing_key_is_placeholder() {
        let schema = partner_schema();
        let t = Translator::new(None, Some(&schema));
        let goal = t.translate(&args(json!({"woman": "bianca"}))).unwrap();
        assert_eq!(goal, "partner(Man, bianca)");
    }

    #[test]
    fn test_structured_errors() {
        let schema = partner_schema();
        let t = Translator::new(None, Some(&schema));
        assert!(matches!(
            t.translate(&args(json!({"child": "mary"}))),
            Err(QueryError::UnknownArgument { .. })
        ));
        assert!(matches!(
            t.translate(&args(json!({"man": {"nested": 1}}))),
            Err(QueryError::InvalidInput(_))
        ));

        let no_schema = Translator::new(Some("partner"), None);
        assert!(matches!(
            no_schema.translate(&args(json!({"man": null}))),
            Err(QueryError::MissingSchema)
        ));
    }

    #[test]
    fn test_schema_without_predicate_uses_default() {
        let schema = QuerySchema::without_predicate(["man", "woman"]).unwrap();
        let with_default = Translator::new(Some("partner"), Some(&schema));
        assert_eq!(
            with_default.translate(&args(json!({}))).unwrap(),
            "partner(Man, Woman)"
        );

        let without = Translator::new(None, Some(&schema));
        assert!(matches!(
            without.translate(&args(json!({}))),
            Err(QueryError::MissingPredicate)
        ));
    }

    #[test]
    fn test_instance_uses_its_own_schema() {
        let schema = partner_schema();
        let instance = schema.unbound_instance();
        let t = Translator::new(Some("other"), None);
        assert_eq!(t.translate(&instance.into()).unwrap(), "partner(Man, Woman)");
    }

    #[test]
    fn test_zero_parameter_schema() {
        let schema = QuerySchema::new("hello", Vec::<String>::new()).unwrap();
        let t = Translator::new(None, Some(&schema));
        assert_eq!(t.translate(&args(json!({}))).unwrap(), "hello");
        assert_eq!(t.translate(&QueryInput::Empty).unwrap(), "hello");
    }

    #[test]
    fn test_invalid_json_input_types() {
        for value in [json!(123), json!(["a"]), json!(true)] {
            let err = QueryInput::from_json(value).unwrap_err();
            assert!(err.to_string().contains("Invalid input type"));
        }
    }
}
