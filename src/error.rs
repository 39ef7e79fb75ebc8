//! Error taxonomy for configuration and query execution.
//!
//! `ConfigError` is raised while building a [`crate::PrologConfig`] and is fatal to
//! that configuration. `QueryError` is raised per call and leaves the configuration
//! and the loaded rules untouched.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Prolog rules file not found: {}", .0.display())]
    RulesFileNotFound(PathBuf),

    #[error("Prolog rules file is not readable: {}: {source}", path.display())]
    RulesFileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid predicate name '{0}': expected a plain Prolog atom")]
    InvalidPredicateName(String),

    #[error("invalid query schema: {0}")]
    InvalidSchema(String),

    #[error("invalid Prolog flag '{flag}': {message}")]
    InvalidFlag { flag: String, message: String },

    #[error("failed to consult {}: {message}", path.display())]
    Consult { path: PathBuf, message: String },

    #[error("module '{module}' declared by {} is already loaded from {}", path.display(), loaded_from.display())]
    ModuleConflict {
        module: String,
        path: PathBuf,
        loaded_from: PathBuf,
    },

    #[error("invalid config file {}: {message}", path.display())]
    ConfigFile { path: PathBuf, message: String },

    #[error("Prolog engine unavailable: {0}")]
    Engine(String),
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Input data cannot be None or empty without a default predicate")]
    EmptyInput,

    #[error("No default predicate set: '{0}' looks like an argument list, not a goal")]
    NoDefaultPredicate(String),

    #[error("Mismatched parentheses in query: {0}")]
    MismatchedParentheses(String),

    #[error("Invalid input type: {0}")]
    InvalidInput(String),

    #[error("Invalid query arguments: structured input needs a query schema (missing schema)")]
    MissingSchema,

    #[error("unknown argument '{name}' for predicate {predicate}; expected one of [{expected}]")]
    UnknownArgument {
        name: String,
        predicate: String,
        expected: String,
    },

    #[error("no predicate name: the schema has none and no default predicate is configured")]
    MissingPredicate,

    #[error("Prolog execution error in '{goal}': {message}")]
    Execution { goal: String, message: String },

    #[error("Prolog engine unavailable: {0}")]
    Engine(String),

    #[error("Prolog batch execution error at input {index}: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<QueryError>,
    },
}
