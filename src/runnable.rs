//! The query entry point: translate, solve, marshal.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::PrologConfig;
use crate::engine;
use crate::error::{ConfigError, QueryError};
use crate::query::{QueryInput, Translator};
use crate::result::QueryResult;
use crate::schema::QuerySchema;

/// Runs queries against one configured rules file.
///
/// Cheap to clone; all clones share the loaded rules.
#[derive(Debug, Clone)]
pub struct PrologRunnable {
    config: PrologConfig,
}

impl PrologRunnable {
    pub fn new(config: PrologConfig) -> Self {
        Self { config }
    }

    /// Runnable for a rules file with no default predicate or schema.
    pub fn from_rules_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::new(PrologConfig::new(path.as_ref())?))
    }

    /// Schema for `predicate` with ordered parameter names.
    pub fn create_schema<I, S>(predicate: &str, params: I) -> Result<QuerySchema, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QuerySchema::new(predicate, params)
    }

    pub fn config(&self) -> &PrologConfig {
        &self.config
    }

    /// Consult another rules file alongside the configured ones.
    ///
    /// The files are loaded together into a fresh module; the previous session
    /// stays loaded for any other configuration that uses it.
    pub fn load_rules(&mut self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let path = path.into();
        let mut file = self.config.to_file();
        if file.rules_file != path && !file.extra_rules_files.contains(&path) {
            file.extra_rules_files.push(path);
        }
        self.config = PrologConfig::from_file(file)?;
        Ok(())
    }

    /// The goal `input` translates to, without running it.
    pub fn goal(&self, input: &QueryInput) -> Result<String, QueryError> {
        Translator::for_config(&self.config).translate(input)
    }

    /// Run one query.
    pub fn invoke(&self, input: impl Into<QueryInput>) -> Result<QueryResult, QueryError> {
        self.execute(&input.into())
    }

    /// Run a query given as JSON: a string, an object of arguments, or null.
    pub fn invoke_json(&self, input: Value) -> Result<QueryResult, QueryError> {
        self.execute(&QueryInput::from_json(input)?)
    }

    /// Run one query, returning at most `max_results` solutions.
    ///
    /// A goal without variables still proves to a boolean.
    pub fn invoke_limited(
        &self,
        input: impl Into<QueryInput>,
        max_results: usize,
    ) -> Result<QueryResult, QueryError> {
        if max_results == 0 {
            return Err(QueryError::InvalidInput(
                "max_results must be at least 1".to_string(),
            ));
        }
        self.solve(&input.into(), Some(max_results))
    }

    pub fn execute(&self, input: &QueryInput) -> Result<QueryResult, QueryError> {
        self.solve(input, None)
    }

    fn solve(&self, input: &QueryInput, limit: Option<usize>) -> Result<QueryResult, QueryError> {
        let goal = self.goal(input)?;
        engine::solve(self.config.session(), &goal, limit)
    }

    /// Run a query and yield its result piecewise.
    ///
    /// A proof yields one boolean; solutions are yielded one binding at a time.
    /// The query runs to completion before the first item is produced.
    pub fn stream(
        &self,
        input: impl Into<QueryInput>,
    ) -> Result<impl Iterator<Item = QueryResult>, QueryError> {
        let items: Vec<QueryResult> = match self.invoke(input)? {
            QueryResult::Solutions(solutions) => solutions
                .into_iter()
                .map(|binding| QueryResult::Solutions(vec![binding]))
                .collect(),
            proved => vec![proved],
        };
        Ok(items.into_iter())
    }

    /// Run every input, in order. The first failure aborts the batch.
    pub fn batch(&self, inputs: &[QueryInput]) -> Result<Vec<QueryResult>, QueryError> {
        self.batch_with_errors(inputs)
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                result.map_err(|e| QueryError::Batch {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Run every input, keeping each input's own success or failure.
    pub fn batch_with_errors(&self, inputs: &[QueryInput]) -> Vec<Result<QueryResult, QueryError>> {
        inputs.par_iter().map(|input| self.execute(input)).collect()
    }

    /// Run every input and return `(index, result)` pairs in completion order.
    pub fn batch_as_completed(
        &self,
        inputs: &[QueryInput],
    ) -> Vec<(usize, Result<QueryResult, QueryError>)> {
        let completed = Mutex::new(Vec::with_capacity(inputs.len()));
        inputs.par_iter().enumerate().for_each(|(index, input)| {
            let result = self.execute(input);
            completed.lock().push((index, result));
        });
        completed.into_inner()
    }
}
