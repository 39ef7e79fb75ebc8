//! Goal execution against a loaded rules module.

use super::{answers, engine, RulesSession};
use crate::error::QueryError;
use crate::lexical;
use crate::result::QueryResult;

/// Prove `goal` inside the session's module.
///
/// Without named variables the goal runs once and the result is a boolean.
/// Otherwise solutions are enumerated, up to `limit` when one is given. An
/// exception anywhere in the enumeration fails the whole call and no partial
/// solutions are returned.
pub fn solve(
    session: &RulesSession,
    goal: &str,
    limit: Option<usize>,
) -> Result<QueryResult, QueryError> {
    let vars = lexical::free_variables(goal);
    let qualified = format!("{}:({})", session.module(), goal);
    log::debug!("solving {} (variables: {:?})", qualified, vars);

    let engine = engine().map_err(QueryError::Engine)?;
    let to_error = |message: String| {
        log::warn!("goal {} raised {}", goal, message);
        QueryError::Execution {
            goal: goal.to_string(),
            message,
        }
    };

    if vars.is_empty() {
        let rows = engine
            .run(move |machine| answers(machine, &qualified, &[], Some(1)))
            .map_err(QueryError::Engine)?
            .map_err(to_error)?;
        return Ok(QueryResult::Proved(!rows.is_empty()));
    }

    let wanted = vars.clone();
    let rows = engine
        .run(move |machine| answers(machine, &qualified, &wanted, limit))
        .map_err(QueryError::Engine)?
        .map_err(to_error)?;
    log::debug!("{} produced {} solution(s)", goal, rows.len());

    Ok(QueryResult::from_rows(&vars, rows))
}
