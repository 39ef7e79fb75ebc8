use anyhow::{Context, Result};
use prolog_query::{PrologRunnable, QueryInput};
use serde_json::Value;

use crate::RulesArgs;

pub fn execute(
    args: &RulesArgs,
    input: Option<&str>,
    json_args: bool,
    dry_run: bool,
    max_results: Option<usize>,
) -> Result<()> {
    let config = super::load_config(args)?;
    let runnable = PrologRunnable::new(config);

    let input = match input {
        Some(text) if json_args => {
            let value: Value =
                serde_json::from_str(text).context("Query input is not valid JSON")?;
            QueryInput::from_json(value)?
        }
        Some(text) => QueryInput::from(text),
        None => QueryInput::Empty,
    };

    if dry_run {
        println!("{}", runnable.goal(&input)?);
        return Ok(());
    }

    let result = match max_results {
        Some(max) => runnable.invoke_limited(input, max)?,
        None => runnable.execute(&input)?,
    };
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}
