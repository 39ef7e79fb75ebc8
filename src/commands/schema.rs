use anyhow::Result;
use prolog_query::PrologRunnable;

pub fn execute(predicate: &str, params: Vec<String>) -> Result<()> {
    let schema = PrologRunnable::create_schema(predicate, params)?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
