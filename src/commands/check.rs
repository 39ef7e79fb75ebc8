use anyhow::Result;

use crate::RulesArgs;

pub fn execute(args: &RulesArgs) -> Result<()> {
    let config = super::load_config(args)?;
    let session = config.session();
    println!(
        "✓ {} loaded as module '{}'",
        session.path().display(),
        session.module()
    );
    for extra in session.paths().iter().skip(1) {
        println!("  also loaded: {}", extra.display());
    }
    if let Some(predicate) = config.default_predicate() {
        println!("  default predicate: {predicate}");
    }
    if let Some(schema) = config.query_schema() {
        println!("  schema: {}", schema.params().join(", "));
    }
    Ok(())
}
