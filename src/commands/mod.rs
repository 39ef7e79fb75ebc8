pub mod check;
pub mod query;
pub mod schema;

use anyhow::{bail, Context, Result};
use prolog_query::{ConfigFile, PrologConfig, QuerySchema};

use crate::RulesArgs;

/// Build a configuration from `--config` and the explicit flags layered on top.
pub fn load_config(args: &RulesArgs) -> Result<PrologConfig> {
    let mut file = match &args.config {
        Some(path) => ConfigFile::read(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ConfigFile::default(),
    };

    if let Some(rules) = &args.rules {
        file.rules_file = rules.clone();
    }
    file.extra_rules_files.extend(args.extra_rules.iter().cloned());
    if let Some(predicate) = &args.predicate {
        file.default_predicate = Some(predicate.clone());
    }
    if let Some(spec) = &args.schema {
        file.query_schema = Some(parse_schema(spec)?);
    }
    for flag in &args.flags {
        let (name, value) = flag
            .split_once('=')
            .with_context(|| format!("Flag must be NAME=VALUE, got '{flag}'"))?;
        file.prolog_flags
            .insert(name.trim().to_string(), value.trim().to_string());
    }

    let rules_file = file.rules_file.clone();
    PrologConfig::from_file(file)
        .with_context(|| format!("Failed to load rules from {}", rules_file.display()))
}

/// Parse `PRED:a,b` or `:a,b` into a schema.
pub fn parse_schema(spec: &str) -> Result<QuerySchema> {
    let Some((predicate, params)) = spec.split_once(':') else {
        bail!("Schema must be PRED:param,param, got '{spec}'");
    };
    let params: Vec<&str> = params
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let schema = if predicate.trim().is_empty() {
        QuerySchema::without_predicate(params)?
    } else {
        QuerySchema::new(predicate.trim(), params)?
    };
    Ok(schema)
}
