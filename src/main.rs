use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Query Prolog rules with plain strings or structured arguments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the result as JSON
    Query {
        #[command(flatten)]
        rules: RulesArgs,

        /// Query text, or a JSON object of arguments with --json-args
        input: Option<String>,

        /// Parse INPUT as JSON (object of named arguments, string, or null)
        #[arg(long)]
        json_args: bool,

        /// Print the goal without running it
        #[arg(long)]
        dry_run: bool,

        /// Stop after this many solutions
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_results: Option<u64>,
    },

    /// Load a rules file and report consult errors
    Check {
        #[command(flatten)]
        rules: RulesArgs,
    },

    /// Print a query schema descriptor as JSON
    Schema {
        /// Predicate name
        predicate: String,

        /// Parameter names, in argument order
        params: Vec<String>,
    },
}

/// Where the rules come from and how queries against them are shaped
#[derive(Args, Clone)]
pub struct RulesArgs {
    /// Prolog rules file
    #[arg(long, required_unless_present = "config")]
    pub rules: Option<PathBuf>,

    /// Further rules file consulted into the same module (repeatable)
    #[arg(long = "also", value_name = "FILE")]
    pub extra_rules: Vec<PathBuf>,

    /// TOML configuration file (overridden by explicit flags)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Default predicate for argument-list queries
    #[arg(long)]
    pub predicate: Option<String>,

    /// Query schema as PRED:param,param
    #[arg(long)]
    pub schema: Option<String>,

    /// Prolog flag as name=value (repeatable)
    #[arg(long = "flag", value_name = "NAME=VALUE")]
    pub flags: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            rules,
            input,
            json_args,
            dry_run,
            max_results,
        } => {
            let max_results = max_results.map(|n| n as usize);
            commands::query::execute(&rules, input.as_deref(), json_args, dry_run, max_results)?;
        }
        Commands::Check { rules } => {
            commands::check::execute(&rules)?;
        }
        Commands::Schema { predicate, params } => {
            commands::schema::execute(&predicate, params)?;
        }
    }

    Ok(())
}
