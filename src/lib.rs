//! Query a Prolog knowledge base with plain strings or structured arguments.
//!
//! ```no_run
//! use prolog_query::{PrologConfig, PrologRunnable, QueryResult};
//!
//! let config = PrologConfig::builder("family.pl")
//!     .default_predicate("partner")
//!     .build()?;
//! let runnable = PrologRunnable::new(config);
//!
//! // `peter, X` is the argument list of the default predicate
//! let result = runnable.invoke("peter, X")?;
//! assert_eq!(result.to_json_string(), r#"[{"X":"patricia"}]"#);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod lexical;
pub mod query;
pub mod result;
pub mod runnable;
pub mod schema;

// Re-export commonly used types
pub use config::{ConfigFile, PrologConfig, PrologConfigBuilder};
pub use error::{ConfigError, QueryError};
pub use query::{QueryInput, Translator};
pub use result::{Binding, QueryResult};
pub use runnable::PrologRunnable;
pub use schema::{ArgSource, QuerySchema, SchemaInstance};
