//! Query configuration: rules file, default predicate, schema and engine flags.
//!
//! Building a [`PrologConfig`] validates every field and consults the rules files
//! into the shared engine. Configurations that name the same files share one
//! loaded session.
//!
//! Prolog flags are engine-wide: they are set when a session is first consulted
//! and then hold for every query in the process. Asking for different flags on
//! an already loaded session is an error.
//!
//! A configuration can also be read from TOML:
//!
//! ```toml
//! rules_file = "family.pl"
//! extra_rules_files = ["relatives.pl"]
//! default_predicate = "partner"
//!
//! [query_schema]
//! predicate = "partner"
//! params = ["man", "woman"]
//!
//! [prolog_flags]
//! occurs_check = "true"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{self, RulesSession};
use crate::error::ConfigError;
use crate::lexical;
use crate::schema::QuerySchema;

/// On-disk form of a [`PrologConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Path to the Prolog rules file, relative to the config file
    pub rules_file: PathBuf,
    /// Further rules files consulted into the same module
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_rules_files: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_schema: Option<QuerySchema>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prolog_flags: BTreeMap<String, String>,
}

impl ConfigFile {
    /// Parse a TOML config file. A relative `rules_file` is resolved against
    /// the config file's directory.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(dir) = path.parent() {
            for rules in std::iter::once(&mut file.rules_file).chain(&mut file.extra_rules_files) {
                if rules.is_relative() {
                    *rules = dir.join(&*rules);
                }
            }
        }

        Ok(file)
    }
}

/// Validated, immutable execution context for queries.
#[derive(Debug, Clone)]
pub struct PrologConfig {
    rules_file: PathBuf,
    extra_rules_files: Vec<PathBuf>,
    default_predicate: Option<String>,
    query_schema: Option<QuerySchema>,
    prolog_flags: BTreeMap<String, String>,
    session: Arc<RulesSession>,
}

impl PrologConfig {
    /// Start building a configuration for `rules_file`.
    pub fn builder(rules_file: impl Into<PathBuf>) -> PrologConfigBuilder {
        PrologConfigBuilder {
            file: ConfigFile {
                rules_file: rules_file.into(),
                ..Default::default()
            },
        }
    }

    /// Configuration with only a rules file.
    pub fn new(rules_file: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::builder(rules_file).build()
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_file(ConfigFile::read(path)?)
    }

    /// Build from an already-parsed [`ConfigFile`].
    pub fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let ConfigFile {
            rules_file,
            extra_rules_files,
            default_predicate,
            query_schema,
            prolog_flags,
        } = file;

        let all_files: Vec<PathBuf> = std::iter::once(&rules_file)
            .chain(&extra_rules_files)
            .cloned()
            .collect();
        for path in &all_files {
            if !path.is_file() {
                return Err(ConfigError::RulesFileNotFound(path.clone()));
            }
            fs::File::open(path).map_err(|source| ConfigError::RulesFileUnreadable {
                path: path.clone(),
                source,
            })?;
        }

        if let Some(name) = &default_predicate {
            if !lexical::is_predicate_name(name) {
                return Err(ConfigError::InvalidPredicateName(name.clone()));
            }
        }

        if let Some(schema) = &query_schema {
            schema.validate()?;
        }

        for (flag, value) in &prolog_flags {
            if lexical::classify(flag) != lexical::Lexeme::Atom {
                return Err(ConfigError::InvalidFlag {
                    flag: flag.clone(),
                    message: "flag names must be plain atoms".to_string(),
                });
            }
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidFlag {
                    flag: flag.clone(),
                    message: "flag value is empty".to_string(),
                });
            }
        }

        let session = engine::registry().load_all(&all_files, &prolog_flags)?;

        Ok(Self {
            rules_file,
            extra_rules_files,
            default_predicate,
            query_schema,
            prolog_flags,
            session,
        })
    }

    pub fn rules_file(&self) -> &Path {
        &self.rules_file
    }

    /// Rules files consulted alongside [`Self::rules_file`].
    pub fn extra_rules_files(&self) -> &[PathBuf] {
        &self.extra_rules_files
    }

    pub fn default_predicate(&self) -> Option<&str> {
        self.default_predicate.as_deref()
    }

    pub fn query_schema(&self) -> Option<&QuerySchema> {
        self.query_schema.as_ref()
    }

    /// Flags this configuration asked for. They match the session's flags
    /// unless none were asked for.
    pub fn prolog_flags(&self) -> &BTreeMap<String, String> {
        &self.prolog_flags
    }

    /// The loaded rules this configuration queries.
    pub fn session(&self) -> &Arc<RulesSession> {
        &self.session
    }

    /// The serializable form of this configuration.
    pub fn to_file(&self) -> ConfigFile {
        ConfigFile {
            rules_file: self.rules_file.clone(),
            extra_rules_files: self.extra_rules_files.clone(),
            default_predicate: self.default_predicate.clone(),
            query_schema: self.query_schema.clone(),
            prolog_flags: self.prolog_flags.clone(),
        }
    }
}

/// Builder for [`PrologConfig`].
#[derive(Debug, Clone)]
pub struct PrologConfigBuilder {
    file: ConfigFile,
}

impl PrologConfigBuilder {
    /// Consult another rules file into the same module.
    pub fn extra_rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file.extra_rules_files.push(path.into());
        self
    }

    pub fn default_predicate(mut self, name: impl Into<String>) -> Self {
        self.file.default_predicate = Some(name.into());
        self
    }

    pub fn query_schema(mut self, schema: QuerySchema) -> Self {
        self.file.query_schema = Some(schema);
        self
    }

    /// Set a Prolog flag applied when the rules file is first consulted.
    pub fn prolog_flag(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.file.prolog_flags.insert(flag.into(), value.into());
        self
    }

    /// Validate and consult the rules file.
    pub fn build(self) -> Result<PrologConfig, ConfigError> {
        PrologConfig::from_file(self.file)
    }
}
