//! Loaded rules files and the registry that guarantees one consult per file set.
//!
//! Every session gets its own module. A single file that declares
//! `:- module(Name, Exports)` keeps its name; anything else is wrapped in a
//! generated `rules_<n>` module. Several files consulted together share one
//! generated module and their own module directives are dropped. Goals are
//! always qualified with the session's module, so two configurations in one
//! process never see each other's clauses.
//!
//! Prolog flags are engine-wide. They are applied when a session is first
//! consulted and stay in effect for every session afterwards.

use parking_lot::Mutex;
use regex::Regex;
use scryer_prolog::Machine;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use super::{engine, prove_once};
use crate::error::ConfigError;
use crate::lexical;

/// One consulted set of rules files.
#[derive(Debug)]
pub struct RulesSession {
    paths: Vec<PathBuf>,
    module: String,
    flags: BTreeMap<String, String>,
    loaded_at: SystemTime,
}

impl RulesSession {
    /// Canonical path of the primary rules file.
    pub fn path(&self) -> &Path {
        &self.paths[0]
    }

    /// Canonical paths of every file in the session, primary first.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Module the rules were loaded into.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Flags applied when the session was consulted.
    pub fn prolog_flags(&self) -> &BTreeMap<String, String> {
        &self.flags
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

/// Registry of loaded sessions, keyed by their canonical file paths.
#[derive(Default)]
pub struct RulesRegistry {
    sessions: Mutex<HashMap<Vec<PathBuf>, Arc<RulesSession>>>,
}

static REGISTRY: OnceLock<RulesRegistry> = OnceLock::new();

/// The process-wide registry.
pub fn registry() -> &'static RulesRegistry {
    REGISTRY.get_or_init(RulesRegistry::default)
}

fn module_decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*:-\s*module\(\s*([a-z][A-Za-z0-9_]*)\s*,")
            .expect("Invalid module declaration regex")
    })
}

/// Why a consult failed on the engine thread.
enum ConsultFailure {
    Flag { flag: String, message: String },
    Syntax { file: usize, message: String },
}

impl RulesRegistry {
    /// Load `path` unless it is already loaded.
    pub fn load(
        &self,
        path: &Path,
        flags: &BTreeMap<String, String>,
    ) -> Result<Arc<RulesSession>, ConfigError> {
        self.load_all(&[path.to_path_buf()], flags)
    }

    /// Load `paths` together into one module unless that set is already loaded.
    ///
    /// A repeat load with no flags reuses the session. A repeat load asking for
    /// different flags is rejected, since flags only take effect on first load.
    /// The registry lock is held until the consult finishes, so nobody can
    /// observe a half-loaded session.
    pub fn load_all(
        &self,
        paths: &[PathBuf],
        flags: &BTreeMap<String, String>,
    ) -> Result<Arc<RulesSession>, ConfigError> {
        let mut canonical: Vec<PathBuf> = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved =
                fs::canonicalize(path).map_err(|source| ConfigError::RulesFileUnreadable {
                    path: path.to_path_buf(),
                    source,
                })?;
            if !canonical.contains(&resolved) {
                canonical.push(resolved);
            }
        }
        let Some(primary) = canonical.first().cloned() else {
            return Err(ConfigError::Engine("no rules file given".to_string()));
        };

        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(&canonical) {
            if let Some(flag) = conflicting_flag(flags, &session.flags) {
                return Err(ConfigError::InvalidFlag {
                    flag,
                    message: format!(
                        "{} is already loaded with flags {:?}; flags apply only on first load",
                        primary.display(),
                        session.flags
                    ),
                });
            }
            log::debug!(
                "rules {} already loaded into module {}",
                primary.display(),
                session.module
            );
            return Ok(Arc::clone(session));
        }

        let mut sources = Vec::with_capacity(canonical.len());
        for path in &canonical {
            let source =
                fs::read_to_string(path).map_err(|source| ConfigError::RulesFileUnreadable {
                    path: path.clone(),
                    source,
                })?;
            sources.push(source);
        }

        let declared = match sources.as_slice() {
            [only] => declared_module(only),
            _ => None,
        };
        let (module, program) = match declared {
            Some(name) => {
                if let Some(other) = sessions.values().find(|s| s.module == name) {
                    return Err(ConfigError::ModuleConflict {
                        module: name,
                        path: primary,
                        loaded_from: other.path().to_path_buf(),
                    });
                }
                (name, sources.remove(0))
            }
            None => {
                let name = (sessions.len()..)
                    .map(|n| format!("rules_{}", n))
                    .find(|n| !sessions.values().any(|s| &s.module == n))
                    .unwrap_or_else(|| format!("rules_{}", sessions.len()));
                let mut program = format!(":- module({}, []).\n", name);
                for source in &sources {
                    program.push_str(&strip_module_directive(source));
                    program.push('\n');
                }
                (name, program)
            }
        };

        let path_atoms: Vec<String> = canonical
            .iter()
            .map(|p| lexical::quote_atom(&p.to_string_lossy()))
            .collect();
        let flag_list: Vec<(String, String)> = flags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let module_name = module.clone();

        log::debug!(
            "consulting {} file(s) from {} into module {}",
            canonical.len(),
            primary.display(),
            module
        );
        let outcome = engine()
            .map_err(ConfigError::Engine)?
            .run(move |machine| consult(machine, &path_atoms, &module_name, program, &flag_list))
            .map_err(ConfigError::Engine)?;

        match outcome {
            Ok(()) => {}
            Err(ConsultFailure::Flag { flag, message }) => {
                return Err(ConfigError::InvalidFlag { flag, message })
            }
            Err(ConsultFailure::Syntax { file, message }) => {
                return Err(ConfigError::Consult {
                    path: canonical.swap_remove(file),
                    message,
                })
            }
        }

        let session = Arc::new(RulesSession {
            paths: canonical.clone(),
            module,
            flags: flags.clone(),
            loaded_at: SystemTime::now(),
        });
        log::info!(
            "loaded {} into module {}",
            primary.display(),
            session.module
        );
        sessions.insert(canonical, Arc::clone(&session));
        Ok(session)
    }

    /// Session for `path` alone if it has been loaded.
    pub fn get(&self, path: &Path) -> Option<Arc<RulesSession>> {
        let canonical = fs::canonicalize(path).ok()?;
        self.sessions
            .lock()
            .get(std::slice::from_ref(&canonical))
            .cloned()
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }
}

/// First flag whose requested value differs from the applied one.
fn conflicting_flag(
    requested: &BTreeMap<String, String>,
    applied: &BTreeMap<String, String>,
) -> Option<String> {
    if requested.is_empty() || requested == applied {
        return None;
    }
    requested
        .keys()
        .chain(applied.keys())
        .find(|k| requested.get(*k) != applied.get(*k))
        .cloned()
}

/// Module name from a leading `:- module(Name, _)` directive.
fn declared_module(source: &str) -> Option<String> {
    let masked = lexical::mask(source);
    module_decl_regex()
        .captures(&masked)
        .map(|c| c[1].to_string())
}

/// Blank out a `:- module(...)` directive, keeping line numbers intact.
fn strip_module_directive(source: &str) -> String {
    let masked = lexical::mask(source);
    let Some(found) = module_decl_regex().find(&masked) else {
        return source.to_string();
    };
    let bytes = masked.as_bytes();
    let end = (found.end()..bytes.len())
        .find(|&i| bytes[i] == b'.' && bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace()))
        .map_or(bytes.len(), |i| i + 1);

    let blanked: String = source[found.start()..end]
        .chars()
        .map(|c| if c == '\n' { '\n' } else { ' ' })
        .collect();
    format!("{}{}{}", &source[..found.start()], blanked, &source[end..])
}

/// Apply flags, syntax-check every file, then load the program. Runs on the
/// engine thread.
fn consult(
    machine: &mut Machine,
    path_atoms: &[String],
    module: &str,
    program: String,
    flags: &[(String, String)],
) -> Result<(), ConsultFailure> {
    for (flag, value) in flags {
        let value_text = if value.parse::<f64>().is_ok() {
            value.clone()
        } else {
            lexical::format_atom(value)
        };
        let goal = format!("set_prolog_flag({}, {})", flag, value_text);
        match prove_once(machine, &goal) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ConsultFailure::Flag {
                    flag: flag.clone(),
                    message: format!("set_prolog_flag/2 failed for value {}", value),
                })
            }
            Err(message) => {
                return Err(ConsultFailure::Flag {
                    flag: flag.clone(),
                    message,
                })
            }
        }
    }

    // Read every clause so syntax errors surface here instead of being
    // printed and skipped by the loader. Operator and library directives are
    // honoured while reading so the rest of the file parses as it will load.
    for (file, path_atom) in path_atoms.iter().enumerate() {
        let check = format!(
            "open({path}, read, S), \
             catch((repeat, read_term(S, T, []), \
                    ( T = (:- op(P, Ty, Ns)) -> op(P, Ty, Ns) \
                    ; T = (:- use_module(library(L))) -> use_module(library(L)) \
                    ; true ), \
                    T == end_of_file, !), \
                   Err, (close(S), throw(Err))), \
             close(S)",
            path = path_atom
        );
        let message = match prove_once(machine, &check) {
            Ok(true) => continue,
            Ok(false) => "could not read rules file".to_string(),
            Err(message) => message,
        };
        return Err(ConsultFailure::Syntax { file, message });
    }

    machine.load_module_string(module, &program);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::solve;
    use crate::result::QueryResult;
    use tempfile::TempDir;

    #[test]
    fn test_declared_module() {
        assert_eq!(
            declared_module("% travel rules\n:- module(travel, [route/3]).\nroute(a, b, 1).\n"),
            Some("travel".to_string())
        );
        assert_eq!(
            declared_module("/* :- module(hidden, []). */\nfact(a).\n"),
            None
        );
        assert_eq!(declared_module("fact(a).\n"), None);
    }

    #[test]
    fn test_strip_module_directive() {
        let source = ":- module(travel,\n    [route/3]).\nroute(a, b, 1).\n";
        let stripped = strip_module_directive(source);
        assert_eq!(declared_module(&stripped), None);
        assert!(stripped.ends_with("route(a, b, 1).\n"));
        assert_eq!(stripped.lines().count(), source.lines().count());
        assert_eq!(strip_module_directive("fact(a).\n"), "fact(a).\n");
    }

    #[test]
    fn test_valid_file_is_consulted() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("planets.pl");
        fs::write(&path, "% inner planets\nplanet(mercury).\nplanet(venus).\n").unwrap();

        let session = registry().load(&path, &BTreeMap::new()).unwrap();
        assert!(session.module().starts_with("rules_"));
        assert_eq!(session.path(), fs::canonicalize(&path).unwrap());

        let result = solve(&session, "planet(venus)", None).unwrap();
        assert_eq!(result, QueryResult::Proved(true));
    }

    #[test]
    fn test_load_is_idempotent() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("colors.pl");
        fs::write(&path, "color(red).\ncolor(green).\n").unwrap();

        let first = registry().load(&path, &BTreeMap::new()).unwrap();
        let second = registry().load(&path, &BTreeMap::new()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.loaded_at(), second.loaded_at());
        assert!(registry().is_loaded(&path));
    }

    #[test]
    fn test_reload_with_different_flags_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flagged.pl");
        fs::write(&path, "item(a).\n").unwrap();
        let flags = BTreeMap::from([("occurs_check".to_string(), "false".to_string())]);

        let first = registry().load(&path, &flags).unwrap();
        assert_eq!(first.prolog_flags(), &flags);

        // Same flags, or none at all, reuse the session.
        assert!(Arc::ptr_eq(&first, &registry().load(&path, &flags).unwrap()));
        assert!(Arc::ptr_eq(&first, &registry().load(&path, &BTreeMap::new()).unwrap()));

        let other = BTreeMap::from([("occurs_check".to_string(), "error".to_string())]);
        let err = registry().load(&path, &other).unwrap_err();
        match err {
            ConfigError::InvalidFlag { flag, .. } => assert_eq!(flag, "occurs_check"),
            other => panic!("expected a flag conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_files_loaded_together_share_a_module() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("first.pl");
        let b = dir.path().join("second.pl");
        fs::write(&a, "step(one).\n").unwrap();
        fs::write(&b, ":- module(second_steps, []).\nstep(two).\n").unwrap();

        let session = registry()
            .load_all(&[a.clone(), b.clone()], &BTreeMap::new())
            .unwrap();
        assert_eq!(session.paths().len(), 2);
        assert!(session.module().starts_with("rules_"));
        assert_eq!(solve(&session, "step(two)", None).unwrap(), QueryResult::Proved(true));

        // The combined session does not register the files on their own.
        assert!(!registry().is_loaded(&b));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invalid.pl");
        fs::write(&path, "invalid_syntax(.").unwrap();

        let err = registry().load(&path, &BTreeMap::new()).unwrap_err();
        match &err {
            ConfigError::Consult { message, .. } => {
                assert!(message.contains("syntax_error"), "{message}")
            }
            other => panic!("expected a consult error, got {other:?}"),
        }
        assert!(!registry().is_loaded(&path));
    }

    #[test]
    fn test_conflicting_module_names() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pl");
        let b = dir.path().join("b.pl");
        fs::write(&a, ":- module(shared_conflict_mod, []).\nx(1).\n").unwrap();
        fs::write(&b, ":- module(shared_conflict_mod, []).\nx(2).\n").unwrap();

        registry().load(&a, &BTreeMap::new()).unwrap();
        let err = registry().load(&b, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ConfigError::ModuleConflict { .. }));
    }
}
