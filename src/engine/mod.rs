//! Embedded Prolog engine using Scryer Prolog.
//!
//! One [`Machine`] serves the whole process. It lives on a dedicated thread and
//! callers hand it closures through [`Engine::run`]. A process-wide mutex is held
//! for each request/reply cycle, so goals never interleave and the lock is
//! released on every exit path, including panics inside the engine.
//!
//! Goals never reach the machine unchecked: each one is first read as a term
//! and then runs inside `catch/3`, so neither a syntax error nor an exception
//! leaves state behind for the next query.

mod marshal;
mod session;
mod solve;

pub use marshal::{term_text, term_to_json};
pub use session::{registry, RulesRegistry, RulesSession};
pub use solve::solve;

use parking_lot::Mutex;
use scryer_prolog::{LeafAnswer, Machine, MachineBuilder, Term};
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;

use crate::lexical;

/// Scryer compiles clauses recursively; give it more room than the default.
const ENGINE_STACK_SIZE: usize = 32 * 1024 * 1024;

/// Libraries every goal may rely on. `charsio` provides the goal syntax check.
const PRELUDE: &[&str] = &["use_module(library(charsio))"];

type Job = Box<dyn FnOnce(&mut Machine) + Send + 'static>;

/// One answer: variable name to marshalled value.
type Row = BTreeMap<String, Value>;

/// Handle to the engine thread.
pub struct Engine {
    jobs: Mutex<mpsc::Sender<Job>>,
}

static ENGINE: OnceLock<Result<Engine, String>> = OnceLock::new();

/// The process-wide engine, started on first use.
pub fn engine() -> Result<&'static Engine, String> {
    match ENGINE.get_or_init(Engine::start) {
        Ok(engine) => Ok(engine),
        Err(msg) => Err(msg.clone()),
    }
}

impl Engine {
    fn start() -> Result<Self, String> {
        let (tx, rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        thread::Builder::new()
            .name("prolog-engine".to_string())
            .stack_size(ENGINE_STACK_SIZE)
            .spawn(move || {
                let mut machine = MachineBuilder::default().build();
                let ready = prelude(&mut machine);
                let failed = ready.is_err();
                let _ = ready_tx.send(ready);
                if failed {
                    return;
                }
                log::debug!("Prolog engine thread started");

                for job in rx {
                    if panic::catch_unwind(AssertUnwindSafe(|| job(&mut machine))).is_err() {
                        log::error!("Prolog engine job panicked; engine continues");
                    }
                }
            })
            .map_err(|e| format!("failed to start engine thread: {}", e))?;

        ready_rx
            .recv()
            .map_err(|_| "engine thread exited during startup".to_string())??;

        Ok(Self {
            jobs: Mutex::new(tx),
        })
    }

    /// Run `f` against the machine and wait for its result.
    pub fn run<R, F>(&self, f: F) -> Result<R, String>
    where
        R: Send + 'static,
        F: FnOnce(&mut Machine) -> R + Send + 'static,
    {
        let jobs = self.jobs.lock();
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);

        let job: Job = Box::new(move |machine| {
            let _ = reply_tx.send(f(machine));
        });

        jobs.send(job)
            .map_err(|_| "engine thread has stopped".to_string())?;
        reply_rx
            .recv()
            .map_err(|_| "engine job panicked before replying".to_string())
    }
}

fn prelude(machine: &mut Machine) -> Result<(), String> {
    for directive in PRELUDE {
        let mut results = machine.run_query(terminated(directive));
        match results.next() {
            Some(Ok(LeafAnswer::False)) | None => {
                return Err(format!("engine prelude failed: {}", directive))
            }
            Some(Ok(LeafAnswer::Exception(term))) | Some(Err(term)) => {
                return Err(format!("engine prelude failed: {}", term_text(&term)))
            }
            Some(Ok(_)) => {}
        }
    }
    Ok(())
}

/// Run `goal` and report whether it has at least one answer.
fn prove_once(machine: &mut Machine, goal: &str) -> Result<bool, String> {
    Ok(!answers(machine, goal, &[], Some(1))?.is_empty())
}

/// Collect up to `limit` answers of `goal`, keeping only the bindings of `vars`.
///
/// An exception at any point fails the whole call with the exception text and
/// no rows are returned.
fn answers(
    machine: &mut Machine,
    goal: &str,
    vars: &[String],
    limit: Option<usize>,
) -> Result<Vec<Row>, String> {
    check_syntax(machine, goal)?;

    let caught = catch_variable(goal);
    let wrapped = terminated(&format!("catch(({}), {}, true)", goal, caught));

    let mut rows = Vec::new();
    if limit == Some(0) {
        return Ok(rows);
    }
    for answer in machine.run_query(wrapped) {
        match answer {
            Ok(LeafAnswer::True) => rows.push(Row::new()),
            Ok(LeafAnswer::LeafAnswer { bindings, .. }) => {
                if let Some(error) = bindings.get(&caught).filter(|t| !matches!(t, Term::Var(_))) {
                    return Err(term_text(error));
                }
                rows.push(
                    bindings
                        .iter()
                        .filter(|(name, _)| vars.contains(*name))
                        .map(|(name, term)| (name.clone(), term_to_json(term)))
                        .collect(),
                );
            }
            Ok(LeafAnswer::False) => break,
            Ok(LeafAnswer::Exception(term)) | Err(term) => return Err(term_text(&term)),
            #[allow(unreachable_patterns)]
            Ok(_) => {}
        }
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
    }
    Ok(rows)
}

/// Read `goal` as a term without running it.
///
/// The machine treats an unparsable query as a bug, so syntax errors are
/// caught here and returned as text.
fn check_syntax(machine: &mut Machine, goal: &str) -> Result<(), String> {
    let text = lexical::quote_atom(&format!("{} .", goal.trim_end()));
    let read = terminated(&format!(
        "catch((atom_chars({}, Cs), read_from_chars(Cs, _)), E, true)",
        text
    ));

    let mut results = machine.run_query(read);
    match results.next() {
        Some(Ok(LeafAnswer::LeafAnswer { bindings, .. })) => {
            match bindings.get("E").filter(|t| !matches!(t, Term::Var(_))) {
                Some(error) => Err(term_text(error)),
                None => Ok(()),
            }
        }
        Some(Ok(LeafAnswer::True)) => Ok(()),
        Some(Ok(LeafAnswer::Exception(term))) | Some(Err(term)) => Err(term_text(&term)),
        _ => Err(format!("could not read goal: {}", goal)),
    }
}

/// A variable name for the caught exception that `goal` does not use.
fn catch_variable(goal: &str) -> String {
    let used = lexical::free_variables(goal);
    let mut name = "Caught".to_string();
    while used.contains(&name) {
        name.push('_');
    }
    name
}

/// Terminate a goal with a full stop.
fn terminated(goal: &str) -> String {
    format!("{}.", goal.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_runs_goals() {
        let engine = engine().expect("engine should start");
        let proved = engine.run(|machine| prove_once(machine, "X = 1")).unwrap();
        assert_eq!(proved, Ok(true));

        let failed = engine.run(|machine| prove_once(machine, "1 = 2")).unwrap();
        assert_eq!(failed, Ok(false));
    }

    #[test]
    fn test_engine_reports_exceptions() {
        let engine = engine().unwrap();
        let result = engine
            .run(|machine| prove_once(machine, "no_such_predicate_xyz"))
            .unwrap();
        let message = result.unwrap_err();
        assert!(message.contains("existence_error"), "{message}");
    }

    #[test]
    fn test_exception_does_not_leak_into_next_goal() {
        let engine = engine().unwrap();
        let (first, second) = engine
            .run(|machine| {
                let first = prove_once(machine, "X is foo + 1");
                let second = prove_once(machine, "X = 1");
                (first, second)
            })
            .unwrap();
        assert!(first.unwrap_err().contains("type_error"));
        assert_eq!(second, Ok(true));
    }

    #[test]
    fn test_syntax_error_is_returned_not_panicked() {
        let engine = engine().unwrap();
        let (broken, after) = engine
            .run(|machine| {
                let broken = answers(machine, "f(X Y)", &["X".to_string()], None);
                let after = answers(machine, "(X = a ; X = b)", &["X".to_string()], None);
                (broken, after)
            })
            .unwrap();
        assert!(broken.unwrap_err().contains("syntax_error"));
        assert_eq!(after.unwrap().len(), 2);
    }

    #[test]
    fn test_answer_limit() {
        let engine = engine().unwrap();
        let vars = vec!["X".to_string()];
        let rows = engine
            .run(move |machine| answers(machine, "(X = a ; X = b ; X = c)", &vars, Some(2)))
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["X"], Value::from("a"));
    }

    #[test]
    fn test_catch_variable_avoids_goal_variables() {
        assert_eq!(catch_variable("p(X)"), "Caught");
        assert_eq!(catch_variable("p(Caught, Caught_)"), "Caught__");
    }
}
