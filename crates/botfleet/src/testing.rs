//! Scripted [`CommandRunner`] used by unit tests.
//!
//! Records every command it is asked to run and answers with pre-scripted
//! exit statuses instead of starting real processes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cmd::{ChildProcess, CommandError, CommandRunner, CommandSpec, Exit};

/// What a scripted command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exit(i32),
    Signalled,
    /// `spawn` fails as if the program were not installed.
    SpawnError,
    /// Never exits on its own; only ends through `terminate`.
    Hang,
}

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// `program` matches and, when given, so does the first argument.
fn command_matches(spec: &CommandSpec, program: &str, first_arg: Option<&str>) -> bool {
    spec.program == program
        && first_arg.is_none_or(|arg| spec.args.first().is_some_and(|a| a == arg))
}

struct Rule {
    program: String,
    first_arg: Option<String>,
    outcomes: VecDeque<Outcome>,
}

impl Rule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        command_matches(spec, &self.program, self.first_arg.as_deref())
    }

    /// Next outcome; the last one repeats forever.
    fn next(&mut self) -> Outcome {
        if self.outcomes.len() > 1 {
            self.outcomes.pop_front().unwrap_or(Outcome::Exit(0))
        } else {
            self.outcomes.front().copied().unwrap_or(Outcome::Exit(0))
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<CommandSpec>,
    rules: Vec<Rule>,
    effects: Vec<(String, Option<String>, Effect)>,
    terminations: usize,
    next_pid: u32,
}

#[derive(Clone, Default)]
pub struct ScriptedRunner {
    state: Arc<Mutex<State>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script `program <first_arg> ...`; `None` matches any arguments.
    /// Unscripted commands exit 0.
    pub fn script(
        &self,
        program: &str,
        first_arg: Option<&str>,
        outcomes: impl IntoIterator<Item = Outcome>,
    ) -> &Self {
        self.lock().rules.push(Rule {
            program: program.to_string(),
            first_arg: first_arg.map(str::to_string),
            outcomes: outcomes.into_iter().collect(),
        });
        self
    }

    /// Run `effect` whenever a matching command is spawned.
    pub fn on_spawn(
        &self,
        program: &str,
        first_arg: Option<&str>,
        effect: impl Fn(&CommandSpec) + Send + Sync + 'static,
    ) -> &Self {
        self.lock().effects.push((
            program.to_string(),
            first_arg.map(str::to_string),
            Box::new(effect),
        ));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.lock().calls.clone()
    }

    /// Number of recorded invocations of `program <first_arg> ...`.
    pub fn count(&self, program: &str, first_arg: Option<&str>) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| command_matches(c, program, first_arg))
            .count()
    }

    pub fn terminations(&self) -> usize {
        self.lock().terminations
    }
}

impl CommandRunner for ScriptedRunner {
    type Child = ScriptedChild;

    fn spawn(&self, spec: &CommandSpec) -> Result<ScriptedChild, CommandError> {
        let mut state = self.lock();
        state.calls.push(spec.clone());
        let outcome = state
            .rules
            .iter_mut()
            .rev()
            .find(|r| r.matches(spec))
            .map_or(Outcome::Exit(0), Rule::next);

        if outcome == Outcome::SpawnError {
            return Err(CommandError::Spawn {
                cmd: spec.command_line(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted spawn error"),
            });
        }

        for (program, first_arg, effect) in &state.effects {
            if command_matches(spec, program, first_arg.as_deref()) {
                effect(spec);
            }
        }

        state.next_pid += 1;
        Ok(ScriptedChild {
            outcome,
            pid: Some(1000 + state.next_pid),
            state: Arc::clone(&self.state),
        })
    }
}

pub struct ScriptedChild {
    outcome: Outcome,
    pid: Option<u32>,
    state: Arc<Mutex<State>>,
}

impl ChildProcess for ScriptedChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<Exit, CommandError> {
        tokio::task::yield_now().await;
        let exit = match self.outcome {
            Outcome::Exit(code) => Exit::from_code(code),
            Outcome::Signalled => Exit::signalled(),
            Outcome::SpawnError | Outcome::Hang => {
                return std::future::pending().await;
            }
        };
        self.pid = None;
        Ok(exit)
    }

    async fn terminate(&mut self, _timeout: Duration) {
        self.pid = None;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .terminations += 1;
    }
}
