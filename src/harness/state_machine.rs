use serde::Serialize;
use statig::prelude::*;

/// Progress events emitted by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    LoggedIn,
    ExecutionSubmitted { execution_id: String },
    StatusChecked,
    Concluded { passed: bool },
    Failed { reason: String },
}

/// Phase a test run has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Unauthenticated,
    Authenticated,
    ExecutionSubmitted,
    StatusChecked,
    Passed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Passed | RunPhase::Failed)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::Unauthenticated => "unauthenticated",
            RunPhase::Authenticated => "authenticated",
            RunPhase::ExecutionSubmitted => "execution submitted",
            RunPhase::StatusChecked => "status checked",
            RunPhase::Passed => "passed",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lifecycle of one workflow test run.
///
/// `Unauthenticated -> Authenticated -> ExecutionSubmitted -> StatusChecked
/// -> Passed | Failed`. A `Failed` event jumps straight to `Failed` from any
/// non-terminal phase; terminal phases ignore further events.
pub struct TestRun {
    workflow_id: String,
    phase: RunPhase,
    failed_in: Option<RunPhase>,
    execution_id: Option<String>,
    failure: Option<String>,
}

impl TestRun {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            phase: RunPhase::Unauthenticated,
            failed_in: None,
            execution_id: None,
            failure: None,
        }
    }
}

#[state_machine(initial = "State::unauthenticated()")]
impl TestRun {
    #[state]
    fn unauthenticated(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::LoggedIn => {
                self.advance(RunPhase::Authenticated);
                Transition(State::authenticated())
            }
            RunEvent::Failed { reason } => {
                self.record_failure(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn authenticated(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::ExecutionSubmitted { execution_id } => {
                self.execution_id = Some(execution_id.clone());
                self.advance(RunPhase::ExecutionSubmitted);
                Transition(State::execution_submitted())
            }
            RunEvent::Failed { reason } => {
                self.record_failure(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn execution_submitted(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::StatusChecked => {
                self.advance(RunPhase::StatusChecked);
                Transition(State::status_checked())
            }
            RunEvent::Failed { reason } => {
                self.record_failure(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn status_checked(&mut self, event: &RunEvent) -> Outcome<State> {
        match event {
            RunEvent::Concluded { passed: true } => {
                self.advance(RunPhase::Passed);
                Transition(State::passed())
            }
            RunEvent::Concluded { passed: false } => {
                self.record_failure("execution did not finish successfully");
                Transition(State::failed())
            }
            RunEvent::Failed { reason } => {
                self.record_failure(reason);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn passed(&mut self, event: &RunEvent) -> Outcome<State> {
        tracing::trace!(workflow_id = %self.workflow_id, ?event, "Ignoring event after run passed");
        Handled
    }

    #[state]
    fn failed(&mut self, event: &RunEvent) -> Outcome<State> {
        tracing::trace!(workflow_id = %self.workflow_id, ?event, "Ignoring event after run failed");
        Handled
    }
}

impl TestRun {
    fn advance(&mut self, phase: RunPhase) {
        tracing::debug!(
            workflow_id = %self.workflow_id,
            from = %self.phase,
            to = %phase,
            "Test run transition"
        );
        self.phase = phase;
    }

    fn record_failure(&mut self, reason: &str) {
        tracing::debug!(
            workflow_id = %self.workflow_id,
            phase = %self.phase,
            reason,
            "Test run failed"
        );
        self.failed_in = Some(self.phase);
        self.failure = Some(reason.to_string());
        self.phase = RunPhase::Failed;
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Phase the run was in when it failed.
    pub fn failed_in(&self) -> Option<RunPhase> {
        self.failed_in
    }

    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_passed(&self) -> bool {
        self.phase == RunPhase::Passed
    }
}
