// Test run orchestration: one workflow, one execution, one status read

pub mod runner;
pub mod state_machine;

pub use runner::{run_test, TestOutcome, WorkflowTestRunner};
pub use state_machine::{RunEvent, RunPhase, TestRun};
