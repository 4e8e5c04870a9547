use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::command::Command;

/// How a command invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    /// Nonzero exit reclassified as success by a recognized output marker
    HeuristicSuccess,
}

impl Outcome {
    /// True for outcomes where the requested side effect is considered done
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success | Outcome::HeuristicSuccess)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::HeuristicSuccess => "heuristic_success",
        }
    }
}

/// Final result of a single command execution
///
/// Only the classifier and the executors' failure paths build these; fields are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    exit_code: Option<i32>,
    combined_output: String,
    outcome: Outcome,
    error_message: Option<String>,
    /// Pattern of the override rule that turned a failure into a success
    matched_rule: Option<String>,
}

impl ExecutionResult {
    pub(crate) fn new(
        exit_code: Option<i32>,
        combined_output: String,
        outcome: Outcome,
        error_message: Option<String>,
        matched_rule: Option<String>,
    ) -> Self {
        Self {
            exit_code,
            combined_output,
            outcome,
            error_message,
            matched_rule,
        }
    }

    /// A failure where no process produced an exit status (spawn errors and the like)
    pub(crate) fn launch_failure(message: impl Into<String>) -> Self {
        Self::new(None, String::new(), Outcome::Failure, Some(message.into()), None)
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn combined_output(&self) -> &str {
        &self.combined_output
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn matched_rule(&self) -> Option<&str> {
        self.matched_rule.as_deref()
    }

    /// True when the command never ran to an exit status of its own
    pub fn is_execution_error(&self) -> bool {
        match self.outcome {
            Outcome::Timeout => true,
            Outcome::Failure => self.exit_code.is_none(),
            _ => false,
        }
    }
}

/// Runs a command to completion and reports a classified result
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> ExecutionResult;
}

/// Runs a command inside a user-visible terminal session
#[async_trait]
pub trait InteractiveExecutor: Send + Sync {
    async fn execute_interactive(&self, command: &Command) -> ExecutionResult;

    /// Whether this platform can host interactive sessions at all
    fn is_supported(&self) -> bool {
        true
    }
}
