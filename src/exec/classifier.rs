use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{ExecutionResult, Outcome};
use crate::constants::TIMEOUT_EXIT_STATUS;

/// Tool families whose output the classifier knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    Homebrew,
    Maven,
    Gradle,
    Npm,
    Cargo,
    Pip,
    Swift,
    Git,
}

impl ToolFamily {
    /// Guess the tool family from the first program word of a command
    pub fn detect(command_text: &str) -> Option<Self> {
        // Skip leading env assignments like `FOO=1 brew install x`
        let program = command_text
            .split_whitespace()
            .find(|word| !word.contains('='))?;
        let program = program.rsplit('/').next().unwrap_or(program);

        match program {
            "brew" => Some(Self::Homebrew),
            "mvn" | "mvnw" => Some(Self::Maven),
            "gradle" | "gradlew" => Some(Self::Gradle),
            "npm" | "npx" | "yarn" | "pnpm" => Some(Self::Npm),
            "cargo" | "rustup" => Some(Self::Cargo),
            "pip" | "pip3" | "python" | "python3" => Some(Self::Pip),
            "swift" | "xcodebuild" => Some(Self::Swift),
            "git" => Some(Self::Git),
            _ => None,
        }
    }
}

/// One entry of the success-override table
///
/// A nonzero exit whose output contains `pattern` (case-insensitive) is treated
/// as a success. A rule without a family applies to every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicRule {
    pub pattern: String,
    #[serde(default)]
    pub family: Option<ToolFamily>,
}

impl HeuristicRule {
    pub fn new(pattern: impl Into<String>, family: Option<ToolFamily>) -> Self {
        Self {
            pattern: pattern.into(),
            family,
        }
    }

    fn applies_to(&self, family: Option<ToolFamily>) -> bool {
        match (family, self.family) {
            // Unknown tool: the whole table is consulted
            (None, _) => true,
            (Some(_), None) => true,
            (Some(wanted), Some(own)) => wanted == own,
        }
    }
}

/// The audited built-in override table
///
/// These markers come from installers and generators that exit nonzero on
/// cosmetic conditions after doing their work. Keep this list short.
pub fn default_rules() -> Vec<HeuristicRule> {
    vec![
        HeuristicRule::new("starting installation", Some(ToolFamily::Homebrew)),
        HeuristicRule::new("iniciando a instalação", Some(ToolFamily::Homebrew)),
        HeuristicRule::new("homebrew prefix", Some(ToolFamily::Homebrew)),
        HeuristicRule::new("already installed", Some(ToolFamily::Homebrew)),
        HeuristicRule::new("archetype", Some(ToolFamily::Maven)),
    ]
}

/// Maps an exit status plus captured output onto an [`Outcome`]
#[derive(Debug, Clone)]
pub struct ResultClassifier {
    rules: Vec<HeuristicRule>,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ResultClassifier {
    pub fn new(rules: Vec<HeuristicRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|rule| !rule.pattern.trim().is_empty())
            .map(|rule| HeuristicRule {
                pattern: rule.pattern.to_lowercase(),
                family: rule.family,
            })
            .collect();
        Self { rules }
    }

    /// A classifier that never overrides a nonzero exit
    pub fn strict() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[HeuristicRule] {
        &self.rules
    }

    /// Classify a terminated process
    pub fn classify(
        &self,
        exit_status: Option<i32>,
        output: String,
        family: Option<ToolFamily>,
    ) -> ExecutionResult {
        match exit_status {
            Some(0) => ExecutionResult::new(Some(0), output, Outcome::Success, None, None),
            Some(TIMEOUT_EXIT_STATUS) => ExecutionResult::new(
                Some(TIMEOUT_EXIT_STATUS),
                output,
                Outcome::Timeout,
                Some("Process was terminated after exceeding its time limit".to_string()),
                None,
            ),
            Some(code) => {
                if let Some(rule) = self.find_override(&output, family) {
                    debug!(exit_code = code, pattern = %rule.pattern, "nonzero exit overridden");
                    let pattern = rule.pattern.clone();
                    return ExecutionResult::new(
                        Some(code),
                        output,
                        Outcome::HeuristicSuccess,
                        None,
                        Some(pattern),
                    );
                }
                let message = failure_message(&output, &format!("Command exited with status {}", code));
                ExecutionResult::new(Some(code), output, Outcome::Failure, Some(message), None)
            }
            None => {
                let message =
                    failure_message(&output, "Process terminated without an exit status");
                ExecutionResult::new(None, output, Outcome::Failure, Some(message), None)
            }
        }
    }

    /// Result for a process the timeout path had to terminate
    pub fn timed_out(&self, output: String, timeout_secs: u64) -> ExecutionResult {
        ExecutionResult::new(
            Some(TIMEOUT_EXIT_STATUS),
            output,
            Outcome::Timeout,
            Some(format!("Command timed out after {} seconds", timeout_secs)),
            None,
        )
    }

    fn find_override(&self, output: &str, family: Option<ToolFamily>) -> Option<&HeuristicRule> {
        if output.is_empty() {
            return None;
        }
        let haystack = output.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(family))
            .find(|rule| haystack.contains(&rule.pattern))
    }
}

fn failure_message(output: &str, fallback: &str) -> String {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
