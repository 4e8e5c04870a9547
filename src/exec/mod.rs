// Gateway module for command execution - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod classifier;
mod command;
mod environment;
mod process;
mod terminal;
mod types;

// Public re-exports - the ONLY way to access execution functionality
pub use classifier::{default_rules, HeuristicRule, ResultClassifier, ToolFamily};
pub use command::{parse_command, Command, ParsedCommand};
pub use environment::{augment_path, ShellEnvironment, ShellEnvironmentBuilder};
pub use process::{ProcessExecutor, Resolution, ResolutionGate};
pub use terminal::{
    default_interactive_executor, escape_script_string, session_script, TerminalCommandExecutor,
    UnsupportedInteractiveExecutor,
};
pub use types::{CommandExecutor, ExecutionResult, InteractiveExecutor, Outcome};

#[cfg(test)]
pub(crate) use types::MockCommandExecutor;
