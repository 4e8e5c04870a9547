pub mod actions;
pub mod app;
pub mod cli;
pub mod constants;
pub mod deps;
pub mod exec;
pub mod utils;

pub use actions::{ActionOrchestrator, ActionOutcome, ActionSpec, ActionType, ProjectContext};
pub use app::{load_config, Config};
pub use deps::{DependencyChecker, DependencyStatus};
pub use exec::{Command, CommandExecutor, ExecutionResult, Outcome, ProcessExecutor};
pub use utils::EngineError;
