// Gateway module for actions - follows the Train Station Pattern
// All external access must go through this gateway

mod files;
mod log;
mod orchestrator;
mod templates;
mod types;

pub use files::create_file;
pub use log::{ActionLog, ActionLogBuffer, LogLevel};
pub use orchestrator::ActionOrchestrator;
pub use templates::{TemplateOverride, TemplateTable};
pub use types::{
    ActionOutcome, ActionResult, ActionSpec, ActionStatus, ActionType, ExecutingAction,
    ProjectContext, ProjectType, SessionEvent, StatusUpdate,
};
