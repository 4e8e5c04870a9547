use chrono::Local;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::files::create_file;
use super::log::{ActionLog, ActionLogBuffer, LogLevel};
use super::templates::TemplateTable;
use super::types::{
    ActionOutcome, ActionResult, ActionSpec, ActionStatus, ActionType, ExecutingAction,
    ProjectContext, SessionEvent, StatusUpdate,
};
use crate::app::OrchestratorConfig;
use crate::constants::{
    COMMAND_TIMEOUT_SECS, EVENT_CHANNEL_CAPACITY, PROGRESS_COMPLETED, PROGRESS_EXECUTING,
    PROGRESS_FAILED, PROGRESS_FINISHING, PROGRESS_PREPARING,
};
use crate::exec::{Command, CommandExecutor, ExecutionResult, InteractiveExecutor, Outcome};
use crate::utils::EngineError;

/// Mutable state of one orchestration session
struct SessionState {
    logs: ActionLogBuffer,
    current: Option<ExecutingAction>,
}

/// Releases the in-flight flag however the action ends
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives actions through `Preparing → Executing → Finishing → Completed | Failed`
///
/// One orchestrator is one session: it owns the log buffer and the single
/// live [`ExecutingAction`]. Clones share that session.
#[derive(Clone)]
pub struct ActionOrchestrator {
    executor: Arc<dyn CommandExecutor>,
    interactive: Arc<dyn InteractiveExecutor>,
    templates: Arc<TemplateTable>,
    settings: OrchestratorConfig,
    command_timeout: Duration,
    state: Arc<Mutex<SessionState>>,
    in_flight: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    events: broadcast::Sender<SessionEvent>,
}

impl ActionOrchestrator {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        interactive: Arc<dyn InteractiveExecutor>,
        templates: TemplateTable,
        settings: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            executor,
            interactive,
            templates: Arc::new(templates),
            state: Arc::new(Mutex::new(SessionState {
                logs: ActionLogBuffer::new(settings.log_capacity),
                current: None,
            })),
            settings,
            command_timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
            in_flight: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    /// Timeout applied to every command this session runs
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn templates(&self) -> &TemplateTable {
        &self.templates
    }

    /// The live action, if any
    pub fn current(&self) -> Option<ExecutingAction> {
        self.state.lock().current.clone()
    }

    pub fn logs(&self) -> Vec<ActionLog> {
        self.state.lock().logs.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run `spec` on a background task
    pub fn spawn_action(
        &self,
        spec: ActionSpec,
        context: ProjectContext,
    ) -> JoinHandle<Result<ActionOutcome, EngineError>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.execute_action(spec, &context).await })
    }

    /// Run one action to its terminal status
    ///
    /// Fails only when another action is still in flight; every execution
    /// problem is reported through the returned outcome instead.
    pub async fn execute_action(
        &self,
        spec: ActionSpec,
        context: &ProjectContext,
    ) -> Result<ActionOutcome, EngineError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            let running = self
                .current()
                .map(|a| a.action.display_name())
                .unwrap_or_else(|| "unknown action".to_string());
            warn!(action = %spec.action_type, running = %running, "action rejected");
            return Err(EngineError::ActionInFlight(running));
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        self.state.lock().logs.clear();
        info!(action = %spec.action_type, project = %context.project_type, "starting action");
        self.log(LogLevel::Info, format!("Starting {}", spec.display_name()));

        self.begin(&spec);
        self.log(LogLevel::Info, "Preparing environment");
        tokio::time::sleep(Duration::from_millis(self.settings.settle_delay_ms)).await;

        let result = match self.resolve(&spec, context) {
            Ok(Resolved::Shell(command)) => {
                let message = format!("Executing: {}", command.text());
                self.transition(ActionStatus::Executing, PROGRESS_EXECUTING, message.clone());
                self.log(LogLevel::Info, message);
                self.run(&spec, &command).await
            }
            Ok(Resolved::CreateFile { path, content }) => {
                let message = format!("Creating file: {}", path);
                self.transition(ActionStatus::Executing, PROGRESS_EXECUTING, message.clone());
                self.log(LogLevel::Info, message);
                match create_file(&context.root, &path, &content) {
                    Ok(written) => ExecutionResult::new(
                        Some(0),
                        format!("Created {}", written.display()),
                        Outcome::Success,
                        None,
                        None,
                    ),
                    Err(e) => ExecutionResult::launch_failure(e.to_string()),
                }
            }
            Err(e) => {
                let outcome = ActionOutcome {
                    action: spec,
                    result: ActionResult::Failure {
                        error: e.to_string(),
                    },
                };
                error!(error = %e, "action could not be resolved");
                self.transition(ActionStatus::Finishing, PROGRESS_FINISHING, "Processing results");
                self.log(LogLevel::Info, "Processing results");
                self.log(LogLevel::Error, e.to_string());
                self.transition(ActionStatus::Failed(e.to_string()), PROGRESS_FAILED, e.to_string());
                return Ok(self.finish(outcome, generation));
            }
        };

        self.transition(ActionStatus::Finishing, PROGRESS_FINISHING, "Processing results");
        self.log(LogLevel::Info, "Processing results");
        if !result.combined_output().is_empty() {
            let output = truncate_output(result.combined_output(), self.settings.debug_output_limit);
            self.log(LogLevel::Debug, format!("Output: {}", output));
        }

        let label = spec.action_type.label();
        let action_result = match result.outcome() {
            Outcome::Success => {
                self.log(LogLevel::Success, format!("{} completed successfully", capitalize(label)));
                self.transition(ActionStatus::Completed, PROGRESS_COMPLETED, "Completed");
                ActionResult::Success {
                    output: result.combined_output().to_string(),
                }
            }
            Outcome::HeuristicSuccess => {
                let warning = format!(
                    "Command exited with status {} but its output indicates success ({})",
                    result.exit_code().unwrap_or(-1),
                    result.matched_rule().unwrap_or("recognized marker")
                );
                self.log(LogLevel::Warning, warning.clone());
                self.transition(ActionStatus::Completed, PROGRESS_COMPLETED, "Completed with warnings");
                ActionResult::Partial {
                    output: result.combined_output().to_string(),
                    warning,
                }
            }
            Outcome::Timeout => {
                let message = format!(
                    "{} {}",
                    capitalize(label),
                    EngineError::Timeout(self.command_timeout.as_secs())
                        .to_string()
                        .to_lowercase()
                );
                self.log(LogLevel::Error, message.clone());
                let error = if result.combined_output().is_empty() {
                    message.clone()
                } else {
                    format!(
                        "{}\n{}",
                        message,
                        truncate_output(result.combined_output(), self.settings.debug_output_limit)
                    )
                };
                self.transition(ActionStatus::Failed(error.clone()), PROGRESS_FAILED, message);
                ActionResult::Failure { error }
            }
            Outcome::Failure => {
                let detail = result.error_message().unwrap_or("Command failed");
                let message = truncate_output(detail, self.settings.debug_output_limit);
                self.log(LogLevel::Error, format!("{} failed: {}", capitalize(label), message));
                self.transition(ActionStatus::Failed(message.clone()), PROGRESS_FAILED, "Failed");
                ActionResult::Failure { error: message }
            }
        };

        info!(action = %spec.action_type, outcome = result.outcome().as_str(), "action finished");
        Ok(self.finish(
            ActionOutcome {
                action: spec,
                result: action_result,
            },
            generation,
        ))
    }

    fn resolve(&self, spec: &ActionSpec, context: &ProjectContext) -> Result<Resolved, EngineError> {
        if spec.action_type == ActionType::CreateFile {
            let path = spec
                .param_text("path")
                .ok_or_else(|| EngineError::Template("missing parameter 'path' for create_file".to_string()))?;
            let content = spec.param_text("content").unwrap_or_default();
            return Ok(Resolved::CreateFile { path, content });
        }

        let text = self.templates.render(spec, context)?;
        Ok(Resolved::Shell(Command::with_timeout(text, self.command_timeout)))
    }

    async fn run(&self, spec: &ActionSpec, command: &Command) -> ExecutionResult {
        let interactive =
            spec.action_type == ActionType::InstallTool || spec.param_flag("interactive");
        if interactive {
            debug!(command = command.text(), "routing to interactive session");
            self.interactive.execute_interactive(command).await
        } else {
            self.executor.execute(command).await
        }
    }

    fn begin(&self, spec: &ActionSpec) {
        let action = ExecutingAction {
            action: spec.clone(),
            status: ActionStatus::Preparing,
            progress: PROGRESS_PREPARING,
            progress_message: "Preparing environment".to_string(),
            start_time: Local::now(),
        };
        let update = status_update(&action);
        self.state.lock().current = Some(action);
        let _ = self.events.send(SessionEvent::Status(update));
    }

    fn transition(&self, status: ActionStatus, progress: f32, message: impl Into<String>) {
        let update = {
            let mut state = self.state.lock();
            let Some(action) = state.current.as_mut() else {
                return;
            };
            action.status = status;
            action.progress = progress;
            action.progress_message = message.into();
            status_update(action)
        };
        debug!(status = ?update.status, progress = update.progress, "action status");
        let _ = self.events.send(SessionEvent::Status(update));
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        let entry = ActionLog::new(level, message);
        self.state.lock().logs.push(entry.clone());
        let _ = self.events.send(SessionEvent::Log(entry));
    }

    /// Publish the outcome and schedule the delayed clear of the finished action
    fn finish(&self, outcome: ActionOutcome, generation: u64) -> ActionOutcome {
        let _ = self.events.send(SessionEvent::Outcome(outcome.clone()));

        let state = self.state.clone();
        let current_generation = self.generation.clone();
        let events = self.events.clone();
        let delay = Duration::from_millis(self.settings.display_delay_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A newer action owns the slot now
            if current_generation.load(Ordering::Acquire) != generation {
                return;
            }
            let cleared = {
                let mut state = state.lock();
                match &state.current {
                    Some(action) if action.status.is_terminal() => {
                        state.current = None;
                        true
                    }
                    _ => false,
                }
            };
            if cleared {
                let _ = events.send(SessionEvent::Cleared);
            }
        });

        outcome
    }
}

enum Resolved {
    Shell(Command),
    CreateFile { path: String, content: String },
}

fn status_update(action: &ExecutingAction) -> StatusUpdate {
    StatusUpdate {
        action_type: action.action.action_type,
        status: action.status.clone(),
        progress: action.progress,
        message: action.progress_message.clone(),
    }
}

fn truncate_output(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ProjectType;
    use crate::exec::ResultClassifier;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct ScriptedExecutor {
        result: ExecutionResult,
        delay: Duration,
        commands: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn new(result: ExecutionResult) -> Arc<Self> {
            Self::slow(result, Duration::ZERO)
        }

        fn slow(result: ExecutionResult, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                result,
                delay,
                commands: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, command: &Command) -> ExecutionResult {
            self.commands.lock().push(command.raw_text().to_string());
            tokio::time::sleep(self.delay).await;
            self.result.clone()
        }
    }

    #[async_trait]
    impl InteractiveExecutor for ScriptedExecutor {
        async fn execute_interactive(&self, command: &Command) -> ExecutionResult {
            self.execute(command).await
        }
    }

    fn settings(display_delay_ms: u64) -> OrchestratorConfig {
        OrchestratorConfig {
            settle_delay_ms: 1,
            display_delay_ms,
            log_capacity: 50,
            debug_output_limit: 20,
        }
    }

    fn orchestrator(executor: Arc<ScriptedExecutor>) -> ActionOrchestrator {
        ActionOrchestrator::new(
            executor.clone(),
            executor,
            TemplateTable::builtin(),
            settings(10_000),
        )
    }

    fn rust_project() -> ProjectContext {
        ProjectContext::new("/work/shop", ProjectType::Rust)
    }

    fn classified(code: i32, output: &str) -> ExecutionResult {
        ResultClassifier::default().classify(Some(code), output.to_string(), None)
    }

    #[tokio::test]
    async fn test_successful_build_log_order() {
        let executor = ScriptedExecutor::new(classified(0, "Finished dev profile"));
        let orchestrator = orchestrator(executor.clone());

        let outcome = orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();

        assert_eq!(
            outcome.result,
            ActionResult::Success {
                output: "Finished dev profile".to_string()
            }
        );
        assert_eq!(
            *executor.commands.lock(),
            vec!["cd \"/work/shop\" && cargo build".to_string()]
        );

        let messages: Vec<_> = orchestrator
            .logs()
            .into_iter()
            .map(|l| (l.level, l.message))
            .collect();
        assert_eq!(
            messages,
            vec![
                (LogLevel::Info, "Starting build".to_string()),
                (LogLevel::Info, "Preparing environment".to_string()),
                (LogLevel::Info, "Executing: cargo build".to_string()),
                (LogLevel::Info, "Processing results".to_string()),
                (LogLevel::Debug, "Output: Finished dev profile".to_string()),
                (LogLevel::Success, "Build completed successfully".to_string()),
            ]
        );

        let current = orchestrator.current().unwrap();
        assert_eq!(current.status, ActionStatus::Completed);
        assert_eq!(current.progress, PROGRESS_COMPLETED);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_status_events_in_order() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = orchestrator(executor);
        let mut events = orchestrator.subscribe();

        orchestrator
            .execute_action(ActionSpec::new(ActionType::Test), &rust_project())
            .await
            .unwrap();

        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Status(update) = event {
                phases.push((update.status, update.progress));
            }
        }
        assert_eq!(
            phases,
            vec![
                (ActionStatus::Preparing, PROGRESS_PREPARING),
                (ActionStatus::Executing, PROGRESS_EXECUTING),
                (ActionStatus::Finishing, PROGRESS_FINISHING),
                (ActionStatus::Completed, PROGRESS_COMPLETED),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_action_rejected() {
        let executor = ScriptedExecutor::slow(classified(0, ""), Duration::from_millis(300));
        let orchestrator = orchestrator(executor.clone());

        let first = orchestrator.spawn_action(ActionSpec::new(ActionType::Build), rust_project());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orchestrator.is_busy());

        let second = orchestrator
            .execute_action(ActionSpec::new(ActionType::Test), &rust_project())
            .await;
        assert!(matches!(second, Err(EngineError::ActionInFlight(ref name)) if name == "build"));

        let outcome = first.await.unwrap().unwrap();
        assert!(!outcome.result.is_failure());
        assert_eq!(executor.commands.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_reports_timeout_message() {
        let executor = ScriptedExecutor::new(ResultClassifier::default().timed_out(String::new(), 2));
        let orchestrator = orchestrator(executor).with_command_timeout(Duration::from_secs(2));

        let outcome = orchestrator
            .execute_action(ActionSpec::new(ActionType::Test), &rust_project())
            .await
            .unwrap();

        match outcome.result {
            ActionResult::Failure { error } => {
                assert_eq!(error, "Tests command timed out after 2 seconds")
            }
            other => panic!("Expected failure, got {:?}", other),
        }
        assert!(matches!(
            orchestrator.current().unwrap().status,
            ActionStatus::Failed(ref m) if m.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_timeout_failure_keeps_partial_output() {
        let partial = "Compiling serde v1.0.200\nCompiling tokio v1.42.0";
        let executor = ScriptedExecutor::new(
            ResultClassifier::default().timed_out(partial.to_string(), 2),
        );
        let orchestrator = orchestrator(executor).with_command_timeout(Duration::from_secs(2));

        let outcome = orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();

        match outcome.result {
            ActionResult::Failure { error } => assert_eq!(
                error,
                "Build command timed out after 2 seconds\nCompiling serde v1.0... (truncated)"
            ),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert!(matches!(
            orchestrator.current().unwrap().status,
            ActionStatus::Failed(ref m) if m.ends_with("(truncated)")
        ));
    }

    #[tokio::test]
    async fn test_heuristic_success_is_partial() {
        let executor = ScriptedExecutor::new(classified(1, "[INFO] Generating project from Archetype"));
        let orchestrator = orchestrator(executor);
        let context = ProjectContext::new("/work/shop", ProjectType::Maven);
        let spec = ActionSpec::new(ActionType::GenerateModule)
            .with_param("name", "billing")
            .with_param("group", "com.example");

        let outcome = orchestrator.execute_action(spec, &context).await.unwrap();

        match outcome.result {
            ActionResult::Partial { warning, .. } => assert!(warning.contains("archetype")),
            other => panic!("Expected partial, got {:?}", other),
        }
        assert_eq!(orchestrator.current().unwrap().status, ActionStatus::Completed);
        assert!(orchestrator.logs().iter().any(|l| l.level == LogLevel::Warning));
    }

    #[tokio::test]
    async fn test_failure_carries_truncated_output() {
        let output = "error[E0425]: cannot find value `x` in this scope";
        let executor = ScriptedExecutor::new(classified(101, output));
        let orchestrator = orchestrator(executor);

        let outcome = orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();

        match outcome.result {
            ActionResult::Failure { error } => {
                assert_eq!(error, "error[E0425]: cannot... (truncated)")
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_parameter_fails_before_executing() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = orchestrator(executor.clone());

        let outcome = orchestrator
            .execute_action(ActionSpec::new(ActionType::GitCommit), &rust_project())
            .await
            .unwrap();

        assert!(outcome.result.is_failure());
        assert!(executor.commands.lock().is_empty());
        let levels: Vec<_> = orchestrator.logs().iter().map(|l| l.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Info, LogLevel::Info, LogLevel::Info, LogLevel::Error]
        );
        assert_eq!(orchestrator.logs()[2].message, "Processing results");
        assert!(matches!(
            orchestrator.current().unwrap().status,
            ActionStatus::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_unresolvable_action_still_passes_through_finishing() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = orchestrator(executor);
        let mut events = orchestrator.subscribe();

        orchestrator
            .execute_action(ActionSpec::new(ActionType::CreateFile), &rust_project())
            .await
            .unwrap();

        let mut phases = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::Status(update) = event {
                phases.push(update.status);
            }
        }
        assert_eq!(phases.len(), 3);
        assert_eq!(phases[0], ActionStatus::Preparing);
        assert_eq!(phases[1], ActionStatus::Finishing);
        assert!(matches!(phases[2], ActionStatus::Failed(ref m) if m.contains("'path'")));
    }

    #[tokio::test]
    async fn test_create_file_runs_natively() {
        let temp_dir = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(classified(1, ""));
        let orchestrator = orchestrator(executor.clone());
        let context = ProjectContext::new(temp_dir.path(), ProjectType::Generic);
        let spec = ActionSpec::new(ActionType::CreateFile)
            .with_param("path", "src/main.rs")
            .with_param("content", "fn main() {}");

        let outcome = orchestrator.execute_action(spec, &context).await.unwrap();

        assert!(matches!(outcome.result, ActionResult::Success { .. }));
        assert!(executor.commands.lock().is_empty());
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("src/main.rs")).unwrap(),
            "fn main() {}"
        );
    }

    #[tokio::test]
    async fn test_log_buffer_is_bounded_and_cleared_per_action() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = orchestrator(executor);

        for i in 0..60 {
            orchestrator.log(LogLevel::Debug, format!("noise {}", i));
        }
        assert_eq!(orchestrator.logs().len(), 50);
        assert_eq!(orchestrator.logs()[0].message, "noise 10");

        orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();
        assert_eq!(orchestrator.logs()[0].message, "Starting build");
    }

    #[tokio::test]
    async fn test_finished_action_clears_after_display_delay() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = ActionOrchestrator::new(
            executor.clone(),
            executor,
            TemplateTable::builtin(),
            settings(30),
        );
        let mut events = orchestrator.subscribe();

        orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();
        assert!(orchestrator.current().is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(orchestrator.current().is_none());

        let mut saw_cleared = false;
        while let Ok(event) = events.try_recv() {
            saw_cleared |= matches!(event, SessionEvent::Cleared);
        }
        assert!(saw_cleared);
    }

    #[tokio::test]
    async fn test_stale_clear_leaves_newer_action() {
        let executor = ScriptedExecutor::new(classified(0, ""));
        let orchestrator = ActionOrchestrator::new(
            executor.clone(),
            executor,
            TemplateTable::builtin(),
            settings(80),
        );

        orchestrator
            .execute_action(ActionSpec::new(ActionType::Build), &rust_project())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        orchestrator
            .execute_action(ActionSpec::new(ActionType::Test), &rust_project())
            .await
            .unwrap();

        // First clear fires here but belongs to an older generation
        tokio::time::sleep(Duration::from_millis(45)).await;
        let current = orchestrator.current().unwrap();
        assert_eq!(current.action.action_type, ActionType::Test);
    }

    #[tokio::test]
    async fn test_install_tool_routes_to_interactive() {
        let headless = ScriptedExecutor::new(classified(0, ""));
        let interactive = ScriptedExecutor::new(classified(0, "installed"));
        let orchestrator = ActionOrchestrator::new(
            headless.clone(),
            interactive.clone(),
            TemplateTable::builtin(),
            settings(10_000),
        );
        let spec = ActionSpec::new(ActionType::InstallTool).with_param("tool", "wget");

        orchestrator.execute_action(spec, &rust_project()).await.unwrap();

        assert!(headless.commands.lock().is_empty());
        assert_eq!(
            *interactive.commands.lock(),
            vec!["cd \"/work/shop\" && brew install wget".to_string()]
        );
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short", 10), "short");
        assert_eq!(truncate_output("ééééé", 2), "éé... (truncated)");
    }
}
