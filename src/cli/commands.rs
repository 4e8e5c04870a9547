use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    actions::{
        ActionLog, ActionOrchestrator, ActionOutcome, ActionResult, ActionSpec, ActionType,
        LogLevel, ProjectContext, ProjectType, SessionEvent, TemplateTable,
    },
    app::{init_config, Config},
    deps::{Dependency, DependencyChecker, DependencyStatus},
    exec::{
        default_interactive_executor, Command, CommandExecutor, ExecutionResult,
        InteractiveExecutor, ProcessExecutor, ResultClassifier,
    },
    utils::log_progress,
};

use super::{Cli, Commands, OutputFormat};

/// Executors and templates assembled from one configuration
struct Engine {
    executor: Arc<dyn CommandExecutor>,
    interactive: Arc<dyn InteractiveExecutor>,
    config: Config,
}

impl Engine {
    fn new(config: Config) -> Self {
        let classifier = ResultClassifier::new(config.heuristics.rules.clone());
        let executor = Arc::new(ProcessExecutor::new(&config.executor, classifier));
        let interactive = default_interactive_executor(&config.interactive);
        Self {
            executor,
            interactive,
            config,
        }
    }

    fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.executor.timeout_secs)
    }

    fn orchestrator(&self) -> ActionOrchestrator {
        ActionOrchestrator::new(
            self.executor.clone(),
            self.interactive.clone(),
            TemplateTable::with_overrides(&self.config.templates),
            self.config.orchestrator.clone(),
        )
        .with_command_timeout(self.command_timeout())
    }

    fn checker(&self) -> DependencyChecker {
        DependencyChecker::new(self.executor.clone(), self.command_timeout())
    }
}

/// Handle a CLI subcommand; `Ok(false)` means the requested work failed
pub async fn handle_command(cli: &Cli, config: Config) -> Result<bool> {
    let format = cli.output_format;
    match &cli.command {
        Commands::Run {
            action,
            path,
            project_type,
            params,
            interactive,
        } => {
            let spec = build_spec(action, params, *interactive)?;
            let context = build_context(path.clone(), project_type.as_deref())?;
            run_action(Engine::new(config), spec, context, format).await
        }
        Commands::Exec { command, timeout } => {
            let engine = Engine::new(config);
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| engine.command_timeout());
            let result = engine
                .executor
                .execute(&Command::with_timeout(command.clone(), timeout))
                .await;
            print_execution(&result, format)?;
            Ok(result.outcome().is_success())
        }
        Commands::Check => check_dependencies(Engine::new(config), format).await,
        Commands::Install => install_dependencies(Engine::new(config), format).await,
        Commands::Templates => {
            list_templates(&TemplateTable::with_overrides(&config.templates), format)?;
            Ok(true)
        }
        Commands::Init => {
            println!("Initializing Kestrel configuration...");
            init_config()?;
            println!("Configuration initialized successfully!");
            Ok(true)
        }
    }
}

fn build_spec(action: &str, params: &[String], interactive: bool) -> Result<ActionSpec> {
    let Some(action_type) = ActionType::parse(action) else {
        let known: Vec<&str> = ActionType::ALL.iter().map(|a| a.as_str()).collect();
        bail!("Unknown action '{}'. Known actions: {}", action, known.join(", "));
    };

    let mut spec = ActionSpec::new(action_type);
    for param in params {
        let (key, value) = param
            .split_once('=')
            .with_context(|| format!("Parameter '{}' must be KEY=VALUE", param))?;
        spec = spec.with_param(key.trim(), value);
    }
    if interactive {
        spec = spec.with_param("interactive", true);
    }
    Ok(spec)
}

fn build_context(path: Option<PathBuf>, project_type: Option<&str>) -> Result<ProjectContext> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir().context("Could not determine current directory")?,
    };
    let root = root
        .canonicalize()
        .with_context(|| format!("Project directory not found: {}", root.display()))?;

    match project_type {
        Some(name) => {
            let Some(project_type) = ProjectType::parse(name) else {
                let known: Vec<&str> = ProjectType::ALL.iter().map(|p| p.as_str()).collect();
                bail!("Unknown project type '{}'. Known types: {}", name, known.join(", "));
            };
            Ok(ProjectContext::new(root, project_type))
        }
        None => Ok(ProjectContext::detect(root)),
    }
}

async fn run_action(
    engine: Engine,
    spec: ActionSpec,
    context: ProjectContext,
    format: OutputFormat,
) -> Result<bool> {
    let orchestrator = engine.orchestrator();

    // Stream log lines while the action runs
    let printer = (format == OutputFormat::Text).then(|| {
        let mut events = orchestrator.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Log(entry)) => print_log(&entry),
                    Ok(SessionEvent::Outcome(_)) | Err(RecvError::Closed) => break,
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                }
            }
        })
    });

    let outcome = orchestrator.execute_action(spec, &context).await?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match format {
        OutputFormat::Json => {
            let report = json!({
                "project": context,
                "outcome": outcome,
                "logs": orchestrator.logs(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_outcome(&outcome),
    }

    Ok(!outcome.result.is_failure())
}

fn print_log(entry: &ActionLog) {
    let time = entry.timestamp.format("%H:%M:%S");
    let line = match entry.level {
        LogLevel::Info => entry.message.normal(),
        LogLevel::Warning => entry.message.yellow(),
        LogLevel::Error => entry.message.red(),
        LogLevel::Success => entry.message.green(),
        LogLevel::Debug => entry.message.dimmed(),
    };
    println!("{} [{}] {}", time.to_string().dimmed(), entry.level.as_str(), line);
}

fn print_outcome(outcome: &ActionOutcome) {
    println!();
    match &outcome.result {
        ActionResult::Success { output } => {
            println!("[{}] {}", "OK".green(), outcome.action.display_name());
            print_output(output);
        }
        ActionResult::Partial { output, warning } => {
            println!("[{}] {}", "WARN".yellow(), outcome.action.display_name());
            println!("  {}", warning);
            print_output(output);
        }
        ActionResult::Failure { error } => {
            println!("[{}] {}", "FAIL".red(), outcome.action.display_name());
            println!("  {}", error);
        }
    }
}

fn print_output(output: &str) {
    for line in output.lines() {
        println!("  {}", line);
    }
}

fn print_execution(result: &ExecutionResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            print!("{}", result.combined_output());
            let status = match result.exit_code() {
                Some(code) => format!("{} (exit {})", result.outcome().as_str(), code),
                None => result.outcome().as_str().to_string(),
            };
            if result.outcome().is_success() {
                eprintln!("{}", status.green());
            } else {
                eprintln!("{}", status.red());
                if let Some(message) = result.error_message() {
                    eprintln!("  {}", message);
                }
            }
        }
    }
    Ok(())
}

fn dependency_report(status: &DependencyStatus, dependencies: &[Dependency]) -> serde_json::Value {
    let checked: Vec<_> = dependencies
        .iter()
        .map(|d| json!({ "name": d.name, "installed": d.is_installed() }))
        .collect();
    json!({ "status": status, "summary": status.describe(), "dependencies": checked })
}

fn print_dependencies(status: &DependencyStatus, dependencies: &[Dependency]) {
    println!("Kestrel Dependencies:");
    println!();
    for dependency in dependencies {
        if dependency.is_installed() {
            println!("  [{}] {}", "OK".green(), dependency.name);
        } else {
            println!("  [{}] {}", "MISSING".red(), dependency.name);
            println!("      install: {}", dependency.install_command.dimmed());
        }
    }
    println!();
    println!("  {}", status.describe());
}

async fn check_dependencies(engine: Engine, format: OutputFormat) -> Result<bool> {
    let mut checker = engine.checker();
    let status = checker
        .sweep(&engine.config.dependencies, &engine.config.updates)
        .await;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&dependency_report(&status, checker.checked()))?
        ),
        OutputFormat::Text => print_dependencies(&status, checker.checked()),
    }

    Ok(matches!(
        status,
        DependencyStatus::AllInstalled | DependencyStatus::VersionUpdateRequired(_)
    ))
}

async fn install_dependencies(engine: Engine, format: OutputFormat) -> Result<bool> {
    if !engine.interactive.is_supported() {
        bail!("Interactive terminal sessions are not supported on this platform");
    }

    let mut checker = engine.checker();
    log_progress(1, 3, "Checking dependencies");
    let status = checker.check_all(&engine.config.dependencies).await;

    let final_status = match status {
        DependencyStatus::Missing(missing) => {
            log_progress(2, 3, format!("Installing {} dependencies", missing.len()));
            let installed = checker
                .install_missing(&missing, engine.interactive.as_ref())
                .await;
            if matches!(installed, DependencyStatus::Error(_)) {
                installed
            } else {
                log_progress(3, 3, "Verifying installation");
                checker.check_all(&engine.config.dependencies).await
            }
        }
        other => other,
    };

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&dependency_report(&final_status, checker.checked()))?
        ),
        OutputFormat::Text => print_dependencies(&final_status, checker.checked()),
    }

    Ok(final_status == DependencyStatus::AllInstalled)
}

fn list_templates(table: &TemplateTable, format: OutputFormat) -> Result<()> {
    let entries = table.entries();
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|(action, project, template)| {
                    json!({ "action": action, "project": project, "template": template })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            for (action, project, template) in entries {
                println!(
                    "{:<20} {:<8} {}",
                    action.as_str().cyan(),
                    project.as_str(),
                    template
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_build_spec_params() {
        let spec = build_spec(
            "git-commit",
            &["message=fix: a=b".to_string()],
            true,
        )
        .unwrap();

        assert_eq!(spec.action_type, ActionType::GitCommit);
        assert_eq!(spec.param_text("message").as_deref(), Some("fix: a=b"));
        assert!(spec.param_flag("interactive"));
    }

    #[test]
    fn test_build_spec_rejects_bad_input() {
        assert!(build_spec("deploy", &[], false).is_err());
        assert!(build_spec("build", &["novalue".to_string()], false).is_err());
    }

    #[test]
    fn test_build_context_detects_type() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("go.mod"), "module x").unwrap();

        let context = build_context(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(context.project_type, ProjectType::Go);

        let context = build_context(Some(temp_dir.path().to_path_buf()), Some("rust")).unwrap();
        assert_eq!(context.project_type, ProjectType::Rust);

        assert!(build_context(Some(temp_dir.path().to_path_buf()), Some("cobol")).is_err());
        assert!(build_context(Some(temp_dir.path().join("missing")), None).is_err());
    }

    #[test]
    fn test_dependency_report_shape() {
        let deps = vec![Dependency::new("git", "true", "true").checked(true)];
        let report = dependency_report(&DependencyStatus::AllInstalled, &deps);

        assert_eq!(report["status"]["status"], "all_installed");
        assert_eq!(report["dependencies"][0]["installed"], true);
    }
}
