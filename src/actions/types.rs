use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::log::ActionLog;

/// A developer-tool operation that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Build,
    Test,
    AnalyzeCode,
    GenerateModule,
    UpdateDependencies,
    CreateFile,
    GitCommit,
    InstallTool,
    RunCommand,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        ActionType::Build,
        ActionType::Test,
        ActionType::AnalyzeCode,
        ActionType::GenerateModule,
        ActionType::UpdateDependencies,
        ActionType::CreateFile,
        ActionType::GitCommit,
        ActionType::InstallTool,
        ActionType::RunCommand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Build => "build",
            ActionType::Test => "test",
            ActionType::AnalyzeCode => "analyze_code",
            ActionType::GenerateModule => "generate_module",
            ActionType::UpdateDependencies => "update_dependencies",
            ActionType::CreateFile => "create_file",
            ActionType::GitCommit => "git_commit",
            ActionType::InstallTool => "install_tool",
            ActionType::RunCommand => "run_command",
        }
    }

    /// Human-readable label used in log messages
    pub fn label(self) -> &'static str {
        match self {
            ActionType::Build => "build",
            ActionType::Test => "tests",
            ActionType::AnalyzeCode => "code analysis",
            ActionType::GenerateModule => "module generation",
            ActionType::UpdateDependencies => "dependency update",
            ActionType::CreateFile => "file creation",
            ActionType::GitCommit => "git commit",
            ActionType::InstallTool => "tool installation",
            ActionType::RunCommand => "command",
        }
    }

    /// Parse the snake_case name, also accepting dashes
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build system family of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Rust,
    Node,
    Python,
    Go,
    Maven,
    Gradle,
    Swift,
    Generic,
}

impl ProjectType {
    pub const ALL: [ProjectType; 8] = [
        ProjectType::Rust,
        ProjectType::Node,
        ProjectType::Python,
        ProjectType::Go,
        ProjectType::Maven,
        ProjectType::Gradle,
        ProjectType::Swift,
        ProjectType::Generic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::Rust => "rust",
            ProjectType::Node => "node",
            ProjectType::Python => "python",
            ProjectType::Go => "go",
            ProjectType::Maven => "maven",
            ProjectType::Gradle => "gradle",
            ProjectType::Swift => "swift",
            ProjectType::Generic => "generic",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    /// Detect the project type from marker files in `root`
    pub fn detect(root: &Path) -> Self {
        let checks = [
            ("Cargo.toml", ProjectType::Rust),
            ("package.json", ProjectType::Node),
            ("pyproject.toml", ProjectType::Python),
            ("requirements.txt", ProjectType::Python),
            ("setup.py", ProjectType::Python),
            ("go.mod", ProjectType::Go),
            ("pom.xml", ProjectType::Maven),
            ("build.gradle", ProjectType::Gradle),
            ("build.gradle.kts", ProjectType::Gradle),
            ("Package.swift", ProjectType::Swift),
        ];

        checks
            .iter()
            .find(|(file, _)| root.join(file).exists())
            .map(|(_, project_type)| *project_type)
            .unwrap_or(ProjectType::Generic)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The project an action runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub project_type: ProjectType,
    pub name: String,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>, project_type: ProjectType) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Self {
            root,
            project_type,
            name,
        }
    }

    /// Context for `root` with its project type detected from marker files
    pub fn detect(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let project_type = ProjectType::detect(&root);
        Self::new(root, project_type)
    }
}

/// A requested action; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub action_type: ActionType,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub description: String,
}

impl ActionSpec {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            parameters: HashMap::new(),
            description: String::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parameter rendered as plain text; strings are unquoted
    pub fn param_text(&self, key: &str) -> Option<String> {
        match self.parameters.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn param_flag(&self, key: &str) -> bool {
        match self.parameters.get(key) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => matches!(s.as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    /// Text used for "Starting ..." log lines
    pub fn display_name(&self) -> String {
        if self.description.is_empty() {
            self.action_type.label().to_string()
        } else {
            self.description.clone()
        }
    }
}

/// Phase of the single in-flight action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "message", rename_all = "snake_case")]
pub enum ActionStatus {
    Preparing,
    Executing,
    Finishing,
    Completed,
    Failed(String),
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Failed(_))
    }
}

/// The live record of an in-flight action
#[derive(Debug, Clone, Serialize)]
pub struct ExecutingAction {
    pub action: ActionSpec,
    pub status: ActionStatus,
    pub progress: f32,
    pub progress_message: String,
    pub start_time: DateTime<Local>,
}

/// How an action ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionResult {
    Success { output: String },
    Failure { error: String },
    Partial { output: String, warning: String },
}

impl ActionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionResult::Failure { .. })
    }
}

/// Final product of one action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub action: ActionSpec,
    pub result: ActionResult,
}

/// Snapshot published on every status transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusUpdate {
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub progress: f32,
    pub message: String,
}

/// Everything an orchestration session tells its presentation layer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Log(ActionLog),
    Status(StatusUpdate),
    Outcome(ActionOutcome),
    /// The finished action was cleared after its display delay
    Cleared,
}
