use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{ActionSpec, ActionType, ProjectContext, ProjectType};
use crate::utils::EngineError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// A configured template replacing or adding one table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOverride {
    pub action: ActionType,
    pub project: ProjectType,
    pub template: String,
}

/// Built-in templates as `(action, project, command)`; `Generic` rows apply to
/// every project type without a specific row.
const BUILTIN_TEMPLATES: &[(ActionType, ProjectType, &str)] = &[
    (ActionType::Build, ProjectType::Rust, "cargo build"),
    (ActionType::Build, ProjectType::Node, "npm run build"),
    (ActionType::Build, ProjectType::Python, "python3 -m compileall -q ."),
    (ActionType::Build, ProjectType::Go, "go build ./..."),
    (ActionType::Build, ProjectType::Maven, "mvn -B package -DskipTests"),
    (ActionType::Build, ProjectType::Gradle, "gradle build -x test"),
    (ActionType::Build, ProjectType::Swift, "swift build"),
    (ActionType::Build, ProjectType::Generic, "make"),
    (ActionType::Test, ProjectType::Rust, "cargo test"),
    (ActionType::Test, ProjectType::Node, "npm test"),
    (ActionType::Test, ProjectType::Python, "python3 -m pytest"),
    (ActionType::Test, ProjectType::Go, "go test ./..."),
    (ActionType::Test, ProjectType::Maven, "mvn -B test"),
    (ActionType::Test, ProjectType::Gradle, "gradle test"),
    (ActionType::Test, ProjectType::Swift, "swift test"),
    (ActionType::Test, ProjectType::Generic, "make test"),
    (ActionType::AnalyzeCode, ProjectType::Rust, "cargo clippy --all-targets"),
    (ActionType::AnalyzeCode, ProjectType::Node, "npx eslint ."),
    (ActionType::AnalyzeCode, ProjectType::Python, "python3 -m pyflakes ."),
    (ActionType::AnalyzeCode, ProjectType::Go, "go vet ./..."),
    (ActionType::AnalyzeCode, ProjectType::Maven, "mvn -B verify -DskipTests"),
    (ActionType::AnalyzeCode, ProjectType::Gradle, "gradle check -x test"),
    (ActionType::GenerateModule, ProjectType::Rust, "cargo new --lib \"{name}\""),
    (
        ActionType::GenerateModule,
        ProjectType::Node,
        "mkdir -p \"{name}\" && cd \"{name}\" && npm init -y",
    ),
    (
        ActionType::GenerateModule,
        ProjectType::Python,
        "mkdir -p \"{name}\" && touch \"{name}/__init__.py\"",
    ),
    (
        ActionType::GenerateModule,
        ProjectType::Go,
        "mkdir -p \"{name}\" && cd \"{name}\" && go mod init \"{name}\"",
    ),
    (
        ActionType::GenerateModule,
        ProjectType::Maven,
        "mvn -B archetype:generate -DgroupId={group} -DartifactId={name} -DarchetypeArtifactId=maven-archetype-quickstart -DinteractiveMode=false",
    ),
    (
        ActionType::GenerateModule,
        ProjectType::Swift,
        "swift package init --type library --name \"{name}\"",
    ),
    (ActionType::UpdateDependencies, ProjectType::Rust, "cargo update"),
    (ActionType::UpdateDependencies, ProjectType::Node, "npm update"),
    (
        ActionType::UpdateDependencies,
        ProjectType::Python,
        "python3 -m pip install --upgrade -r requirements.txt",
    ),
    (ActionType::UpdateDependencies, ProjectType::Go, "go get -u ./... && go mod tidy"),
    (
        ActionType::UpdateDependencies,
        ProjectType::Maven,
        "mvn -B versions:use-latest-releases",
    ),
    (
        ActionType::UpdateDependencies,
        ProjectType::Gradle,
        "gradle dependencies --refresh-dependencies",
    ),
    (ActionType::UpdateDependencies, ProjectType::Swift, "swift package update"),
    (ActionType::GitCommit, ProjectType::Generic, "git add -A && git commit -m \"{message}\""),
    (ActionType::InstallTool, ProjectType::Generic, "brew install {tool}"),
    (ActionType::RunCommand, ProjectType::Generic, "{command}"),
];

/// Maps `(ActionType, ProjectType)` to a shell command template
#[derive(Debug, Clone)]
pub struct TemplateTable {
    templates: HashMap<(ActionType, ProjectType), String>,
}

impl TemplateTable {
    /// Table holding only the built-in templates
    pub fn builtin() -> Self {
        let templates = BUILTIN_TEMPLATES
            .iter()
            .map(|(action, project, command)| {
                ((*action, *project), format!("cd \"{{root}}\" && {}", command))
            })
            .collect();
        Self { templates }
    }

    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Built-in table with configured overrides applied on top
    pub fn with_overrides(overrides: &[TemplateOverride]) -> Self {
        let mut table = Self::builtin();
        for entry in overrides {
            table.insert(entry.action, entry.project, entry.template.clone());
        }
        table
    }

    pub fn insert(&mut self, action: ActionType, project: ProjectType, template: impl Into<String>) {
        self.templates.insert((action, project), template.into());
    }

    /// Template for the pair, falling back to the generic row
    pub fn lookup(&self, action: ActionType, project: ProjectType) -> Option<&str> {
        self.templates
            .get(&(action, project))
            .or_else(|| self.templates.get(&(action, ProjectType::Generic)))
            .map(String::as_str)
    }

    /// All entries ordered by action then project
    pub fn entries(&self) -> Vec<(ActionType, ProjectType, &str)> {
        let mut entries: Vec<_> = self
            .templates
            .iter()
            .map(|((action, project), template)| (*action, *project, template.as_str()))
            .collect();
        entries.sort_by_key(|(action, project, _)| (action.as_str(), project.as_str()));
        entries
    }

    /// Resolve `spec` to a concrete command string for `context`
    ///
    /// Parameter values are substituted verbatim.
    pub fn render(&self, spec: &ActionSpec, context: &ProjectContext) -> Result<String, EngineError> {
        let template = self
            .lookup(spec.action_type, context.project_type)
            .ok_or_else(|| {
                EngineError::Template(format!(
                    "no {} template for {} projects",
                    spec.action_type, context.project_type
                ))
            })?;

        let value_of = |name: &str| -> Option<String> {
            match name {
                "root" => Some(context.root.display().to_string()),
                "project" => Some(context.name.clone()),
                _ => spec.param_text(name),
            }
        };

        if let Some(missing) = PLACEHOLDER
            .captures_iter(template)
            .map(|caps| caps[1].to_string())
            .find(|name| value_of(name).is_none())
        {
            return Err(EngineError::Template(format!(
                "missing parameter '{}' for {}",
                missing, spec.action_type
            )));
        }

        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            value_of(&caps[1]).unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self::builtin()
    }
}
