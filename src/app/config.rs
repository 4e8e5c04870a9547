use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::actions::TemplateOverride;
use crate::constants::{
    ACTION_LOG_CAPACITY, COMMAND_TIMEOUT_SECS, DEBUG_OUTPUT_LIMIT, DEFAULT_CONNECTIVITY_URL,
    DEFAULT_PACKAGE_MANAGER, DEFAULT_PACKAGE_PREFIX, DEFAULT_PREFIX_VAR, DEFAULT_SHELL,
    DEFAULT_TERMINAL_HOST, DISPLAY_DELAY_MS, INTERACTIVE_POLL_INTERVAL_MS, PROFILE_FILES,
    SETTLE_DELAY_MS, TERMINATE_GRACE_MS,
};
use crate::deps::Dependency;
use crate::exec::{default_rules, HeuristicRule};
use crate::utils::EngineError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Process execution settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Interactive terminal session settings
    #[serde(default)]
    pub interactive: InteractiveConfig,

    /// Action state machine settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Success-override rules for nonzero exits
    #[serde(default)]
    pub heuristics: HeuristicsConfig,

    /// Overrides merged over the built-in command templates
    #[serde(default)]
    pub templates: Vec<TemplateOverride>,

    /// External tools checked at startup
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<Dependency>,

    /// Connectivity and version probes
    #[serde(default)]
    pub updates: UpdatesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            interactive: InteractiveConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            heuristics: HeuristicsConfig::default(),
            templates: Vec::new(),
            dependencies: default_dependencies(),
            updates: UpdatesConfig::default(),
        }
    }
}

/// Process execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Hard timeout ceiling in seconds
    pub timeout_secs: u64,
    /// Shell used to wrap commands
    pub shell: String,
    /// Source the user's profile files before each command
    pub source_profiles: bool,
    /// Profile files relative to $HOME
    pub profile_files: Vec<String>,
    /// Directories prepended to PATH after the package prefix
    pub extra_path_dirs: Vec<PathBuf>,
    /// Package manager asked for its prefix
    pub package_manager: String,
    /// Variable carrying the package manager prefix
    pub package_manager_prefix_var: String,
    /// Prefix used when the package manager cannot be asked
    pub default_prefix: PathBuf,
    /// Time between SIGTERM and SIGKILL on timeout
    pub terminate_grace_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: COMMAND_TIMEOUT_SECS,
            shell: DEFAULT_SHELL.to_string(),
            source_profiles: true,
            profile_files: PROFILE_FILES.iter().map(|f| f.to_string()).collect(),
            extra_path_dirs: Vec::new(),
            package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
            package_manager_prefix_var: DEFAULT_PREFIX_VAR.to_string(),
            default_prefix: PathBuf::from(DEFAULT_PACKAGE_PREFIX),
            terminate_grace_ms: TERMINATE_GRACE_MS,
        }
    }
}

/// Interactive terminal session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractiveConfig {
    /// How often the session is polled for idleness
    pub poll_interval_ms: u64,
    /// Terminal application driven through the scripting bridge
    pub host_application: String,
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: INTERACTIVE_POLL_INTERVAL_MS,
            host_application: DEFAULT_TERMINAL_HOST.to_string(),
        }
    }
}

/// Action state machine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Pause between Preparing and Executing
    pub settle_delay_ms: u64,
    /// How long a finished action stays visible before clearing
    pub display_delay_ms: u64,
    /// Maximum retained log entries
    pub log_capacity: usize,
    /// Characters of process output copied into debug logs
    pub debug_output_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: SETTLE_DELAY_MS,
            display_delay_ms: DISPLAY_DELAY_MS,
            log_capacity: ACTION_LOG_CAPACITY,
            debug_output_limit: DEBUG_OUTPUT_LIMIT,
        }
    }
}

/// Success-override rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicsConfig {
    pub rules: Vec<HeuristicRule>,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

/// Connectivity and version probes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatesConfig {
    /// URL probed to decide whether the network is reachable
    pub connectivity_url: Option<String>,
    /// URL returning the latest published version as plain text
    pub version_url: Option<String>,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            connectivity_url: Some(DEFAULT_CONNECTIVITY_URL.to_string()),
            version_url: None,
        }
    }
}

impl Config {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.executor.timeout_secs == 0 {
            return Err(EngineError::Config(
                "executor.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.interactive.poll_interval_ms == 0 {
            return Err(EngineError::Config(
                "interactive.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.orchestrator.log_capacity == 0 {
            return Err(EngineError::Config(
                "orchestrator.log_capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(dep) = self.dependencies.iter().find(|d| d.check_command.trim().is_empty()) {
            return Err(EngineError::Config(format!(
                "dependency '{}' has an empty check_command",
                dep.name
            )));
        }
        Ok(())
    }
}

fn default_dependencies() -> Vec<Dependency> {
    vec![
        Dependency::new(
            "git",
            "command -v git",
            "brew install git",
        ),
        Dependency::new(
            "curl",
            "command -v curl",
            "brew install curl",
        ),
        Dependency::new(
            "homebrew",
            "command -v brew || test -x \"$HOMEBREW_PREFIX/bin/brew\"",
            "/bin/bash -c \"$(curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)\"",
        ),
    ]
}

/// Load configuration from multiple sources
pub fn load_config() -> Result<Config> {
    let config_dir = get_config_dir()?;
    let global_config = config_dir.join("config.toml");
    let local_config = PathBuf::from(".kestrel/config.toml");

    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    if global_config.exists() {
        figment = figment.merge(Toml::file(&global_config));
    }

    if local_config.exists() {
        figment = figment.merge(Toml::file(&local_config));
    }

    // KESTREL_EXECUTOR__TIMEOUT_SECS=60 style overrides
    figment = figment.merge(Env::prefixed("KESTREL_").split("__"));

    let config: Config = figment.extract().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from one explicit file, still honoring environment overrides
pub fn load_config_from(path: &Path) -> Result<Config> {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("KESTREL_").split("__"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "kestrel") {
        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;
        Ok(config_dir.to_path_buf())
    } else {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Could not determine home directory")?;
        let config_dir = PathBuf::from(home).join(".config").join("kestrel");
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: Option<PathBuf>) -> Result<()> {
    let path = if let Some(p) = path {
        p
    } else {
        get_config_dir()?.join("config.toml")
    };

    let toml_string = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    Ok(())
}

/// Create a default configuration file if it doesn't exist
pub fn init_config() -> Result<PathBuf> {
    let config_file = get_config_dir()?.join("config.toml");

    if !config_file.exists() {
        save_config(&Config::default(), Some(config_file.clone()))?;
        println!("Created default configuration at: {}", config_file.display());
    } else {
        println!("Configuration already exists at: {}", config_file.display());
    }

    Ok(config_file)
}
