use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kestrel")]
#[command(version)]
#[command(about = "Run developer-tool actions with timeouts, logs and result classification", long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the global and project files)
    #[arg(short, long, env = "KESTREL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an action (build, test, analyze_code, generate_module, ...)
    Run {
        /// Action name
        action: String,

        /// Project directory (defaults to current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Project type; detected from marker files when omitted
        #[arg(long)]
        project_type: Option<String>,

        /// Template parameter as key=value (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Run in a visible terminal session
        #[arg(long)]
        interactive: bool,
    },
    /// Execute a raw shell command
    Exec {
        /// Command text; may start with cd "<dir>" &&
        command: String,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Check configured dependencies
    Check,
    /// Install missing dependencies in a terminal session
    Install,
    /// List the command template table
    Templates,
    /// Initialize configuration
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_params() {
        let cli = Cli::try_parse_from([
            "kestrel",
            "--output-format",
            "json",
            "run",
            "generate-module",
            "--project-type",
            "maven",
            "--param",
            "name=billing",
            "--param",
            "group=com.example",
        ])
        .unwrap();

        assert_eq!(cli.output_format, OutputFormat::Json);
        match cli.command {
            Commands::Run {
                action,
                project_type,
                params,
                interactive,
                ..
            } => {
                assert_eq!(action, "generate-module");
                assert_eq!(project_type.as_deref(), Some("maven"));
                assert_eq!(params, vec!["name=billing", "group=com.example"]);
                assert!(!interactive);
            }
            other => panic!("Expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_exec_timeout() {
        let cli = Cli::try_parse_from(["kestrel", "exec", "sleep 1", "--timeout", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Exec { timeout: Some(5), .. }));
    }
}
