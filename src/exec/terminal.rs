use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::command::Command;
use super::types::{ExecutionResult, InteractiveExecutor, Outcome};
use crate::app::InteractiveConfig;
use crate::constants::SCRIPT_BRIDGE_PROGRAM;
use crate::utils::EngineError;

/// Escape text for embedding inside an AppleScript string literal
pub fn escape_script_string(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Text typed into the terminal session, with the working directory restored
fn session_text(command: &Command) -> String {
    match command.working_directory() {
        Some(dir) => format!("cd \"{}\" && {}", dir.display(), command.text()),
        None => command.text().to_string(),
    }
}

/// Build the automation script that runs `command` in a new terminal session
///
/// The script opens a session, polls until it is no longer busy, returns the
/// visible text and then tears the session down. Every teardown step sits in
/// its own `try` so a failure there never fails the run.
pub fn session_script(command: &Command, host: &str, poll_interval: Duration) -> String {
    let text = escape_script_string(&session_text(command));
    let host = escape_script_string(host);
    let interval = format!("{:.1}", poll_interval.as_secs_f64());

    format!(
        r#"tell application "{host}"
    activate
    set runTab to do script "{text}"
    delay {interval}
    repeat while busy of runTab
        delay {interval}
    end repeat
    set sessionOutput to contents of runTab
    try
        set hostWindow to first window whose tabs contains runTab
        if (count of tabs of hostWindow) > 1 then
            close runTab
        else
            close hostWindow
        end if
    on error
        try
            do script "exit" in runTab
            delay {interval}
            close (first window whose tabs contains runTab)
        on error
            try
                if (count of windows) is 1 then quit
            end try
        end try
    end try
    return sessionOutput
end tell
"#
    )
}

/// Runs commands in a visible terminal application via its scripting bridge
///
/// There is no exit code plumbing from the host application, so completion is
/// detected by polling the session's busy flag and there is no timeout.
#[derive(Debug, Clone)]
pub struct TerminalCommandExecutor {
    host: String,
    poll_interval: Duration,
    bridge: String,
}

impl TerminalCommandExecutor {
    pub fn new(config: &InteractiveConfig) -> Self {
        Self {
            host: config.host_application.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            bridge: SCRIPT_BRIDGE_PROGRAM.to_string(),
        }
    }

    /// Use a different scripting bridge program
    pub fn with_bridge(mut self, program: impl Into<String>) -> Self {
        self.bridge = program.into();
        self
    }
}

#[async_trait]
impl InteractiveExecutor for TerminalCommandExecutor {
    async fn execute_interactive(&self, command: &Command) -> ExecutionResult {
        let script = session_script(command, &self.host, self.poll_interval);
        info!(command = command.text(), host = %self.host, "opening terminal session");

        let output = tokio::process::Command::new(&self.bridge)
            .arg("-e")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!(bridge = %self.bridge, error = %e, "scripting bridge failed to launch");
                return ExecutionResult::launch_failure(
                    EngineError::InteractiveSession(format!(
                        "could not launch {}: {}",
                        self.bridge, e
                    ))
                    .to_string(),
                );
            }
        };

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
            let message = EngineError::InteractiveSession(format!(
                "{} exited with status {}: {}",
                self.bridge,
                output.status.code().unwrap_or(-1),
                captured.trim()
            ))
            .to_string();
            return ExecutionResult::new(
                output.status.code(),
                captured,
                Outcome::Failure,
                Some(message),
                None,
            );
        }

        ExecutionResult::new(Some(0), captured, Outcome::Success, None, None)
    }

    fn is_supported(&self) -> bool {
        cfg!(target_os = "macos")
    }
}

/// Stand-in for platforms without a terminal automation bridge
#[derive(Debug, Clone, Default)]
pub struct UnsupportedInteractiveExecutor;

#[async_trait]
impl InteractiveExecutor for UnsupportedInteractiveExecutor {
    async fn execute_interactive(&self, command: &Command) -> ExecutionResult {
        warn!(command = command.text(), "interactive session requested on unsupported platform");
        ExecutionResult::launch_failure(
            EngineError::InteractiveSession(
                "interactive terminal sessions are not supported on this platform".to_string(),
            )
            .to_string(),
        )
    }

    fn is_supported(&self) -> bool {
        false
    }
}

/// The interactive executor for the current platform
pub fn default_interactive_executor(config: &InteractiveConfig) -> Arc<dyn InteractiveExecutor> {
    if cfg!(target_os = "macos") {
        Arc::new(TerminalCommandExecutor::new(config))
    } else {
        Arc::new(UnsupportedInteractiveExecutor)
    }
}
