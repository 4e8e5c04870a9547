use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::classifier::{ResultClassifier, ToolFamily};
use super::command::Command;
use super::environment::{ShellEnvironment, ShellEnvironmentBuilder};
use super::types::{CommandExecutor, ExecutionResult};
use crate::app::ExecutorConfig;
use crate::constants::{FALLBACK_SHELL, OUTPUT_DRAIN_TIMEOUT_MS};
use crate::utils::EngineError;

const PENDING: u8 = 0;

/// Which completion path won the right to resolve an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Resolution {
    Completed = 1,
    TimedOut = 2,
}

/// Single-set arbiter between natural process exit and the timeout timer
///
/// The first `claim` wins; every later claim returns false.
#[derive(Debug, Default)]
pub struct ResolutionGate {
    state: AtomicU8,
}

impl ResolutionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, resolution: Resolution) -> bool {
        self.state
            .compare_exchange(PENDING, resolution as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn winner(&self) -> Option<Resolution> {
        match self.state.load(Ordering::Acquire) {
            1 => Some(Resolution::Completed),
            2 => Some(Resolution::TimedOut),
            _ => None,
        }
    }
}

/// Spawns one shell process per call and races it against a timeout
pub struct ProcessExecutor {
    environment: ShellEnvironmentBuilder,
    classifier: ResultClassifier,
    shell: PathBuf,
    source_profiles: bool,
    profile_files: Vec<String>,
    package_manager: String,
    terminate_grace: Duration,
}

impl ProcessExecutor {
    pub fn new(config: &ExecutorConfig, classifier: ResultClassifier) -> Self {
        Self {
            environment: ShellEnvironmentBuilder::new(config),
            classifier,
            shell: resolve_shell(&config.shell),
            source_profiles: config.source_profiles,
            profile_files: config.profile_files.clone(),
            package_manager: config.package_manager.clone(),
            terminate_grace: Duration::from_millis(config.terminate_grace_ms),
        }
    }

    /// Replace the environment builder (e.g. one with a pinned prefix)
    pub fn with_environment(mut self, environment: ShellEnvironmentBuilder) -> Self {
        self.environment = environment;
        self
    }

    pub fn classifier(&self) -> &ResultClassifier {
        &self.classifier
    }

    /// Shell script wrapping a command: merge stderr into stdout, load the
    /// user's profiles and the package manager hook, then run the command.
    /// Every setup step is allowed to fail.
    pub fn wrap_script(&self, command_text: &str, env: &ShellEnvironment) -> String {
        let mut script = String::from("exec 2>&1\n");

        if self.source_profiles {
            for file in &self.profile_files {
                script.push_str(&format!(
                    "if [ -f \"$HOME/{file}\" ]; then . \"$HOME/{file}\" >/dev/null 2>&1 || true; fi\n"
                ));
            }
            let hook = format!("\"${}/bin/{}\"", env.prefix_var, self.package_manager);
            script.push_str(&format!(
                "if [ -x {hook} ]; then eval \"$({hook} shellenv 2>/dev/null)\" >/dev/null 2>&1 || true; fi\n"
            ));
        }

        script.push_str(command_text);
        script.push('\n');
        script
    }

    /// Run a command to completion, at most once per call
    pub async fn execute(&self, command: &Command) -> ExecutionResult {
        let working_dir = match command.resolve_working_directory() {
            Ok(dir) => dir,
            Err(e) => {
                return ExecutionResult::launch_failure(format!(
                    "Could not determine working directory: {}",
                    e
                ))
            }
        };
        if !working_dir.is_dir() {
            warn!(dir = %working_dir.display(), "working directory missing");
            return ExecutionResult::launch_failure(
                EngineError::WorkingDirectoryNotFound(working_dir).to_string(),
            );
        }

        let env = self.environment.build().await;
        let script = self.wrap_script(command.text(), &env);
        let family = ToolFamily::detect(command.text());

        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&script)
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        env.apply(&mut cmd);
        // Own process group so termination reaches everything the shell started
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(shell = %self.shell.display(), error = %e, "spawn failed");
                return ExecutionResult::launch_failure(EngineError::Spawn(e.to_string()).to_string());
            }
        };

        info!(
            command = command.text(),
            dir = %working_dir.display(),
            pid = ?child.id(),
            "process started"
        );

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(read_into(stdout, Arc::clone(&buffer))));

        let gate = Arc::new(ResolutionGate::new());
        let (terminate_tx, terminate_rx) = oneshot::channel::<()>();
        let timeout = command.timeout();

        let timer = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move {
                tokio::time::sleep(timeout).await;
                if gate.claim(Resolution::TimedOut) {
                    let _ = terminate_tx.send(());
                }
            }
        });

        let status = tokio::select! {
            status = child.wait() => Some(status),
            Ok(()) = terminate_rx => None,
        };

        let result = match status {
            Some(waited) => {
                // Natural exit: stop the timer before anything else
                timer.abort();
                let output = drain(reader, &buffer).await;
                if gate.claim(Resolution::Completed) {
                    match waited {
                        Ok(status) => self.classifier.classify(exit_code(status), output, family),
                        Err(e) => ExecutionResult::launch_failure(format!(
                            "Failed to wait for process: {}",
                            e
                        )),
                    }
                } else {
                    // Timer fired while the process was already exiting
                    self.classifier.timed_out(output, timeout.as_secs())
                }
            }
            None => {
                warn!(command = command.text(), timeout_secs = timeout.as_secs(), "process timed out");
                terminate(&mut child, self.terminate_grace).await;
                let output = drain(reader, &buffer).await;
                self.classifier.timed_out(output, timeout.as_secs())
            }
        };

        debug!(
            command = command.text(),
            exit_code = ?result.exit_code(),
            outcome = result.outcome().as_str(),
            "process resolved"
        );
        result
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, command: &Command) -> ExecutionResult {
        ProcessExecutor::execute(self, command).await
    }
}

/// Use the configured shell if it exists, otherwise plain `sh`
fn resolve_shell(shell: &str) -> PathBuf {
    let path = Path::new(shell);
    if path.is_absolute() && path.exists() {
        return path.to_path_buf();
    }
    if !path.is_absolute() {
        if let Ok(found) = which::which(shell) {
            return found;
        }
    }
    PathBuf::from(FALLBACK_SHELL)
}

/// Exit code, with signal deaths encoded the way shells report them
fn exit_code(status: ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}

async fn read_into(mut stdout: ChildStdout, buffer: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match stdout.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buffer.lock().extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!(error = %e, "output stream closed with error");
                break;
            }
        }
    }
}

/// Wait briefly for the reader to hit EOF, then take whatever was captured
async fn drain(reader: Option<JoinHandle<()>>, buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    if let Some(mut handle) = reader {
        let limit = Duration::from_millis(OUTPUT_DRAIN_TIMEOUT_MS);
        if tokio::time::timeout(limit, &mut handle).await.is_err() {
            // Something outside our process group still holds the pipe
            handle.abort();
        }
    }
    let bytes = std::mem::take(&mut *buffer.lock());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// SIGTERM the process group, escalating to SIGKILL after the grace period
async fn terminate(child: &mut Child, grace: Duration) {
    signal_group(child, Signal::Term);
    if tokio::time::timeout(grace, child.wait()).await.is_ok() {
        return;
    }
    warn!(pid = ?child.id(), "process ignored SIGTERM, killing");
    signal_group(child, Signal::Kill);
    let _ = child.start_kill();
    let _ = child.wait().await;
}

#[derive(Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let signal = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // Negative pid addresses the whole process group created at spawn
    let rc = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if rc != 0 {
        debug!(pid, "process group already gone");
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _signal: Signal) {
    let _ = child.start_kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::types::Outcome;
    use std::time::Instant;
    use tempfile::TempDir;

    fn test_executor() -> ProcessExecutor {
        let config = ExecutorConfig {
            shell: "sh".to_string(),
            source_profiles: false,
            terminate_grace_ms: 500,
            ..ExecutorConfig::default()
        };
        ProcessExecutor::new(&config, ResultClassifier::default())
            .with_environment(ShellEnvironmentBuilder::new(&config).with_prefix("/custom/prefix"))
    }

    #[tokio::test]
    async fn test_success_captures_interleaved_output() {
        let executor = test_executor();
        let result = executor
            .execute(&Command::new("printf 'a\\n'; printf 'b\\n' >&2; printf 'c\\n'"))
            .await;

        assert_eq!(result.outcome(), Outcome::Success);
        assert_eq!(result.exit_code(), Some(0));
        assert_eq!(result.combined_output(), "a\nb\nc\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let executor = test_executor();
        let result = executor.execute(&Command::new("echo broken; exit 3")).await;

        assert_eq!(result.outcome(), Outcome::Failure);
        assert_eq!(result.exit_code(), Some(3));
        assert_eq!(result.error_message(), Some("broken"));
        assert!(!result.is_execution_error());
    }

    #[tokio::test]
    async fn test_override_marker_on_nonzero_exit() {
        let executor = test_executor();
        let result = executor
            .execute(&Command::new("echo 'Using archetype: quickstart'; exit 1"))
            .await;

        assert_eq!(result.outcome(), Outcome::HeuristicSuccess);
        assert_eq!(result.exit_code(), Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_terminates_process() {
        let executor = test_executor();
        let command = Command::with_timeout("echo $$; sleep 30", Duration::from_millis(300));

        let started = Instant::now();
        let result = executor.execute(&command).await;

        assert_eq!(result.outcome(), Outcome::Timeout);
        assert!(result.is_execution_error());
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid: i32 = result.combined_output().trim().parse().unwrap();
        // The shell has been terminated and reaped
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_escalates_when_term_is_ignored() {
        let executor = test_executor();
        let command = Command::with_timeout(
            "trap '' TERM; echo $$; while :; do sleep 0.05; done",
            Duration::from_millis(300),
        );

        let started = Instant::now();
        let result = executor.execute(&command).await;

        assert_eq!(result.outcome(), Outcome::Timeout);
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid: i32 = result.combined_output().trim().parse().unwrap();
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive);
    }

    #[tokio::test]
    async fn test_fast_command_is_not_timed_out() {
        let executor = test_executor();
        let command = Command::with_timeout("echo quick", Duration::from_secs(5));
        let result = executor.execute(&command).await;
        assert_eq!(result.outcome(), Outcome::Success);
        assert_eq!(result.combined_output(), "quick\n");
    }

    #[tokio::test]
    async fn test_missing_working_directory() {
        let executor = test_executor();
        let result = executor
            .execute(&Command::new("cd \"/definitely/not/here\" && ls"))
            .await;

        assert_eq!(result.outcome(), Outcome::Failure);
        assert_eq!(result.exit_code(), None);
        assert!(result.error_message().unwrap().contains("Working directory not found"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = ExecutorConfig {
            shell: "/nonexistent/shell".to_string(),
            source_profiles: false,
            ..ExecutorConfig::default()
        };
        let mut executor = ProcessExecutor::new(&config, ResultClassifier::default())
            .with_environment(ShellEnvironmentBuilder::new(&config).with_prefix("/custom/prefix"));
        // Bypass the fallback so the spawn itself fails
        executor.shell = PathBuf::from("/nonexistent/shell");

        let result = executor.execute(&Command::new("echo hi")).await;
        assert_eq!(result.outcome(), Outcome::Failure);
        assert!(result.error_message().unwrap().contains("Failed to spawn process"));
        assert!(result.is_execution_error());
    }

    #[tokio::test]
    async fn test_cd_prefix_sets_working_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().canonicalize().unwrap();
        let executor = test_executor();

        let raw = format!("cd \"{}\" && pwd -P", dir.display());
        let result = executor.execute(&Command::new(raw)).await;

        assert_eq!(result.outcome(), Outcome::Success);
        assert_eq!(result.combined_output().trim(), dir.to_string_lossy());
    }

    #[tokio::test]
    async fn test_environment_is_injected() {
        let executor = test_executor();
        let result = executor
            .execute(&Command::new("printf '%s' \"$HOMEBREW_PREFIX\""))
            .await;
        assert_eq!(result.combined_output(), "/custom/prefix");

        let result = executor
            .execute(&Command::new("printf '%s' \"$PATH\""))
            .await;
        assert!(result.combined_output().starts_with("/usr/local/bin:/custom/prefix/bin:"));
    }

    #[test]
    fn test_wrap_script_tolerates_setup_failures() {
        let config = ExecutorConfig::default();
        let executor = ProcessExecutor::new(&config, ResultClassifier::default());
        let env = ShellEnvironment {
            path: "/usr/bin".to_string(),
            prefix_var: "HOMEBREW_PREFIX".to_string(),
            prefix: PathBuf::from("/opt/homebrew"),
        };
        let script = executor.wrap_script("cargo build", &env);

        assert!(script.starts_with("exec 2>&1\n"));
        assert!(script.contains(". \"$HOME/.profile\" >/dev/null 2>&1 || true"));
        assert!(script.contains("eval \"$(\"$HOMEBREW_PREFIX/bin/brew\" shellenv 2>/dev/null)\""));
        assert!(script.ends_with("cargo build\n"));
    }

    #[test]
    fn test_gate_resolves_once() {
        let gate = ResolutionGate::new();
        assert_eq!(gate.winner(), None);
        assert!(gate.claim(Resolution::TimedOut));
        assert!(!gate.claim(Resolution::Completed));
        assert!(!gate.claim(Resolution::TimedOut));
        assert_eq!(gate.winner(), Some(Resolution::TimedOut));
    }

    #[test]
    fn test_gate_under_contention() {
        let gate = Arc::new(ResolutionGate::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    let resolution = if i % 2 == 0 {
                        Resolution::Completed
                    } else {
                        Resolution::TimedOut
                    };
                    gate.claim(resolution)
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
