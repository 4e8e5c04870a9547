use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::app::ExecutorConfig;
use crate::constants::{LOCAL_TOOL_DIR, PREFIX_PROBE_TIMEOUT_SECS, SYSTEM_TOOL_DIRS};

/// Environment variables injected into every spawned process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEnvironment {
    pub path: String,
    pub prefix_var: String,
    pub prefix: PathBuf,
}

impl ShellEnvironment {
    /// Variables to set on the child, in application order
    pub fn vars(&self) -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), self.path.clone()),
            (self.prefix_var.clone(), self.prefix.to_string_lossy().into_owned()),
        ]
    }

    /// Apply to a command without touching this process' own environment
    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        for (key, value) in self.vars() {
            cmd.env(key, value);
        }
    }
}

/// Builds the PATH and package-manager prefix for spawned processes
///
/// The prefix is probed once per builder by asking the package manager
/// itself; any failure falls back to the configured default.
#[derive(Debug)]
pub struct ShellEnvironmentBuilder {
    package_manager: String,
    prefix_var: String,
    default_prefix: PathBuf,
    extra_path_dirs: Vec<PathBuf>,
    prefix: OnceCell<PathBuf>,
}

impl ShellEnvironmentBuilder {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            package_manager: config.package_manager.clone(),
            prefix_var: config.package_manager_prefix_var.clone(),
            default_prefix: config.default_prefix.clone(),
            extra_path_dirs: config.extra_path_dirs.clone(),
            prefix: OnceCell::new(),
        }
    }

    /// Use a known prefix instead of probing the package manager
    pub fn with_prefix(self, prefix: impl Into<PathBuf>) -> Self {
        let prefix = OnceCell::new_with(Some(prefix.into()));
        Self { prefix, ..self }
    }

    pub async fn build(&self) -> ShellEnvironment {
        let prefix = self.package_prefix().await;
        let inherited = std::env::var("PATH").ok();
        ShellEnvironment {
            path: augment_path(&prefix, &self.extra_path_dirs, inherited.as_deref()),
            prefix_var: self.prefix_var.clone(),
            prefix,
        }
    }

    async fn package_prefix(&self) -> PathBuf {
        self.prefix
            .get_or_init(|| {
                resolve_prefix(&self.package_manager, &self.prefix_var, &self.default_prefix)
            })
            .await
            .clone()
    }
}

/// Prepend the common tool directories and package prefix to an inherited PATH
///
/// Order: `/usr/local/bin`, `<prefix>/bin`, `<prefix>/sbin`, configured extras,
/// the remaining system directories, then whatever was inherited. Duplicates
/// keep their first position.
pub fn augment_path(prefix: &Path, extra_dirs: &[PathBuf], inherited: Option<&str>) -> String {
    let mut entries: Vec<String> = Vec::new();
    let mut push = |entry: String| {
        if !entry.is_empty() && !entries.contains(&entry) {
            entries.push(entry);
        }
    };

    push(LOCAL_TOOL_DIR.to_string());
    push(prefix.join("bin").to_string_lossy().into_owned());
    push(prefix.join("sbin").to_string_lossy().into_owned());
    for dir in extra_dirs {
        push(dir.to_string_lossy().into_owned());
    }
    for dir in SYSTEM_TOOL_DIRS {
        push(dir.to_string());
    }
    if let Some(inherited) = inherited {
        for dir in inherited.split(':') {
            push(dir.to_string());
        }
    }

    entries.join(":")
}

/// Ask the package manager for its prefix, best effort
async fn resolve_prefix(package_manager: &str, prefix_var: &str, default: &Path) -> PathBuf {
    if let Ok(value) = std::env::var(prefix_var) {
        if !value.trim().is_empty() {
            return PathBuf::from(value.trim());
        }
    }

    let program = match which::which(package_manager) {
        Ok(path) => path,
        Err(_) => {
            // Not on PATH; try the default install location directly
            let candidate = default.join("bin").join(package_manager);
            if !candidate.exists() {
                debug!(package_manager, "package manager not found, using default prefix");
                return default.to_path_buf();
            }
            candidate
        }
    };

    let probe = tokio::process::Command::new(&program)
        .arg("--prefix")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(PREFIX_PROBE_TIMEOUT_SECS), probe).await {
        Ok(Ok(output)) if output.status.success() => {
            let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if prefix.is_empty() {
                default.to_path_buf()
            } else {
                PathBuf::from(prefix)
            }
        }
        Ok(Ok(output)) => {
            debug!(status = ?output.status.code(), "prefix probe exited nonzero");
            default.to_path_buf()
        }
        Ok(Err(e)) => {
            warn!(error = %e, "prefix probe could not start");
            default.to_path_buf()
        }
        Err(_) => {
            warn!("prefix probe timed out");
            default.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_augment_path_order() {
        let path = augment_path(
            Path::new("/opt/homebrew"),
            &[PathBuf::from("/home/dev/.cargo/bin")],
            Some("/home/dev/bin:/usr/bin"),
        );
        assert_eq!(
            path,
            "/usr/local/bin:/opt/homebrew/bin:/opt/homebrew/sbin:/home/dev/.cargo/bin:\
             /usr/bin:/bin:/usr/sbin:/sbin:/home/dev/bin"
        );
    }

    #[test]
    fn test_augment_path_without_inherited() {
        let path = augment_path(Path::new("/usr/local"), &[], None);
        // /usr/local/bin appears once even though the prefix produces it again
        assert_eq!(path, "/usr/local/bin:/usr/local/sbin:/usr/bin:/bin:/usr/sbin:/sbin");
    }

    #[tokio::test]
    async fn test_builder_with_known_prefix() {
        let config = ExecutorConfig::default();
        let builder = ShellEnvironmentBuilder::new(&config).with_prefix("/custom/prefix");
        let env = builder.build().await;

        assert_eq!(env.prefix, PathBuf::from("/custom/prefix"));
        assert!(env.path.starts_with("/usr/local/bin:/custom/prefix/bin:"));
        let vars = env.vars();
        assert_eq!(vars[0].0, "PATH");
        assert_eq!(vars[1], (config.package_manager_prefix_var.clone(), "/custom/prefix".to_string()));
    }

    #[tokio::test]
    async fn test_missing_package_manager_falls_back() {
        let prefix = resolve_prefix(
            "definitely-not-a-package-manager",
            "KESTREL_TEST_UNSET_PREFIX_VAR",
            Path::new("/fallback/prefix"),
        )
        .await;
        assert_eq!(prefix, PathBuf::from("/fallback/prefix"));
    }
}
