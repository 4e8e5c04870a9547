use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::types::{Dependency, DependencyStatus};
use crate::app::UpdatesConfig;
use crate::constants::CONNECTIVITY_TIMEOUT_MS;
use crate::exec::{Command, CommandExecutor, InteractiveExecutor};
use crate::utils::EngineError;

/// Probes for required external tools and publishes an aggregate status
///
/// The checker is the only writer of its status channel; UI collaborators
/// read it through [`DependencyChecker::subscribe`].
pub struct DependencyChecker {
    executor: Arc<dyn CommandExecutor>,
    check_timeout: Duration,
    status: watch::Sender<DependencyStatus>,
    checked: Vec<Dependency>,
}

impl DependencyChecker {
    pub fn new(executor: Arc<dyn CommandExecutor>, check_timeout: Duration) -> Self {
        let (status, _) = watch::channel(DependencyStatus::Checking);
        Self {
            executor,
            check_timeout,
            status,
            checked: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DependencyStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> DependencyStatus {
        self.status.borrow().clone()
    }

    /// Dependencies from the latest cycle, with their installed flags set
    pub fn checked(&self) -> &[Dependency] {
        &self.checked
    }

    /// Start a new check cycle
    pub fn begin_cycle(&mut self) {
        self.checked.clear();
        self.status.send_replace(DependencyStatus::Checking);
    }

    /// Move the status forward; regressions within a cycle are ignored
    fn advance(&mut self, next: DependencyStatus) -> DependencyStatus {
        let current_stage = self.status.borrow().stage();
        if next.stage() < current_stage {
            warn!(
                from = ?*self.status.borrow(),
                to = ?next,
                "ignoring backward dependency status transition"
            );
            return self.status();
        }
        debug!(status = ?next, "dependency status advanced");
        self.status.send_replace(next.clone());
        next
    }

    /// Run every check command in order and aggregate the result
    ///
    /// The first check that cannot run at all aborts the sweep with `Error`;
    /// later dependencies are not checked. A checker whose last cycle already
    /// settled past the check stage starts a fresh cycle.
    pub async fn check_all(&mut self, dependencies: &[Dependency]) -> DependencyStatus {
        let current_stage = self.status.borrow().stage();
        if current_stage > DependencyStatus::AllInstalled.stage() {
            self.begin_cycle();
        }

        let mut checked = Vec::with_capacity(dependencies.len());

        for dependency in dependencies {
            let command =
                Command::with_timeout(dependency.check_command.clone(), self.check_timeout);
            let result = self.executor.execute(&command).await;

            if result.is_execution_error() {
                let error = EngineError::DependencyCheck(format!(
                    "{}: {}",
                    dependency.name,
                    result.error_message().unwrap_or("check command could not run")
                ));
                warn!(dependency = %dependency.name, error = %error, "dependency sweep aborted");
                self.checked = checked;
                return self.advance(DependencyStatus::Error(error.to_string()));
            }

            let installed = result.outcome().is_success();
            debug!(dependency = %dependency.name, installed, "dependency checked");
            checked.push(dependency.checked(installed));
        }

        let missing: Vec<Dependency> = checked.iter().filter(|d| !d.is_installed()).cloned().collect();
        self.checked = checked;

        let status = if missing.is_empty() {
            DependencyStatus::AllInstalled
        } else {
            info!(count = missing.len(), "dependencies missing");
            DependencyStatus::Missing(missing)
        };
        self.advance(status)
    }

    /// Whether `url` answers at all within a short timeout
    pub async fn check_connectivity(&mut self, url: &str) -> bool {
        self.advance(DependencyStatus::CheckingConnectivity);
        match probe_connectivity(url).await {
            Ok(()) => true,
            Err(e) => {
                warn!(url, error = %e, "connectivity probe failed");
                self.advance(DependencyStatus::NoConnectivity);
                false
            }
        }
    }

    /// Full startup sweep: connectivity, tool checks, then the version probe
    pub async fn sweep(
        &mut self,
        dependencies: &[Dependency],
        updates: &UpdatesConfig,
    ) -> DependencyStatus {
        self.begin_cycle();

        if let Some(url) = &updates.connectivity_url {
            if !self.check_connectivity(url).await {
                return self.status();
            }
        }

        let status = self.check_all(dependencies).await;
        if status != DependencyStatus::AllInstalled {
            return status;
        }

        if let Some(url) = &updates.version_url {
            match fetch_latest_version(url).await {
                Ok(latest) if is_newer(&latest, env!("CARGO_PKG_VERSION")) => {
                    info!(latest = %latest, "newer version published");
                    return self.advance(DependencyStatus::VersionUpdateRequired(latest));
                }
                Ok(_) => {}
                // Version probe failures never block startup
                Err(e) => warn!(url, error = %e, "version probe failed"),
            }
        }

        status
    }

    /// Install each missing dependency in a visible terminal session
    pub async fn install_missing(
        &mut self,
        missing: &[Dependency],
        interactive: &dyn InteractiveExecutor,
    ) -> DependencyStatus {
        self.advance(DependencyStatus::Updating);

        for dependency in missing {
            info!(dependency = %dependency.name, "installing dependency");
            let command = Command::new(dependency.install_command.clone());
            let result = interactive.execute_interactive(&command).await;
            if !result.outcome().is_success() {
                let message = format!(
                    "Failed to install {}: {}",
                    dependency.name,
                    result.error_message().unwrap_or("unknown error")
                );
                return self.advance(DependencyStatus::Error(message));
            }
        }

        self.advance(DependencyStatus::Updated)
    }
}

async fn probe_connectivity(url: &str) -> Result<(), EngineError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(CONNECTIVITY_TIMEOUT_MS))
        .build()?;
    // Any HTTP answer proves the network is reachable
    client.get(url).send().await?;
    Ok(())
}

async fn fetch_latest_version(url: &str) -> Result<String, EngineError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(CONNECTIVITY_TIMEOUT_MS))
        .build()?;
    let body = client.get(url).send().await?.error_for_status()?.text().await?;
    let version = body.trim().trim_start_matches('v').to_string();
    if version.is_empty() {
        return Err(EngineError::Network("empty version response".to_string()));
    }
    Ok(version)
}

/// Compare dotted numeric versions; non-numeric parts count as zero
pub fn is_newer(candidate: &str, current: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .trim()
            .trim_start_matches('v')
            .split(['.', '-', '+'])
            .take(3)
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }

    let (mut a, mut b) = (parts(candidate), parts(current));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a > b
}
