use serde::{Deserialize, Serialize};

/// An external tool the engine relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Exits without error when the tool is present
    pub check_command: String,
    pub install_command: String,
    /// Set by the checker once per check cycle
    #[serde(skip)]
    pub(crate) installed: bool,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        check_command: impl Into<String>,
        install_command: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            check_command: check_command.into(),
            install_command: install_command.into(),
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Copy of this descriptor carrying one check cycle's result
    pub(crate) fn checked(&self, installed: bool) -> Self {
        Self {
            installed,
            ..self.clone()
        }
    }
}

/// Aggregate readiness of all dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DependencyStatus {
    Checking,
    CheckingConnectivity,
    NoConnectivity,
    AllInstalled,
    Missing(Vec<Dependency>),
    VersionUpdateRequired(String),
    Updating,
    Updated,
    Error(String),
}

impl DependencyStatus {
    /// Position in the check lifecycle; status only moves to equal or later stages
    pub(crate) fn stage(&self) -> u8 {
        match self {
            Self::Checking => 0,
            Self::CheckingConnectivity => 1,
            Self::NoConnectivity => 2,
            Self::AllInstalled | Self::Missing(_) => 3,
            Self::VersionUpdateRequired(_) => 4,
            Self::Updating => 5,
            Self::Updated => 6,
            Self::Error(_) => 7,
        }
    }

    /// True once a cycle can make no further progress on its own
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            Self::Checking | Self::CheckingConnectivity | Self::Updating
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Checking => "Checking dependencies...".to_string(),
            Self::CheckingConnectivity => "Checking network connectivity...".to_string(),
            Self::NoConnectivity => "No network connectivity".to_string(),
            Self::AllInstalled => "All dependencies installed".to_string(),
            Self::Missing(missing) => {
                let names: Vec<&str> = missing.iter().map(|d| d.name.as_str()).collect();
                format!("Missing dependencies: {}", names.join(", "))
            }
            Self::VersionUpdateRequired(version) => {
                format!("Version {} is available, update required", version)
            }
            Self::Updating => "Installing dependencies...".to_string(),
            Self::Updated => "Dependencies installed".to_string(),
            Self::Error(message) => format!("Dependency check failed: {}", message),
        }
    }
}
