/// Constants module to avoid magic numbers in the codebase

// Process execution
pub const COMMAND_TIMEOUT_SECS: u64 = 300; // 5 minute hard ceiling
pub const TERMINATE_GRACE_MS: u64 = 2000;
pub const OUTPUT_DRAIN_TIMEOUT_MS: u64 = 2000;
pub const PREFIX_PROBE_TIMEOUT_SECS: u64 = 5;

/// Exit status reported for a process terminated by the timeout path (128 + SIGTERM)
pub const TIMEOUT_EXIT_STATUS: i32 = 128 + 15;

// Shell environment
pub const DEFAULT_SHELL: &str = "/bin/bash";
pub const FALLBACK_SHELL: &str = "sh";
pub const DEFAULT_PACKAGE_MANAGER: &str = "brew";
pub const DEFAULT_PREFIX_VAR: &str = "HOMEBREW_PREFIX";

#[cfg(target_os = "macos")]
pub const DEFAULT_PACKAGE_PREFIX: &str = "/opt/homebrew";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_PACKAGE_PREFIX: &str = "/home/linuxbrew/.linuxbrew";

pub const LOCAL_TOOL_DIR: &str = "/usr/local/bin";
pub const SYSTEM_TOOL_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin", "/sbin"];

pub const PROFILE_FILES: &[&str] = &[".profile", ".bash_profile", ".zprofile"];

// Interactive terminal sessions
pub const INTERACTIVE_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TERMINAL_HOST: &str = "Terminal";
pub const SCRIPT_BRIDGE_PROGRAM: &str = "osascript";

// Action orchestration
pub const SETTLE_DELAY_MS: u64 = 500;
pub const DISPLAY_DELAY_MS: u64 = 2500;
pub const ACTION_LOG_CAPACITY: usize = 50;
pub const DEBUG_OUTPUT_LIMIT: usize = 2000;
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

pub const PROGRESS_PREPARING: f32 = 0.1;
pub const PROGRESS_EXECUTING: f32 = 0.3;
pub const PROGRESS_FINISHING: f32 = 0.8;
pub const PROGRESS_COMPLETED: f32 = 1.0;
pub const PROGRESS_FAILED: f32 = 0.0;

// Network probes
pub const CONNECTIVITY_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_CONNECTIVITY_URL: &str = "https://github.com";

// Paths that native file actions refuse to touch
pub const SENSITIVE_PATHS: &[&str] = &[
    ".ssh",
    ".aws",
    ".env",
    "id_rsa",
    "id_ed25519",
    ".git/config",
    ".npmrc",
    ".pypirc",
];
