use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::COMMAND_TIMEOUT_SECS;

const CD_PREFIX: &str = "cd \"";
const CD_SEPARATOR: &str = "\" && ";

/// Result of splitting a `cd "<dir>" && <rest>` command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Directory named by the leading `cd`, if the command had one
    pub working_directory: Option<PathBuf>,
    /// The command text left to execute
    pub text: String,
}

/// Extract an optional working directory from a command string.
///
/// Only the exact form `cd "<dir>" && <rest>` is recognized. Anything else is
/// returned untouched as the command text. Leading whitespace of `<rest>` is
/// dropped, which the shell would ignore anyway.
pub fn parse_command(raw: &str) -> ParsedCommand {
    let untouched = || ParsedCommand {
        working_directory: None,
        text: raw.to_string(),
    };

    let Some(after_cd) = raw.trim_start().strip_prefix(CD_PREFIX) else {
        return untouched();
    };
    let Some(dir_end) = after_cd.find('"') else {
        return untouched();
    };

    let dir = &after_cd[..dir_end];
    let Some(rest) = after_cd[dir_end..].strip_prefix(CD_SEPARATOR) else {
        return untouched();
    };

    if dir.is_empty() {
        return untouched();
    }

    ParsedCommand {
        working_directory: Some(PathBuf::from(dir)),
        text: rest.trim_start().to_string(),
    }
}

/// A command ready for execution
///
/// Immutable once built: the working directory is derived from the raw text
/// at construction and the `cd` prefix is never re-applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    raw_text: String,
    text: String,
    working_directory: Option<PathBuf>,
    timeout: Duration,
}

impl Command {
    /// Build a command from raw text with the default timeout ceiling
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self::with_timeout(raw_text, Duration::from_secs(COMMAND_TIMEOUT_SECS))
    }

    /// Build a command from raw text with an explicit timeout
    pub fn with_timeout(raw_text: impl Into<String>, timeout: Duration) -> Self {
        let raw_text = raw_text.into();
        let parsed = parse_command(&raw_text);
        Self {
            raw_text,
            text: parsed.text,
            working_directory: parsed.working_directory,
            timeout,
        }
    }

    /// Build a command that runs in `dir` unless the text carries its own `cd` prefix
    pub fn in_directory(raw_text: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let mut command = Self::new(raw_text);
        if command.working_directory.is_none() {
            command.working_directory = Some(dir.as_ref().to_path_buf());
        }
        command
    }

    /// Return a copy with a different timeout
    pub fn timeout_after(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Original command string as supplied by the caller
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Command text with any `cd` prefix stripped
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Directory the process should start in: the parsed one or the caller's cwd
    pub fn resolve_working_directory(&self) -> std::io::Result<PathBuf> {
        match &self.working_directory {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cd_prefix() {
        let parsed = parse_command("cd \"/tmp/my project\" && cargo build --release");
        assert_eq!(parsed.working_directory, Some(PathBuf::from("/tmp/my project")));
        assert_eq!(parsed.text, "cargo build --release");
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parsed = parse_command("cd \"/srv/app\" && npm test");
        let reparsed = parse_command(&parsed.text);
        assert_eq!(reparsed.working_directory, None);
        assert_eq!(reparsed.text, "npm test");
    }

    #[test]
    fn test_parse_nested_cd_only_strips_once() {
        let parsed = parse_command("cd \"/a\" && cd \"/b\" && make");
        assert_eq!(parsed.working_directory, Some(PathBuf::from("/a")));
        assert_eq!(parsed.text, "cd \"/b\" && make");
    }

    #[test]
    fn test_parse_without_prefix() {
        let parsed = parse_command("cargo test");
        assert_eq!(parsed.working_directory, None);
        assert_eq!(parsed.text, "cargo test");

        // Unquoted cd is not the recognized form
        let parsed = parse_command("cd /tmp && ls");
        assert_eq!(parsed.working_directory, None);
        assert_eq!(parsed.text, "cd /tmp && ls");

        // Missing && separator
        let parsed = parse_command("cd \"/tmp\"; ls");
        assert_eq!(parsed.working_directory, None);
    }

    #[test]
    fn test_parse_drops_leading_whitespace_of_rest() {
        let parsed = parse_command("cd \"/a\" &&   make  all");
        assert_eq!(parsed.working_directory, Some(PathBuf::from("/a")));
        assert_eq!(parsed.text, "make  all");
    }

    #[test]
    fn test_parse_empty_directory_is_not_extracted() {
        let parsed = parse_command("cd \"\" && ls");
        assert_eq!(parsed.working_directory, None);
        assert_eq!(parsed.text, "cd \"\" && ls");
    }

    #[test]
    fn test_command_keeps_raw_text() {
        let command = Command::new("cd \"/opt/work\" && make all");
        assert_eq!(command.raw_text(), "cd \"/opt/work\" && make all");
        assert_eq!(command.text(), "make all");
        assert_eq!(command.working_directory(), Some(Path::new("/opt/work")));
        assert_eq!(command.timeout(), Duration::from_secs(COMMAND_TIMEOUT_SECS));
    }

    #[test]
    fn test_in_directory_prefers_parsed_prefix() {
        let command = Command::in_directory("cd \"/from/prefix\" && ls", "/fallback");
        assert_eq!(command.working_directory(), Some(Path::new("/from/prefix")));

        let command = Command::in_directory("ls", "/fallback");
        assert_eq!(command.working_directory(), Some(Path::new("/fallback")));
    }

    #[test]
    fn test_resolve_defaults_to_current_dir() {
        let command = Command::new("pwd");
        let resolved = command.resolve_working_directory().unwrap();
        assert_eq!(resolved, std::env::current_dir().unwrap());
    }
}
