use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::constants::SENSITIVE_PATHS;
use crate::utils::EngineError;

/// Write `content` to `relative` inside `root`
///
/// Parent directories are created and an existing file is first copied to
/// `<file>.backup`. Returns the absolute path written.
pub fn create_file(root: &Path, relative: &str, content: &str) -> Result<PathBuf, EngineError> {
    let path = resolve_within(root, relative)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        let backup_path = PathBuf::from(format!("{}.backup", path.display()));
        fs::copy(&path, &backup_path)?;
    }

    fs::write(&path, content)?;
    Ok(path)
}

/// Join `relative` onto `root`, refusing escapes and sensitive locations
fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, EngineError> {
    let candidate = Path::new(relative);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    // Lexical normalisation; the target need not exist yet
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(outside(relative));
                }
            }
            Component::CurDir => {}
            other => normalized.push(other),
        }
    }

    if !normalized.starts_with(root) || normalized == root {
        return Err(outside(relative));
    }

    // Symlinked ancestors must still land inside the root
    if let (Some(existing), Ok(root_real)) = (deepest_existing(&normalized), root.canonicalize()) {
        let real = existing.canonicalize()?;
        if !real.starts_with(&root_real) {
            return Err(outside(relative));
        }
    }

    // Only the part below the root is checked; the root's own name is the user's choice
    let inside = normalized.strip_prefix(root).unwrap_or(&normalized);
    let path_str = inside.to_string_lossy();
    if let Some(pattern) = SENSITIVE_PATHS.iter().find(|p| path_str.contains(*p)) {
        return Err(EngineError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!("refusing to write potentially sensitive path ({}): {}", pattern, relative),
        )));
    }

    Ok(normalized)
}

fn deepest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}

fn outside(relative: &str) -> EngineError {
    EngineError::Io(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        format!("path outside of project directory: {}", relative),
    ))
}
