//! Default locations and path normalization for the CLI host.

use std::env;
use std::path::{Component, Path, PathBuf};

/// `$HOME`, or `/tmp` with a warning when unset.
fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[SNV-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

/// `$XDG_CONFIG_HOME/smartnav`, else `~/.config/smartnav`.
#[must_use]
pub fn config_dir() -> PathBuf {
    env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map_or_else(|| home_dir().join(".config"), PathBuf::from)
        .join("smartnav")
}

/// `$XDG_DATA_HOME/smartnav`, else `~/.local/share/smartnav`.
#[must_use]
pub fn data_dir() -> PathBuf {
    env::var_os("XDG_DATA_HOME")
        .filter(|v| !v.is_empty())
        .map_or_else(|| home_dir().join(".local").join("share"), PathBuf::from)
        .join("smartnav")
}

/// Resolve a path to an absolute, normalized path.
///
/// Uses `fs::canonicalize` when the path exists; otherwise joins it onto the
/// working directory and resolves `..`/`.` syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }
    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dirs_end_with_crate_name() {
        assert!(config_dir().ends_with("smartnav"));
        assert!(data_dir().ends_with("smartnav"));
    }

    #[test]
    fn normalizes_nonexistent_export_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("exports").join("..").join("stats.json");
        let resolved = resolve_absolute_path(&input);
        assert!(resolved.ends_with("stats.json"));
        assert!(!resolved.to_string_lossy().contains(".."));
    }

    #[cfg(unix)]
    #[test]
    fn handles_parent_at_root() {
        assert_eq!(normalize_syntactic(Path::new("/../foo")), Path::new("/foo"));
    }
}
