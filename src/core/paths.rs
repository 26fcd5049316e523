//! Shared path manipulation utilities.

use std::collections::BTreeSet;
use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// If `fs::canonicalize` succeeds (path exists), it is used to resolve symlinks
/// and normalize components.
///
/// If it fails (e.g. path does not exist), the path is made absolute relative
/// to CWD and `..`/`.` components are resolved syntactically.
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

/// Check that a [`DeletionSpec`](crate::engine::deleter::DeletionSpec) entry stays inside its root.
///
/// Entries must be relative, non-empty, and free of `..` components. `.`
/// components are tolerated. Returns the reason on rejection.
pub fn check_root_relative(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("path is empty".to_string());
    }
    let mut normal = 0usize;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                return Err("path must not contain '..'".to_string());
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the run root".to_string());
            }
        }
    }
    if normal == 0 {
        return Err("path names no file".to_string());
    }
    Ok(())
}

/// Return the first directory component of `relative` whose name is excluded.
///
/// The final component (the file name itself) is not considered.
pub fn excluded_ancestor<'a>(relative: &'a Path, excluded: &BTreeSet<String>) -> Option<&'a str> {
    let mut components: Vec<Component<'a>> = relative.components().collect();
    components.pop();
    components.into_iter().find_map(|component| match component {
        Component::Normal(name) => name.to_str().filter(|name| excluded.contains(*name)),
        _ => None,
    })
}

/// Render `path` relative to `root` when possible, for reports and logs.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map_or_else(|_| path.display().to_string(), |rel| rel.display().to_string())
}
