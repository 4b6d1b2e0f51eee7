//! Lexical path helpers shared by the ingestor, the catalog and the exporter.
//!
//! Nothing here touches the filesystem: containment is decided on the
//! normalized path text so that a not-yet-existing target can be checked.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without consulting the filesystem.
/// A `..` that would climb above the first component is kept, so the caller's
/// containment check rejects it.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Join an untrusted relative name under `root`, returning the normalized path
/// only when it lies strictly inside `root` (the root itself is rejected).
pub fn join_strictly_inside(root: &Path, name: &Path) -> Option<PathBuf> {
    let root = normalize(root);
    let relative: PathBuf = name
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let joined = normalize(&root.join(relative));
    if joined != root && joined.starts_with(&root) {
        Some(joined)
    } else {
        None
    }
}

/// Split an archive entry name on both separator styles.
pub fn entry_to_relative(name: &str) -> PathBuf {
    name.split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect()
}
