use super::{CheckResult, SecurityPolicy};
use crate::provider::CommandSpec;
use std::path::{Component, Path, PathBuf};

impl SecurityPolicy {
    /// Standalone path check: restricted paths deny outright, read-only
    /// paths require authorization for write access.
    pub fn check_path_access(&self, path: &str, write: bool) -> CheckResult {
        if self.is_restricted_path(path) {
            return CheckResult::denied(format!("path {path} is restricted"));
        }
        if self.is_readonly_path(path, write) {
            return CheckResult::needs_auth(
                format!("path {path} is read-only"),
                "write operation on a read-only path",
            );
        }
        CheckResult::pass()
    }

    pub(crate) fn is_restricted_path(&self, candidate: &str) -> bool {
        let canonical = canonicalize_path(candidate);
        self.restricted_paths
            .iter()
            .any(|restricted| canonical.starts_with(canonicalize_path(restricted)))
    }

    pub(crate) fn is_readonly_path(&self, candidate: &str, write: bool) -> bool {
        if !write {
            return false;
        }
        let canonical = canonicalize_path(candidate);
        self.readonly_paths
            .iter()
            .any(|readonly| canonical.starts_with(canonicalize_path(readonly)))
    }
}

/// Candidate paths from a command: every token containing `/` or `~` that is
/// not flag-like. The program itself counts (it may name a restricted file).
pub(crate) fn extract_paths(cmd: &CommandSpec) -> Vec<String> {
    std::iter::once(cmd.cmd.as_str())
        .chain(cmd.args.iter().map(String::as_str))
        .filter(|token| !token.starts_with('-'))
        .filter(|token| token.contains('/') || token.contains('~'))
        .map(ToString::to_string)
        .collect()
}

/// Expand `~`, make absolute, lexically normalize, then resolve symlinks by
/// walking up to the nearest existing ancestor. Comparing canonical forms
/// keeps a symlink from smuggling a path out from under a policy prefix.
pub(crate) fn canonicalize_path(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path).into_owned();
    let absolute = if Path::new(&expanded).is_absolute() {
        PathBuf::from(expanded)
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or_else(|_| PathBuf::from(expanded))
    };
    resolve_existing_prefix(&normalize(&absolute))
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve symlinks for the longest existing prefix of `path`, then rebuild
/// the non-existent tail on top of it.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    if let Ok(resolved) = path.canonicalize() {
        return resolved;
    }
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return path.to_path_buf();
    };
    resolve_existing_prefix(parent).join(name)
}
