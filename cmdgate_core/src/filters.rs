//! Runtime predicate evaluation.
//!
//! Predicates run after a rule's regex matched and can suppress the match.
//! Filesystem access goes through the [`PathProbe`] capability so callers
//! and tests can inject a deterministic resolver; the default implementation
//! is a real `stat`.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::checks::{Check, Predicate};

/// Capability for answering "does this path exist?" plus the bits of
/// ambient state needed to resolve a captured path.
pub trait PathProbe: Sync {
    /// Check if a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// The directory relative paths are resolved against.
    fn current_dir(&self) -> Option<PathBuf>;

    /// The user's home directory, for `~` expansion.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Production probe backed by the real filesystem.
pub struct RealPathProbe;

impl PathProbe for RealPathProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn current_dir(&self) -> Option<PathBuf> {
        std::env::current_dir().ok()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}

/// Fully in-memory probe for tests.
#[derive(Debug, Clone, Default)]
pub struct MockPathProbe {
    pub existing_paths: HashSet<PathBuf>,
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
}

impl PathProbe for MockPathProbe {
    fn exists(&self, path: &Path) -> bool {
        self.existing_paths.contains(path)
    }

    fn current_dir(&self) -> Option<PathBuf> {
        Some(self.cwd.clone())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }
}

/// Evaluate all predicates of `check` against the command part it matched.
///
/// Returns `true` when the match should be kept. A predicate that cannot
/// be evaluated conclusively keeps the match (the rule still alerts);
/// a `PathExists` whose captured path is absent drops it.
#[must_use]
pub fn evaluate_predicates(check: &Check, part: &str, probe: &dyn PathProbe) -> bool {
    if check.predicates.is_empty() {
        return true;
    }

    let Some(caps) = check.test.captures(part) else {
        return true;
    };

    for predicate in &check.predicates {
        let keep = match predicate {
            Predicate::PathExists(group) => caps
                .name(group)
                .map(|m| m.as_str())
                .filter(|captured| !captured.trim().is_empty())
                .is_some_and(|captured| captured_path_exists(captured, probe)),
            Predicate::NotContains(needle) => !part.contains(needle.as_str()),
        };
        if !keep {
            return false;
        }
    }

    true
}

/// Resolve a captured path (tilde expansion, cwd join) and probe it.
fn captured_path_exists(captured: &str, probe: &dyn PathProbe) -> bool {
    let trimmed = captured.trim();

    let expanded: PathBuf = if let Some(rest) = trimmed.strip_prefix('~') {
        match probe.home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            // No home to expand against: keep the match rather than guess.
            None => return true,
        }
    } else {
        PathBuf::from(trimmed)
    };

    // Wildcards cannot be probed conclusively; keep the match.
    if expanded.to_string_lossy().contains('*') {
        return true;
    }

    let full_path = if expanded.is_absolute() {
        expanded
    } else {
        match probe.current_dir() {
            Some(cwd) => cwd.join(expanded),
            None => return true,
        }
    };

    probe.exists(&full_path)
}
