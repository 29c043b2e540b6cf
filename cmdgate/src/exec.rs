//! Execution façade: run an approved command with an explicitly
//! constructed environment.
//!
//! The child environment is never a filtered copy of the process
//! environment. It is built up from nothing: allow-listed names first,
//! then the caller's explicit entries, which win on collision.

use std::{collections::HashMap, path::PathBuf, process::Stdio};

use serde_derive::Serialize;
use tokio::process::Command;
use tracing::debug;

use cmdgate_core::{Catalog, PathProbe};

use crate::{
    approve::{approve, ApproveOptions},
    error::Result,
};

/// Where and with what environment an approved command runs.
#[derive(Debug, Clone, Default)]
pub struct ExecPolicy {
    pub cwd: Option<PathBuf>,
    /// Explicit variables for the child. Win over allow-listed values.
    pub env: HashMap<String, String>,
    /// Process-environment names the child may inherit. Empty means the
    /// child sees only the explicit `env`.
    pub env_allow_list: Vec<String>,
}

/// Result of one execution attempt.
///
/// `allowed=true` with a populated `error` means the command was admitted
/// but failed on its own; the gate does not re-judge it.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    pub allowed: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecOutcome {
    fn denied(reason: Option<String>) -> Self {
        Self {
            allowed: false,
            stdout: String::new(),
            stderr: String::new(),
            error: reason,
        }
    }
}

/// Build the child environment from the policy and the given host
/// environment snapshot.
#[must_use]
pub fn build_child_env_from(
    policy: &ExecPolicy,
    host: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut child_env = HashMap::new();
    for name in &policy.env_allow_list {
        if let Some(value) = host.get(name) {
            child_env.insert(name.clone(), value.clone());
        }
    }
    for (key, value) in &policy.env {
        child_env.insert(key.clone(), value.clone());
    }
    child_env
}

/// Build the child environment against the real process environment.
#[must_use]
pub fn build_child_env(policy: &ExecPolicy) -> HashMap<String, String> {
    let host: HashMap<String, String> = std::env::vars().collect();
    build_child_env_from(policy, &host)
}

/// Run an already-approved command through the platform shell.
pub async fn run_approved(command: &str, policy: &ExecPolicy) -> ExecOutcome {
    let child_env = build_child_env(policy);
    debug!(command, env_keys = ?child_env.keys().collect::<Vec<_>>(), "spawning");

    #[cfg(windows)]
    let mut shell = {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    };
    #[cfg(not(windows))]
    let mut shell = {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    };

    shell
        .env_clear()
        .envs(&child_env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(ref cwd) = policy.cwd {
        shell.current_dir(cwd);
    }

    match shell.output().await {
        Ok(output) => ExecOutcome {
            allowed: true,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            error: if output.status.success() {
                None
            } else {
                Some(format!("command exited with {}", output.status))
            },
        },
        Err(err) => ExecOutcome {
            allowed: true,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(err.to_string()),
        },
    }
}

/// The gate's sole outward effect: screen the command and execute it only
/// on an allow verdict.
///
/// # Errors
/// [`crate::error::Error::Engine`] with `EmptyCommand` for blank input.
pub async fn exec_if_allowed(
    catalog: &Catalog,
    command: &str,
    options: &ApproveOptions,
    policy: &ExecPolicy,
    probe: &dyn PathProbe,
) -> Result<ExecOutcome> {
    let (outcome, _) = approve(catalog, command, options, probe).await?;
    if !outcome.allowed {
        return Ok(ExecOutcome::denied(outcome.reason));
    }
    Ok(run_approved(command, policy).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn empty_allow_list_exposes_only_explicit_env() {
        let policy = ExecPolicy {
            env: host_env(&[("CUSTOM", "yes")]),
            ..Default::default()
        };
        let host = host_env(&[("PATH", "/test/path"), ("HOME", "/x"), ("SECRET", "s")]);
        let child = build_child_env_from(&policy, &host);
        assert_eq!(child, host_env(&[("CUSTOM", "yes")]));
    }

    #[test]
    fn allow_list_inherits_named_variables_only() {
        let policy = ExecPolicy {
            env: host_env(&[("CUSTOM", "yes")]),
            env_allow_list: vec!["PATH".into(), "SSH_AUTH_SOCK".into()],
            ..Default::default()
        };
        let host = host_env(&[("PATH", "/test/path"), ("HOME", "/x")]);
        let child = build_child_env_from(&policy, &host);
        assert_eq!(
            child,
            host_env(&[("PATH", "/test/path"), ("CUSTOM", "yes")])
        );
        assert!(!child.contains_key("HOME"));
        assert!(!child.contains_key("SSH_AUTH_SOCK"));
    }

    #[test]
    fn explicit_env_wins_on_collision() {
        let policy = ExecPolicy {
            env: host_env(&[("PATH", "/explicit/wins")]),
            env_allow_list: vec!["PATH".into()],
            ..Default::default()
        };
        let host = host_env(&[("PATH", "/from/host")]);
        let child = build_child_env_from(&policy, &host);
        assert_eq!(child.get("PATH").map(String::as_str), Some("/explicit/wins"));
    }
}
