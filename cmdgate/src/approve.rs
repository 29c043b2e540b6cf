//! The approval pipeline: validate, short-circuit deny/block, challenge.
//!
//! Every uncertainty in this path resolves to deny: a transport failure,
//! a timeout, or a missing verdict never releases the command.

use std::time::Duration;

use serde_derive::Serialize;
use tracing::{debug, warn};

use cmdgate_core::{
    strongest_hint, validate, Catalog, ChallengeKind, PathProbe, ValidationOptions,
    ValidationResult,
};

use crate::{
    challenge::{self, ChallengeData, ChallengeOptions, DEFAULT_TIMEOUT},
    error::Result,
};

pub const REASON_POLICY_VIOLATION: &str = "security policy violation";
pub const REASON_BLOCKED: &str = "blocked by policy";
pub const REASON_USER_DENIAL: &str = "user denial";

#[derive(Debug, Clone)]
pub struct ApproveOptions {
    pub validation: ValidationOptions,
    /// Challenge kind used when no matched rule carries a hint.
    pub challenge: ChallengeKind,
    pub timeout: Duration,
    pub open_browser: bool,
}

impl Default for ApproveOptions {
    fn default() -> Self {
        Self {
            validation: ValidationOptions::default(),
            challenge: ChallengeKind::Confirm,
            timeout: DEFAULT_TIMEOUT,
            open_browser: true,
        }
    }
}

/// Final answer of the gate for one command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalOutcome {
    #[must_use]
    pub const fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Screen `command` and, when needed, collect a human verdict.
///
/// Returns the outcome together with the validation result so callers can
/// surface the matched rules.
///
/// # Errors
/// [`crate::error::Error::Engine`] with `EmptyCommand` for blank input.
/// Challenge transport failures are folded into a denied outcome, never
/// propagated: the command must not run on an inconclusive challenge.
pub async fn approve(
    catalog: &Catalog,
    command: &str,
    options: &ApproveOptions,
    probe: &dyn PathProbe,
) -> Result<(ApprovalOutcome, ValidationResult)> {
    let result = validate(catalog, command, &options.validation, probe)?;

    if !result.should_challenge {
        debug!(command, "no rule fired; allowing");
        return Ok((ApprovalOutcome::allowed(), result));
    }

    if result.should_deny {
        debug!(command, "deny-listed rule fired");
        return Ok((ApprovalOutcome::denied(REASON_POLICY_VIOLATION), result));
    }

    let kind = strongest_hint(catalog, &result).unwrap_or(options.challenge);
    if kind == ChallengeKind::Block {
        return Ok((ApprovalOutcome::denied(REASON_BLOCKED), result));
    }

    let data = ChallengeData {
        command: command.to_string(),
        matches: result.matches.clone(),
        highest_severity: result.highest_severity(),
    };
    let challenge_options = ChallengeOptions {
        timeout: options.timeout,
        open_browser: options.open_browser,
    };

    let verdict = match challenge::run(kind, data, &challenge_options).await {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!(%err, "challenge could not be served; denying");
            return Ok((
                ApprovalOutcome::denied("challenge system error"),
                result,
            ));
        }
    };

    let outcome = if verdict.approved {
        ApprovalOutcome::allowed()
    } else {
        ApprovalOutcome::denied(
            verdict
                .reason
                .unwrap_or_else(|| REASON_USER_DENIAL.to_string()),
        )
    };
    Ok((outcome, result))
}

#[cfg(test)]
mod tests {
    use cmdgate_core::MockPathProbe;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::load().unwrap()
    }

    fn probe() -> MockPathProbe {
        MockPathProbe {
            cwd: "/mock/workspace".into(),
            ..Default::default()
        }
    }

    fn options() -> ApproveOptions {
        ApproveOptions {
            // Keep any accidental challenge short in unit tests.
            timeout: Duration::from_millis(100),
            open_browser: false,
            ..Default::default()
        }
    }

    fn run<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn safe_command_is_allowed_without_challenge() {
        let (outcome, result) =
            run(approve(&catalog(), "echo hello", &options(), &probe())).unwrap();
        assert_eq!(outcome, ApprovalOutcome::allowed());
        assert!(!result.should_challenge);
    }

    #[test]
    fn empty_command_is_an_engine_error() {
        let err = run(approve(&catalog(), "  ", &options(), &probe())).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Engine(cmdgate_core::Error::EmptyCommand)
        ));
    }

    #[test]
    fn deny_listed_match_denies_without_challenge() {
        let mut opts = options();
        opts.validation.deny_pattern_ids = vec!["git:force_push".to_string()];
        let (outcome, result) =
            run(approve(&catalog(), "git push --force", &opts, &probe())).unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_POLICY_VIOLATION));
        assert!(result.should_deny);
    }

    #[test]
    fn block_challenge_type_denies_without_serving() {
        let mut opts = options();
        opts.challenge = ChallengeKind::Block;
        let (outcome, _) = run(approve(&catalog(), "rm -rf /tmp/x", &opts, &probe())).unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_BLOCKED));
    }

    #[test]
    fn block_hint_on_rule_overrides_configured_kind() {
        // base:fork_bomb carries a block hint; the configured kind is confirm.
        let (outcome, _) = run(approve(
            &catalog(),
            ":(){ :|:& };:",
            &options(),
            &probe(),
        ))
        .unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_BLOCKED));
    }

    #[test]
    fn unanswered_challenge_times_out_to_deny() {
        let opts = options();
        let started = std::time::Instant::now();
        let (outcome, _) = run(approve(&catalog(), "rm -rf /tmp/x", &opts, &probe())).unwrap();
        assert!(!outcome.allowed);
        assert_eq!(outcome.reason.as_deref(), Some("timeout"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn severity_filter_lets_low_risk_commands_through() {
        let mut opts = options();
        opts.validation.allowed_severities =
            vec![cmdgate_core::Severity::High, cmdgate_core::Severity::Critical];
        let (outcome, result) = run(approve(&catalog(), "git add .", &opts, &probe())).unwrap();
        assert_eq!(outcome, ApprovalOutcome::allowed());
        assert!(!result.should_challenge);
    }
}
