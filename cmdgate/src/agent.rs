//! Non-interactive decisions for agent callers.
//!
//! AI coding agents cannot solve interactive challenges. This module
//! decides from severity thresholds instead: deny-listed rules and matches
//! at or above the configured threshold are denied, everything else
//! passes, and the caller is told when a human approval could still
//! release the command.

use serde_derive::Serialize;
use tracing::debug;

use cmdgate_core::{
    validate, Catalog, MatchRecord, PathProbe, Severity, ValidationOptions, ValidationResult,
};

use crate::{approve::REASON_POLICY_VIOLATION, error::Result};

/// Thresholds for unattended decisions.
#[derive(Debug, Clone)]
pub struct AgentPolicy {
    /// Matches at or above this severity are denied outright.
    pub auto_deny_severity: Severity,
    /// Report threshold denials as resolvable by a human, so the caller
    /// can retry with an interactive approval.
    pub require_human_approval: bool,
}

impl Default for AgentPolicy {
    fn default() -> Self {
        Self {
            auto_deny_severity: Severity::High,
            require_human_approval: true,
        }
    }
}

/// Structured outcome returned to agent callers.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    /// Whether the command may proceed without further interaction.
    pub allowed: bool,
    /// Highest severity among matched rules; absent when nothing fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Details of each matched rule.
    pub matched_rules: Vec<MatchRecord>,
    /// Whether an interactive approval could still release the command.
    pub requires_human_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
}

/// Screen a command and decide without human interaction.
///
/// # Errors
/// [`crate::error::Error::Engine`] with `EmptyCommand` for blank input.
pub fn assess(
    catalog: &Catalog,
    command: &str,
    options: &ValidationOptions,
    policy: &AgentPolicy,
    probe: &dyn PathProbe,
) -> Result<RiskAssessment> {
    let result = validate(catalog, command, options, probe)?;
    let assessment = build_assessment(&result, policy);
    debug!(
        command,
        allowed = assessment.allowed,
        "non-interactive assessment"
    );
    Ok(assessment)
}

fn build_assessment(result: &ValidationResult, policy: &AgentPolicy) -> RiskAssessment {
    let severity = if result.matches.is_empty() {
        None
    } else {
        Some(result.highest_severity())
    };

    let (allowed, denial_reason) = if result.should_deny {
        (false, Some(REASON_POLICY_VIOLATION.to_string()))
    } else if result.matches.is_empty() {
        (true, None)
    } else if result.highest_severity() >= policy.auto_deny_severity {
        (
            false,
            Some(format!(
                "severity {} meets the auto-deny threshold {}",
                result.highest_severity(),
                policy.auto_deny_severity
            )),
        )
    } else {
        (true, None)
    };

    RiskAssessment {
        allowed,
        severity,
        matched_rules: result.matches.clone(),
        // Deny-listed commands stay denied even with a human in the loop.
        requires_human_approval: policy.require_human_approval && !allowed && !result.should_deny,
        denial_reason,
    }
}
