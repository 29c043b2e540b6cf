//! Matching, filtering and the allow / challenge / deny decision.

use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;

use crate::{
    checks::{Catalog, ChallengeKind, Check, Severity},
    command,
    errors::{Error, Result},
    filters::{self, PathProbe},
};

/// Balanced single- or double-quoted string literals. Stripped from the
/// matcher's input so patterns never fire on quoted text; unbalanced quotes
/// are left alone and handled by the splitter's whole-input fallback.
fn quoted_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("static pattern"))
}

/// Per-call screening options. Caller-owned, never retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Severities to keep. Empty means "all".
    pub allowed_severities: Vec<Severity>,
    /// Check ids that, when matched, force a deny verdict.
    pub deny_pattern_ids: Vec<String>,
}

/// Projection of a matched [`Check`] for result payloads; carries no regex
/// state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: String,
    pub group: String,
    pub severity: Severity,
    pub description: String,
}

impl MatchRecord {
    fn from_check(check: &Check) -> Self {
        Self {
            id: check.id.clone(),
            group: check.group.clone(),
            severity: check.severity,
            description: check.description.clone(),
        }
    }
}

/// The tri-state verdict of one validation call.
///
/// `should_deny` implies `should_challenge`: a deny is always backed by a
/// rule that actually fired.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub matches: Vec<MatchRecord>,
    pub should_challenge: bool,
    pub should_deny: bool,
}

impl ValidationResult {
    /// A result for a command no rule fired on.
    #[must_use]
    pub const fn safe() -> Self {
        Self {
            matches: Vec::new(),
            should_challenge: false,
            should_deny: false,
        }
    }

    /// The highest severity among the matches ([`Severity::Medium`] when
    /// there are none).
    #[must_use]
    pub fn highest_severity(&self) -> Severity {
        Severity::highest(self.matches.iter().map(|m| m.severity))
    }
}

/// Run every check's regex against a single command part.
///
/// Returns matches in catalog iteration order; each rule contributes at
/// most one entry.
#[must_use]
pub fn match_part<'a>(checks: &'a [Check], part: &str) -> Vec<&'a Check> {
    checks
        .par_iter()
        .filter(|check| check.test.is_match(part))
        .collect()
}

/// Validate a command: strip quoted literals, split, match every part,
/// filter, decide.
///
/// The returned match set is the union over all parts; a rule firing on
/// several parts is reported once. Predicates are evaluated per
/// occurrence, so a rule whose predicate fails on one part is still kept
/// when another part's occurrence survives. The result is a pure function
/// of `(command, options, catalog)` plus whatever the probe answers.
///
/// # Errors
/// [`Error::EmptyCommand`] when the command is blank.
pub fn validate(
    catalog: &Catalog,
    command: &str,
    options: &ValidationOptions,
    probe: &dyn PathProbe,
) -> Result<ValidationResult> {
    if command.trim().is_empty() {
        return Err(Error::EmptyCommand);
    }

    let stripped = quoted_literal_regex().replace_all(command, "");
    let parts = command::split(&stripped);

    let kept: Vec<&Check> = catalog
        .all()
        .par_iter()
        .filter(|check| {
            options.allowed_severities.is_empty()
                || options.allowed_severities.contains(&check.severity)
        })
        .filter(|check| {
            parts.iter().any(|part| {
                check.test.is_match(part) && filters::evaluate_predicates(check, part, probe)
            })
        })
        .collect();

    Ok(decide(&kept, options))
}

/// Produce the tri-state verdict from the filtered match set.
fn decide(kept: &[&Check], options: &ValidationOptions) -> ValidationResult {
    let matches: Vec<MatchRecord> = kept.iter().map(|check| MatchRecord::from_check(check)).collect();
    let should_challenge = !matches.is_empty();
    let should_deny = should_challenge
        && kept
            .iter()
            .any(|check| options.deny_pattern_ids.iter().any(|id| *id == check.id));

    ValidationResult {
        matches,
        should_challenge,
        should_deny,
    }
}

/// The strictest challenge hint among the matched rules, if any carries
/// one. The caller's configured kind applies otherwise.
#[must_use]
pub fn strongest_hint(catalog: &Catalog, result: &ValidationResult) -> Option<ChallengeKind> {
    result
        .matches
        .iter()
        .filter_map(|record| catalog.get(&record.id))
        .filter_map(|check| check.challenge)
        .max()
}
