//! The check catalog: named regex rules grouped by domain.
//!
//! Rules are authored as YAML files under `checks/` (one file per group),
//! concatenated by `build.rs` and embedded into the binary. The catalog is
//! compiled once at startup and is read-only for the life of the process.

use std::collections::HashSet;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::errors::{Error, Result};

/// String with all checks from the `checks` folder (prepared in `build.rs`)
/// in YAML format.
const ALL_CHECKS: &str = include_str!(concat!(env!("OUT_DIR"), "/all-checks.yaml"));

/// Severity of a risky pattern.
///
/// The natural ordering (`Low < Medium < High < Critical`) is what the
/// severity allow-list and "highest severity" computations rely on.
#[derive(
    Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// The highest severity in `iter`, or [`Severity::Medium`] when empty.
    #[must_use]
    pub fn highest<I: IntoIterator<Item = Self>>(iter: I) -> Self {
        iter.into_iter().max().unwrap_or_default()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::InvalidSeverityName {
                name: other.to_string(),
            }),
        }
    }
}

/// The kind of verification presented to a human before a risky command is
/// released.
///
/// The ordering reflects strictness: when several matched rules carry a
/// challenge hint, the strictest one wins.
#[derive(
    Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    #[default]
    Confirm,
    Math,
    Word,
    Block,
}

impl std::fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Confirm => "confirm",
            Self::Math => "math",
            Self::Word => "word",
            Self::Block => "block",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ChallengeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // "yes" is the legacy spelling used by rule authors for a plain
        // confirmation.
        match s.trim().to_lowercase().as_str() {
            "confirm" | "yes" => Ok(Self::Confirm),
            "math" => Ok(Self::Math),
            "word" => Ok(Self::Word),
            "block" => Ok(Self::Block),
            other => Err(Error::InvalidChallengeName {
                name: other.to_string(),
            }),
        }
    }
}

/// A runtime condition evaluated after a rule's regex matched.
///
/// All predicates on a rule must pass (logical AND) for the match to be
/// kept. YAML format (adjacently tagged):
///
/// ```yaml
/// predicates:
///   - type: PathExists
///     value: path          # name of a capture group in the rule's regex
///   - type: NotContains
///     value: "--dry-run"
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "value")]
pub enum Predicate {
    /// Keep the match only if the path captured by the named group exists
    /// on disk.
    PathExists(String),
    /// Keep the match only if the command part does **not** contain this
    /// substring.
    NotContains(String),
}

/// A single named rule: compiled pattern, severity and description.
#[derive(Debug, Clone)]
pub struct Check {
    /// Stable identifier of the form `group:name`, unique in the catalog.
    pub id: String,
    /// The domain group this rule belongs to (`fs`, `git`, `docker`, ...).
    pub group: String,
    /// Pattern tested against each sub-command.
    pub test: Regex,
    /// What is risky about a command matching this rule.
    pub description: String,
    pub severity: Severity,
    /// Suggested challenge kind; the caller's configured default applies
    /// when unset.
    pub challenge: Option<ChallengeKind>,
    pub predicates: Vec<Predicate>,
}

/// Serde-facing shape of a rule as authored in YAML. Patterns are kept as
/// strings here so a compile failure can be reported with the offending
/// rule id.
#[derive(Debug, Deserialize)]
struct RawCheck {
    id: String,
    group: String,
    test: String,
    description: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default)]
    challenge: Option<ChallengeKind>,
    #[serde(default)]
    predicates: Vec<Predicate>,
}

impl RawCheck {
    fn compile(self) -> Result<Check> {
        let test = Regex::new(&self.test).map_err(|err| Error::CatalogLoad {
            rule_id: self.id.clone(),
            reason: err.to_string(),
        })?;

        // A PathExists predicate naming a capture group the regex does not
        // define can never pass; reject it at load time.
        for predicate in &self.predicates {
            if let Predicate::PathExists(group) = predicate {
                let known = test
                    .capture_names()
                    .flatten()
                    .any(|name| name == group.as_str());
                if !known {
                    return Err(Error::CatalogLoad {
                        rule_id: self.id,
                        reason: format!("PathExists references unknown capture group {group:?}"),
                    });
                }
            }
        }

        Ok(Check {
            id: self.id,
            group: self.group,
            test,
            description: self.description,
            severity: self.severity,
            challenge: self.challenge,
            predicates: self.predicates,
        })
    }
}

/// The complete, immutable set of checks.
///
/// Created once at startup with [`Catalog::load`] and passed around by
/// reference; there is no mutable global.
#[derive(Debug)]
pub struct Catalog {
    checks: Vec<Check>,
}

impl Catalog {
    /// Compile the embedded rule set.
    ///
    /// # Errors
    /// Returns [`Error::CatalogLoad`] naming the offending rule when a
    /// pattern fails to compile, or [`Error::DuplicateRule`] on an id
    /// collision. Both are fatal at startup.
    pub fn load() -> Result<Self> {
        Self::from_yaml(ALL_CHECKS)
    }

    /// Compile a catalog from YAML text. Used by [`Catalog::load`] and by
    /// tests that want a small scoped rule set.
    ///
    /// # Errors
    /// Same failure modes as [`Catalog::load`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Vec<RawCheck> = serde_yaml::from_str(yaml)?;
        let mut seen = HashSet::new();
        let mut checks = Vec::with_capacity(raw.len());
        for raw_check in raw {
            if !seen.insert(raw_check.id.clone()) {
                return Err(Error::DuplicateRule { id: raw_check.id });
            }
            checks.push(raw_check.compile()?);
        }
        Ok(Self { checks })
    }

    /// Every rule, in catalog order.
    #[must_use]
    pub fn all(&self) -> &[Check] {
        &self.checks
    }

    /// Distinct group names, sorted.
    #[must_use]
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = self
            .checks
            .iter()
            .map(|check| check.group.as_str())
            .collect();
        groups.sort_unstable();
        groups.dedup();
        groups
    }

    /// All rules belonging to `group`.
    pub fn by_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Check> {
        self.checks.iter().filter(move |check| check.group == group)
    }

    /// Look up a rule by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Check> {
        self.checks.iter().find(|check| check.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
