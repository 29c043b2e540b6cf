pub mod approve;
pub mod check;
pub mod default;
pub mod exec;
pub mod mcp;

use cmdgate::{ChallengeKind, Severity};

/// Exit status and optional message of a subcommand.
pub struct CmdExit {
    pub code: i32,
    pub message: Option<String>,
}

/// Parse a `low,medium,...` severity list. `None` means no filter.
pub(crate) fn parse_severity_csv(raw: Option<&String>) -> anyhow::Result<Vec<Severity>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.parse::<Severity>().map_err(Into::into))
        .collect()
}

/// Parse a comma-separated list of check ids.
pub(crate) fn parse_id_csv(raw: Option<&String>) -> Vec<String> {
    raw.map(String::as_str)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a challenge name, falling back to `confirm` with a warning on
/// unrecognized values.
pub(crate) fn parse_challenge_lenient(raw: &str) -> ChallengeKind {
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(value = raw, "unrecognized challenge type, falling back to confirm");
        ChallengeKind::Confirm
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_csv_parses_and_trims() {
        let parsed = parse_severity_csv(Some(&"critical, high".to_string())).unwrap();
        assert_eq!(parsed, vec![Severity::Critical, Severity::High]);
        assert!(parse_severity_csv(None).unwrap().is_empty());
        assert!(parse_severity_csv(Some(&"critical,banana".to_string())).is_err());
    }

    #[test]
    fn id_csv_drops_empty_entries() {
        let parsed = parse_id_csv(Some(&"git:force_push,,fs:recursively_delete, ".to_string()));
        assert_eq!(parsed, vec!["git:force_push", "fs:recursively_delete"]);
        assert!(parse_id_csv(None).is_empty());
    }

    #[test]
    fn challenge_parse_falls_back_to_confirm() {
        assert_eq!(parse_challenge_lenient("math"), ChallengeKind::Math);
        assert_eq!(parse_challenge_lenient("bogus"), ChallengeKind::Confirm);
    }
}
