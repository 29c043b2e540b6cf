//! End-to-end scenarios through the public approval API.

use std::time::{Duration, Instant};

use cmdgate::{
    approve, validate, ApprovalOutcome, ApproveOptions, Catalog, ChallengeKind, MockPathProbe,
    Severity, ValidationOptions,
};

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
        timeout: Duration::from_millis(200),
        open_browser: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn safe_command_allows_without_a_challenge() {
    let started = Instant::now();
    let (outcome, result) = approve(&catalog(), "echo hello", &options(), &probe())
        .await
        .unwrap();
    assert_eq!(outcome, ApprovalOutcome::allowed());
    assert!(result.matches.is_empty());
    assert!(!result.should_challenge);
    assert!(!result.should_deny);
    // No session was opened, so no deadline was waited on.
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn critical_command_is_flagged_for_challenge() {
    let result = validate(
        &catalog(),
        "rm -rf /",
        &ValidationOptions::default(),
        &probe(),
    )
    .unwrap();
    assert!(result.should_challenge);
    assert!(!result.should_deny);
    assert!(result.matches.iter().any(|m| m.id == "fs:recursively_delete"));
    assert_eq!(result.highest_severity(), Severity::Critical);
}

#[tokio::test]
async fn compound_command_screens_every_part() {
    let result = validate(
        &catalog(),
        "echo ok && rm -rf /",
        &ValidationOptions::default(),
        &probe(),
    )
    .unwrap();
    assert!(result.should_challenge);
    assert!(result.matches.iter().any(|m| m.id == "fs:recursively_delete"));
}

#[tokio::test]
async fn deny_listed_id_short_circuits_to_policy_violation() {
    let mut opts = options();
    opts.validation.deny_pattern_ids = vec!["git:force_push".to_string()];

    let started = Instant::now();
    let (outcome, result) = approve(&catalog(), "git push --force", &opts, &probe())
        .await
        .unwrap();
    assert!(!outcome.allowed);
    assert_eq!(outcome.reason.as_deref(), Some("security policy violation"));
    assert!(result.should_challenge);
    assert!(result.should_deny);
    // Denied without serving a challenge.
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn severity_filter_allows_low_risk_through() {
    let mut opts = options();
    opts.validation.allowed_severities = vec![Severity::Critical, Severity::High];

    let (outcome, result) = approve(&catalog(), "git add .", &opts, &probe())
        .await
        .unwrap();
    assert_eq!(outcome, ApprovalOutcome::allowed());
    assert!(!result.should_challenge);
}

#[tokio::test]
async fn unanswered_challenge_denies_with_timeout_reason() {
    let started = Instant::now();
    let (outcome, _) = approve(&catalog(), "rm -rf /tmp/x", &options(), &probe())
        .await
        .unwrap();
    assert!(!outcome.allowed);
    assert_eq!(outcome.reason.as_deref(), Some("timeout"));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn block_challenge_type_denies_without_a_session() {
    let mut opts = options();
    opts.challenge = ChallengeKind::Block;

    let started = Instant::now();
    let (outcome, _) = approve(&catalog(), "rm -rf /tmp/x", &opts, &probe())
        .await
        .unwrap();
    assert!(!outcome.allowed);
    assert_eq!(outcome.reason.as_deref(), Some("blocked by policy"));
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn empty_command_is_reported_as_such() {
    let err = approve(&catalog(), "", &options(), &probe()).await.unwrap_err();
    assert!(matches!(
        err,
        cmdgate::Error::Engine(cmdgate_core::Error::EmptyCommand)
    ));
}

#[tokio::test]
async fn identical_calls_yield_identical_matches() {
    let opts = ValidationOptions {
        allowed_severities: vec![Severity::High, Severity::Critical],
        deny_pattern_ids: vec!["git:force_push".into()],
    };
    let catalog = catalog();
    let first = validate(&catalog, "git push -f && rm -rf /", &opts, &probe()).unwrap();
    let second = validate(&catalog, "git push -f && rm -rf /", &opts, &probe()).unwrap();
    assert_eq!(first.matches, second.matches);
    assert_eq!(first.should_deny, second.should_deny);
}
