//! YAML-driven decision scenarios.
//!
//! Each scenario defines a (command, options) pair and the expected
//! verdict. See `tests/decisions/matrix.yaml`.

use serde_derive::Deserialize;

use cmdgate::{validate, Catalog, MockPathProbe, Severity, ValidationOptions};

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    command: String,
    #[serde(default)]
    options: ScenarioOptions,
    expected: Expected,
}

#[derive(Debug, Deserialize, Default)]
struct ScenarioOptions {
    #[serde(default)]
    allowed_severities: Vec<String>,
    #[serde(default)]
    deny_pattern_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Expected {
    #[serde(default)]
    matched_ids: Vec<String>,
    #[serde(default)]
    not_matched_ids: Vec<String>,
    #[serde(default)]
    should_challenge: Option<bool>,
    #[serde(default)]
    should_deny: Option<bool>,
}

impl ScenarioOptions {
    fn to_validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            allowed_severities: self
                .allowed_severities
                .iter()
                .map(|name| name.parse::<Severity>().expect("severity name in matrix"))
                .collect(),
            deny_pattern_ids: self.deny_pattern_ids.clone(),
        }
    }
}

#[test]
fn decision_matrix() {
    let yaml = std::fs::read_to_string("tests/decisions/matrix.yaml")
        .expect("could not read matrix.yaml");
    let scenarios: Vec<Scenario> =
        serde_yaml::from_str(&yaml).expect("could not parse matrix.yaml");

    let catalog = Catalog::load().expect("catalog");
    let probe = MockPathProbe {
        cwd: "/mock/workspace".into(),
        ..Default::default()
    };

    for scenario in &scenarios {
        let options = scenario.options.to_validation_options();
        let result = validate(&catalog, &scenario.command, &options, &probe)
            .unwrap_or_else(|err| panic!("FAILED [{}]: {err}", scenario.name));

        let matched_ids: Vec<&str> = result.matches.iter().map(|m| m.id.as_str()).collect();

        for expected_id in &scenario.expected.matched_ids {
            assert!(
                matched_ids.contains(&expected_id.as_str()),
                "FAILED [{}]: expected {expected_id} in {matched_ids:?}",
                scenario.name
            );
        }
        for unexpected_id in &scenario.expected.not_matched_ids {
            assert!(
                !matched_ids.contains(&unexpected_id.as_str()),
                "FAILED [{}]: did not expect {unexpected_id} in {matched_ids:?}",
                scenario.name
            );
        }
        if let Some(expected) = scenario.expected.should_challenge {
            assert_eq!(
                result.should_challenge, expected,
                "FAILED [{}]: wrong should_challenge (matches: {matched_ids:?})",
                scenario.name
            );
        }
        if let Some(expected) = scenario.expected.should_deny {
            assert_eq!(
                result.should_deny, expected,
                "FAILED [{}]: wrong should_deny",
                scenario.name
            );
        }
    }
}
