use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("rule {rule_id}: {reason}")]
    CatalogLoad { rule_id: String, reason: String },

    #[error("duplicate rule id in catalog: {id}")]
    DuplicateRule { id: String },

    #[error("empty command")]
    EmptyCommand,

    #[error("given challenge name not found: {name}")]
    InvalidChallengeName { name: String },

    #[error("given severity name not found: {name}")]
    InvalidSeverityName { name: String },

    #[error("failed to parse checks YAML: {source}")]
    CatalogParse {
        #[from]
        source: serde_yaml::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
