//! cmdgate core: the command validation engine.
//!
//! Pure screening logic: the embedded check catalog, the quote-aware
//! command splitter, regex matching, predicate filtering and the
//! allow / challenge / deny decision. No network, no terminal; filesystem
//! access only through the injected [`PathProbe`].

pub mod checks;
pub mod command;
pub mod errors;
pub mod filters;
pub mod validate;

pub use checks::{Catalog, ChallengeKind, Check, Predicate, Severity};
pub use errors::{Error, Result};
pub use filters::{MockPathProbe, PathProbe, RealPathProbe};
pub use validate::{
    match_part, strongest_hint, validate, MatchRecord, ValidationOptions, ValidationResult,
};
