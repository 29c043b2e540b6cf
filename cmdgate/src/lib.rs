//! cmdgate: a safety gate between a shell (or an AI agent) and the
//! operating system.
//!
//! Screens candidate command lines against the risky-pattern catalog,
//! collects human approval for risky ones over a loopback challenge page,
//! and executes approved commands with an explicitly constructed
//! environment.

pub mod agent;
pub mod approve;
pub mod challenge;
pub mod error;
pub mod exec;
pub mod mcp;
pub mod page;

// Re-export engine types for callers of the public API.
pub use cmdgate_core::{
    validate, Catalog, ChallengeKind, Check, MatchRecord, MockPathProbe, PathProbe, Predicate,
    RealPathProbe, Severity, ValidationOptions, ValidationResult,
};

pub use agent::{assess, AgentPolicy, RiskAssessment};
pub use approve::{approve, ApprovalOutcome, ApproveOptions};
pub use challenge::{
    CancelHandle, ChallengeData, ChallengeOptions, PendingChallenge, Verdict, DEFAULT_TIMEOUT,
};
pub use error::{Error, Result};
pub use exec::{exec_if_allowed, ExecOutcome, ExecPolicy};
pub use mcp::McpServer;
