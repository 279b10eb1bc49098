//! Error types for the triage engine
//!
//! Every failure here is scoped to one ticket or one rule. "No eligible agent" is
//! not an error: it is a [`RoutingResult`](crate::routing::RoutingResult) with no
//! agent.

use thiserror::Error;

use crate::agent::AgentId;

#[derive(Debug, Error)]
pub enum TriageError {
    /// Required ticket fields are missing or out of range; the ticket should be
    /// held for manual handling.
    #[error("Invalid ticket input: {0}")]
    InvalidInput(String),

    /// A rule (or keyword list) is malformed. Raised per rule and never aborts a
    /// whole evaluation pass.
    #[error("Configuration error in rule '{rule_id}': {reason}")]
    Configuration { rule_id: String, reason: String },

    /// Engine configuration failed validation
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Another routing pass took the agent's last slot first
    #[error("Reservation conflict for agent {0}")]
    ReservationConflict(AgentId),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(AgentId),

    #[error(transparent)]
    Infra(#[from] deskroute_infra_common::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    pub fn configuration(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        TriageError::Configuration {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// Transient errors are retried against the next candidate
    pub fn is_transient(&self) -> bool {
        matches!(self, TriageError::ReservationConflict(_))
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
