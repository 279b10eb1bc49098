//! # deskroute triage engine
//!
//! The decision core of the deskroute support desk: it turns a classified,
//! sentiment-scored support ticket into a priority and an agent assignment.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────────┐
//! │    Signal    │──►│   Priority   │──►│    Rule    │──►│   Routing    │
//! │  Extractor   │   │    Scorer    │   │   Engine   │   │    Engine    │
//! └──────────────┘   └──────────────┘   └────────────┘   └──────┬───────┘
//!                                                                │ reserve/release
//!                                                        ┌───────▼───────┐
//!                                                        │Agent Directory│
//!                                                        └───────────────┘
//! ```
//!
//! - [`signals`]: keyword and text-pattern signals from ticket text
//! - [`priority`]: weighted 1..=5 priority with explainable factor tags
//! - [`rules`]: ordered operator rules emitting escalate/reassign/skip_queue/notify/boost actions
//! - [`agent`]: agent snapshots, hard-constraint lookup and per-agent load accounting
//! - [`routing`]: weighted candidate ranking with deterministic tie-breaks
//! - [`pipeline`]: the stages wired together, single ticket or batch
//!
//! Everything except agent load is pure: the same ticket, rules and configuration
//! always produce the same priority, factors and action sequence.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use deskroute_triage_engine::prelude::*;
//!
//! let directory = Arc::new(AgentDirectory::new());
//! directory
//!     .register(
//!         Agent::new("agent-001", "Alice")
//!             .with_skills([Category::BugReport])
//!             .with_status(AgentStatus::Online)
//!             .critical_authorized(),
//!     )
//!     .unwrap();
//!
//! let pipeline = TriagePipeline::new(TriageConfig::default(), directory).unwrap();
//! let rules = pipeline.compile_rules(&default_rules());
//!
//! let ticket = Ticket::new("T-1", "Export is broken, urgent!", Category::BugReport, CustomerTier::Standard);
//! let outcome = pipeline.process(ticket, &rules).unwrap();
//!
//! assert_eq!(outcome.evaluation.priority.value(), 5);
//! assert_eq!(outcome.routing.team.as_deref(), Some("technical_support"));
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod priority;
pub mod routing;
pub mod rules;
pub mod signals;
pub mod ticket;

pub use agent::{Agent, AgentDirectory, AgentId, AgentStatus, CandidateQuery, Clock, DirectoryStats, FixedClock, SystemClock, WorkingHours};
pub use config::TriageConfig;
pub use error::{Result, TriageError};
pub use pipeline::{Evaluation, TriageOutcome, TriagePipeline};
pub use priority::{FactorTag, OverrideDirection, PriorityOutcome, PriorityScorer};
pub use routing::{AlternativeCandidate, RankedCandidate, RoutingEngine, RoutingReason, RoutingResult};
pub use rules::{default_rules, ActionKind, EmittedAction, RuleDefinition, RuleEngine, RuleOutcome, RuleSet};
pub use signals::{SignalExtractor, SignalSet};
pub use ticket::{Category, CustomerTier, PriorityLevel, PriorityScore, SentimentLabel, Ticket, TicketId};

pub mod prelude {
    pub use crate::agent::{Agent, AgentDirectory, AgentId, AgentStatus, WorkingHours};
    pub use crate::config::TriageConfig;
    pub use crate::error::{Result, TriageError};
    pub use crate::pipeline::{TriageOutcome, TriagePipeline};
    pub use crate::routing::{RoutingReason, RoutingResult};
    pub use crate::rules::{default_rules, ActionKind, RuleDefinition};
    pub use crate::ticket::{Category, CustomerTier, PriorityScore, SentimentLabel, Ticket};
}
