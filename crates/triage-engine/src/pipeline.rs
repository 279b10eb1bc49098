//! Ticket triage pipeline
//!
//! [`TriagePipeline`] composes the stages in their fixed order:
//!
//! ```text
//! ticket ──► signals ──► priority ──► rule pass ──► routing ──► ticket + results
//!                                      (boosts)      (reserves load)
//! ```
//!
//! Evaluation and the rule pass are pure, so any number of tickets can run
//! through them in parallel. Routing mutates only agent load in the shared
//! [`AgentDirectory`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};

use deskroute_infra_common::logging::{with_context, LogContext};

use crate::agent::{AgentDirectory, AgentId};
use crate::config::{CategoryConfig, TriageConfig};
use crate::error::{Result, TriageError};
use crate::priority::{OverrideDirection, PriorityFactor, PriorityOutcome, PriorityScorer, ScoreBreakdown};
use crate::routing::{RankedCandidate, RoutingEngine, RoutingResult};
use crate::rules::{EmittedAction, RuleDefinition, RuleEngine, RuleOutcome, RuleSet};
use crate::signals::{SignalExtractor, SignalSet};
use crate::ticket::{PriorityLevel, PriorityScore, Ticket, TicketId};

/// Priority evaluation of one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub ticket_id: TicketId,
    pub priority: PriorityScore,
    pub level: PriorityLevel,
    pub factors: Vec<PriorityFactor>,
    pub breakdown: ScoreBreakdown,
    pub signals: SignalSet,
}

impl Evaluation {
    fn new(ticket_id: TicketId, outcome: PriorityOutcome, signals: SignalSet) -> Self {
        Self {
            ticket_id,
            priority: outcome.score,
            level: outcome.level,
            factors: outcome.factors,
            breakdown: outcome.breakdown,
            signals,
        }
    }

    /// Stable factor tags in application order
    pub fn factor_tags(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.tag.to_string()).collect()
    }

    /// Copy the priority and factor tags onto a ticket
    pub fn attach(&self, ticket: Ticket) -> Ticket {
        let mut ticket = ticket.with_priority(self.priority);
        ticket.factors = self.factor_tags();
        ticket
    }
}

/// Everything the pipeline produced for one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageOutcome {
    /// Ticket with priority, factors and routing attached
    pub ticket: Ticket,
    pub evaluation: Evaluation,
    pub rules: RuleOutcome,
    pub routing: RoutingResult,
}

/// End-to-end evaluation and routing
#[derive(Debug)]
pub struct TriagePipeline {
    categories: CategoryConfig,
    extractor: SignalExtractor,
    scorer: PriorityScorer,
    rules: RuleEngine,
    router: RoutingEngine,
}

impl TriagePipeline {
    pub fn new(config: TriageConfig, directory: Arc<AgentDirectory>) -> Result<Self> {
        config.validate()?;

        let router = RoutingEngine::new(config.routing, &config.priority, directory);
        Ok(Self {
            extractor: SignalExtractor::new(&config.keywords),
            scorer: PriorityScorer::new(config.priority),
            rules: RuleEngine::new(config.rules),
            categories: config.categories,
            router,
        })
    }

    pub fn directory(&self) -> &Arc<AgentDirectory> {
        self.router.directory()
    }

    pub fn router(&self) -> &RoutingEngine {
        &self.router
    }

    /// Score a ticket's priority
    pub fn evaluate(&self, ticket: &Ticket) -> Result<Evaluation> {
        let ctx = LogContext::with_operation("pipeline", "evaluate").with_subject(ticket.id.to_string());
        with_context(&ctx, Level::DEBUG, || {
            ticket.validate()?;
            if !self.categories.is_known(ticket.category()) {
                return Err(TriageError::InvalidInput(format!(
                    "Ticket {}: unknown category '{}'",
                    ticket.id,
                    ticket.category()
                )));
            }

            let signals = self.extractor.extract_ticket(ticket);
            let outcome = self.scorer.score(&signals, ticket.sentiment.label, ticket.tier(), ticket.category());
            debug!("Ticket {} scored {} [{}]", ticket.id, outcome.score, outcome.factor_tags().join(", "));
            Ok(Evaluation::new(ticket.id.clone(), outcome, signals))
        })
    }

    pub fn compile_rules(&self, definitions: &[RuleDefinition]) -> RuleSet {
        self.rules.compile(definitions)
    }

    /// Run the rule pass against an evaluated ticket
    pub fn apply_rules(&self, ticket: &Ticket, definitions: &[RuleDefinition]) -> Result<RuleOutcome> {
        self.apply_compiled(ticket, &self.compile_rules(definitions))
    }

    pub fn apply_compiled(&self, ticket: &Ticket, rules: &RuleSet) -> Result<RuleOutcome> {
        let ctx = LogContext::with_operation("pipeline", "apply_rules").with_subject(ticket.id.to_string());
        with_context(&ctx, Level::DEBUG, || self.rules.evaluate_compiled(ticket, rules))
    }

    /// Route an evaluated ticket
    pub fn route(&self, ticket: &Ticket, actions: &[EmittedAction]) -> Result<RoutingResult> {
        let ctx = LogContext::with_operation("pipeline", "route").with_subject(ticket.id.to_string());
        with_context(&ctx, Level::DEBUG, || self.router.route(ticket, actions))
    }

    /// Evaluate, apply rules and route one ticket
    pub fn process(&self, ticket: Ticket, rules: &RuleSet) -> Result<TriageOutcome> {
        let ctx = LogContext::with_operation("pipeline", "process")
            .with_subject(ticket.id.to_string())
            .with_field("category", ticket.category().to_string())
            .with_field("tier", ticket.tier().to_string());

        with_context(&ctx, Level::INFO, || {
            let evaluation = self.evaluate(&ticket)?;
            let ticket = evaluation.attach(ticket);

            let rule_outcome = self.apply_compiled(&ticket, rules)?;
            let ticket = ticket.with_priority(rule_outcome.final_priority);

            let routing = self.route(&ticket, &rule_outcome.actions)?;
            let ticket = ticket.with_routing(&routing);

            info!(
                "{} priority={} actions={} agent={}",
                ctx,
                rule_outcome.final_priority,
                rule_outcome.actions.len(),
                routing.agent_id.as_ref().map_or("none", AgentId::as_str)
            );

            Ok(TriageOutcome {
                ticket,
                evaluation,
                rules: rule_outcome,
                routing,
            })
        })
    }

    /// Process many tickets on the blocking pool. Results keep the input order,
    /// and one ticket's failure does not affect the others.
    pub async fn process_batch(self: &Arc<Self>, tickets: Vec<Ticket>, rules: &[RuleDefinition]) -> Vec<Result<TriageOutcome>> {
        let rules = Arc::new(self.compile_rules(rules));
        info!("Processing batch of {} tickets with {} rules", tickets.len(), rules.len());

        let handles: Vec<_> = tickets
            .into_iter()
            .map(|ticket| {
                let pipeline = Arc::clone(self);
                let rules = Arc::clone(&rules);
                let ticket_id = ticket.id.clone();
                (ticket_id, tokio::task::spawn_blocking(move || pipeline.process(ticket, &rules)))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (ticket_id, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Triage task for ticket {} failed: {}", ticket_id, e);
                    Err(TriageError::Internal(format!("triage task for {} failed: {}", ticket_id, e)))
                }
            };
            results.push(result);
        }
        results
    }

    /// Manual one-step priority change on an evaluated ticket
    pub fn override_priority(
        &self,
        ticket: Ticket,
        reasons: &[String],
        direction: OverrideDirection,
    ) -> Result<(Ticket, PriorityOutcome)> {
        let current = ticket.evaluated_priority()?;
        let outcome = self.scorer.recalculate_with_override(current, reasons, direction);
        info!("Ticket {} priority override {} -> {}", ticket.id, current, outcome.score);

        let mut ticket = ticket.with_priority(outcome.score);
        ticket.factors.extend(outcome.factor_tags());
        Ok((ticket, outcome))
    }

    /// Route again without the current assignee. The caller releases the old
    /// assignment's load.
    pub fn reassign(&self, ticket: Ticket, exclude: &[AgentId]) -> Result<(Ticket, RoutingResult)> {
        let ctx = LogContext::with_operation("pipeline", "reassign").with_subject(ticket.id.to_string());
        with_context(&ctx, Level::INFO, || {
            let routing = self.router.reassign(&ticket, exclude)?;
            Ok((ticket.with_routing(&routing), routing))
        })
    }

    pub fn recommend(&self, ticket: &Ticket, limit: usize) -> Result<Vec<RankedCandidate>> {
        self.router.recommend(ticket, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentStatus, SystemClock};
    use crate::rules::default_rules;
    use crate::ticket::{Category, CustomerTier, SentimentLabel};
    use pretty_assertions::assert_eq;

    fn pipeline(agents: Vec<Agent>) -> Arc<TriagePipeline> {
        let directory = Arc::new(AgentDirectory::from_agents(agents, Arc::new(SystemClock)).unwrap());
        Arc::new(TriagePipeline::new(TriageConfig::default(), directory).unwrap())
    }

    fn agent(id: &str, skills: &[Category]) -> Agent {
        Agent::new(id, id)
            .with_skills(skills.iter().cloned())
            .with_languages(["en"])
            .with_load(0, 3)
            .with_status(AgentStatus::Online)
    }

    #[test]
    fn test_evaluate_records_factors() {
        let pipeline = pipeline(vec![]);
        let ticket = Ticket::new("T-1", "Checkout is broken, this is urgent!", Category::BugReport, CustomerTier::Premium)
            .with_sentiment(SentimentLabel::Negative, -0.6);

        let evaluation = pipeline.evaluate(&ticket).unwrap();
        assert_eq!(evaluation.priority.value(), 5);
        assert_eq!(
            evaluation.factor_tags(),
            vec!["urgent_keyword", "high_impact_keyword", "negative_sentiment", "premium_customer", "critical_category"]
        );
        assert_eq!(evaluation.breakdown.unclamped, 9);
    }

    #[test]
    fn test_evaluate_rejects_unknown_category_and_bad_input() {
        let pipeline = pipeline(vec![]);
        let custom = Ticket::new("T-2", "x", "crypto_wallets", CustomerTier::Free);
        assert!(matches!(pipeline.evaluate(&custom), Err(TriageError::InvalidInput(_))));

        let bad = Ticket::new("T-3", "x", Category::Complaint, CustomerTier::Free).with_confidence(2.0);
        assert!(pipeline.evaluate(&bad).is_err());
    }

    #[test]
    fn test_process_attaches_results() {
        let pipeline = pipeline(vec![agent("agent-1", &[Category::GeneralInquiry])]);
        let rules = pipeline.compile_rules(&default_rules());
        let ticket = Ticket::new("T-4", "Where can I find the API docs?", Category::GeneralInquiry, CustomerTier::Standard);

        let outcome = pipeline.process(ticket, &rules).unwrap();
        assert_eq!(outcome.ticket.priority, Some(PriorityScore::MEDIUM));
        assert_eq!(outcome.ticket.assigned_agent, Some(AgentId::from("agent-1")));
        assert!(outcome.ticket.routing_confidence.is_some());
        assert!(outcome.rules.actions.is_empty());
    }

    #[test]
    fn test_override_priority() {
        let pipeline = pipeline(vec![]);
        let ticket = Ticket::new("T-5", "x", Category::FeatureRequest, CustomerTier::Standard);
        let evaluation = pipeline.evaluate(&ticket).unwrap();
        let ticket = evaluation.attach(ticket);

        let (ticket, outcome) = pipeline
            .override_priority(ticket, &["requested by account manager".to_string()], OverrideDirection::Up)
            .unwrap();
        assert_eq!(outcome.score.value(), 4);
        assert_eq!(ticket.priority_level, Some(PriorityLevel::High));
        assert_eq!(ticket.factors.last().map(String::as_str), Some("manual_override"));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let pipeline = pipeline(vec![agent("agent-1", &[Category::TechnicalIssue, Category::BillingQuestion])]);
        let tickets = vec![
            Ticket::new("T-10", "invoice", Category::BillingQuestion, CustomerTier::Standard),
            Ticket::new("T-11", "bad", Category::Custom("unknown".to_string()), CustomerTier::Standard),
            Ticket::new("T-12", "crash", Category::TechnicalIssue, CustomerTier::Standard),
        ];

        let results = pipeline.process_batch(tickets, &[]).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().ticket.id, TicketId::from("T-10"));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().ticket.id, TicketId::from("T-12"));
        assert_eq!(pipeline.directory().get(&"agent-1".into()).unwrap().current_load, 2);
    }
}
