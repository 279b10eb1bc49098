//! # Agent Routing
//!
//! Picks an agent for a scored ticket.
//!
//! ## Routing Flow
//!
//! 1. A `reassign` action from the rule pass is a terminal override. A named
//!    `agent_id` is reserved directly; a `to_team` goes to the least-loaded
//!    eligible member of that team, or to the team queue when nobody is free.
//! 2. Otherwise the ticket's hard constraints become a [`CandidateQuery`]:
//!    category skill, language when known, critical authorization when the
//!    priority reaches the configured threshold in a critical category, and VIP
//!    authorization for VIP customers. An `escalate` action is reported on the
//!    result but never narrows the candidates.
//! 3. Candidates are scored on the weighted soft preferences (language match,
//!    relative load, experience alignment, satisfaction) and ranked by score
//!    descending, then current load ascending, then agent id ascending.
//! 4. The best candidate is reserved. Losing a reservation race moves on to the
//!    next candidate, up to `max_reservation_attempts`.
//!
//! An empty candidate list is a normal outcome: the result carries no agent,
//! confidence 0.0 and the `no_eligible_agent` reason.
//!
//! Confidence is the winning score divided by the best score attainable for the
//! ticket (the language weight only counts when the ticket has a language).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentDirectory, AgentId, CandidateQuery};
use crate::config::{PriorityConfig, RoutingConfig};
use crate::error::{Result, TriageError};
use crate::rules::{ActionKind, EmittedAction};
use crate::ticket::{Category, CustomerTier, PriorityScore, Ticket};

/// Why an agent was (or was not) chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingReason {
    SkillMatch,
    LanguageMatch,
    LoadBalance,
    ExperiencedHandler,
    HighPerformer,
    VipHandler,
    CriticalHandler,
    Escalated,
    RuleOverride,
    NoEligibleAgent,
}

impl RoutingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingReason::SkillMatch => "skill_match",
            RoutingReason::LanguageMatch => "language_match",
            RoutingReason::LoadBalance => "load_balance",
            RoutingReason::ExperiencedHandler => "experienced_handler",
            RoutingReason::HighPerformer => "high_performer",
            RoutingReason::VipHandler => "vip_handler",
            RoutingReason::CriticalHandler => "critical_handler",
            RoutingReason::Escalated => "escalated",
            RoutingReason::RuleOverride => "rule_override",
            RoutingReason::NoEligibleAgent => "no_eligible_agent",
        }
    }
}

impl fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runner-up agent reported with a routing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeCandidate {
    pub agent_id: AgentId,
    pub score: f64,
}

/// Weighted soft-preference terms for one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreTerms {
    pub language: f64,
    pub load: f64,
    pub experience: f64,
    pub performance: f64,
}

impl ScoreTerms {
    pub fn total(&self) -> f64 {
        self.language + self.load + self.experience + self.performance
    }
}

/// Candidate with its score, in ranking order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub agent: Agent,
    pub score: f64,
    pub terms: ScoreTerms,
}

impl RankedCandidate {
    fn ranking(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.agent.current_load.cmp(&other.agent.current_load))
            .then_with(|| self.agent.id.cmp(&other.agent.id))
    }

    fn as_alternative(&self) -> AlternativeCandidate {
        AlternativeCandidate {
            agent_id: self.agent.id.clone(),
            score: self.score,
        }
    }
}

/// Escalation requested by the rule pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub rule_id: String,
    pub to_team: Option<String>,
    pub reason: Option<String>,
}

/// Outcome of a routing pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    /// `None` means no agent could take the ticket
    pub agent_id: Option<AgentId>,
    /// Team queue chosen by a rule override
    pub team: Option<String>,
    pub reasons: Vec<RoutingReason>,
    pub confidence: f64,
    pub alternatives: Vec<AlternativeCandidate>,
    /// A `skip_queue` action fired
    pub queue_bypass: bool,
    pub escalation: Option<Escalation>,
    /// Rule whose `reassign` action decided the outcome
    pub override_rule: Option<String>,
}

impl RoutingResult {
    fn unassigned(reasons: Vec<RoutingReason>) -> Self {
        Self {
            agent_id: None,
            team: None,
            reasons,
            confidence: 0.0,
            alternatives: Vec::new(),
            queue_bypass: false,
            escalation: None,
            override_rule: None,
        }
    }

    pub fn is_assigned(&self) -> bool {
        self.agent_id.is_some()
    }

    pub fn has_reason(&self, reason: RoutingReason) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Directives the router takes from the rule pass
#[derive(Debug, Default)]
struct Directives<'a> {
    reassign: Option<&'a EmittedAction>,
    escalation: Option<Escalation>,
    queue_bypass: bool,
}

impl<'a> Directives<'a> {
    fn from_actions(actions: &'a [EmittedAction]) -> Self {
        let mut directives = Directives::default();
        for action in actions {
            match action.kind {
                // First reassign wins; later ones are informational
                ActionKind::Reassign if directives.reassign.is_none() => directives.reassign = Some(action),
                ActionKind::Escalate if directives.escalation.is_none() => {
                    directives.escalation = Some(Escalation {
                        rule_id: action.rule_id.clone(),
                        to_team: action.to_team().map(str::to_string),
                        reason: action.reason().map(str::to_string),
                    })
                }
                ActionKind::SkipQueue => directives.queue_bypass = true,
                _ => {}
            }
        }
        directives
    }
}

/// Weighted multi-criteria router over an [`AgentDirectory`]
#[derive(Debug, Clone)]
pub struct RoutingEngine {
    config: RoutingConfig,
    critical_categories: Vec<Category>,
    directory: Arc<AgentDirectory>,
}

impl RoutingEngine {
    pub fn new(config: RoutingConfig, priority: &PriorityConfig, directory: Arc<AgentDirectory>) -> Self {
        Self {
            config,
            critical_categories: priority.critical_categories.clone(),
            directory,
        }
    }

    pub fn directory(&self) -> &Arc<AgentDirectory> {
        &self.directory
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Route an evaluated ticket, honoring the rule pass's actions
    pub fn route(&self, ticket: &Ticket, actions: &[EmittedAction]) -> Result<RoutingResult> {
        let priority = ticket.evaluated_priority()?;
        let directives = Directives::from_actions(actions);

        let mut result = match directives.reassign {
            Some(action) => self.route_override(ticket, priority, action)?,
            None => self.route_scored(ticket, priority, &self.query_for(ticket, priority))?,
        };

        if directives.escalation.is_some() && result.is_assigned() {
            result.reasons.push(RoutingReason::Escalated);
        }
        result.queue_bypass = directives.queue_bypass;
        result.escalation = directives.escalation;
        Ok(result)
    }

    /// Route again, leaving out the current assignee and any listed agents. The
    /// caller releases the previous assignee's load.
    pub fn reassign(&self, ticket: &Ticket, exclude: &[AgentId]) -> Result<RoutingResult> {
        let priority = ticket.evaluated_priority()?;
        let excluded = exclude.iter().cloned().chain(ticket.assigned_agent.clone());
        let query = self.query_for(ticket, priority).excluding(excluded);
        info!("Reassigning ticket {} excluding {} agents", ticket.id, query.exclude.len());
        self.route_scored(ticket, priority, &query)
    }

    /// Ranked candidates for manual assignment. Nothing is reserved.
    pub fn recommend(&self, ticket: &Ticket, limit: usize) -> Result<Vec<RankedCandidate>> {
        let priority = ticket.evaluated_priority()?;
        let query = self.query_for(ticket, priority);
        let mut ranked = self.rank(ticket, priority, self.directory.candidates(&query));
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Hard constraints derived from the ticket
    pub fn query_for(&self, ticket: &Ticket, priority: PriorityScore) -> CandidateQuery {
        let category = ticket.category().clone();
        let critical = priority.value() >= self.config.critical_priority_threshold
            && self.critical_categories.contains(&category);

        let mut query = CandidateQuery::new(category)
            .with_min_experience(self.config.min_experience)
            .require_vip(ticket.tier() == CustomerTier::Vip)
            .require_critical(critical);
        if let Some(language) = known_language(ticket) {
            query = query.with_language(language);
        }
        query
    }

    /// Score one candidate on the soft preferences
    pub fn score(&self, ticket: &Ticket, priority: PriorityScore, agent: &Agent) -> ScoreTerms {
        let weights = &self.config.weights;

        let language = match ticket.language.as_deref() {
            Some(language) if agent.speaks(language) => weights.language_match,
            _ => 0.0,
        };
        let load = (1.0 - agent.load_ratio()).clamp(0.0, 1.0) * weights.load;
        let experience = if priority.value() >= self.config.experience_priority_threshold
            && agent.experience_level >= self.config.experienced_level
        {
            weights.experience
        } else {
            0.0
        };
        let satisfaction = (agent.performance.satisfaction_score / self.config.max_satisfaction).clamp(0.0, 1.0);
        let performance = satisfaction * weights.performance;

        ScoreTerms {
            language,
            load,
            experience,
            performance,
        }
    }

    /// Score and order candidates: score desc, load asc, id asc
    pub fn rank(&self, ticket: &Ticket, priority: PriorityScore, candidates: Vec<Agent>) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|agent| {
                let terms = self.score(ticket, priority, &agent);
                RankedCandidate {
                    score: terms.total(),
                    terms,
                    agent,
                }
            })
            .collect();
        ranked.sort_by(|a, b| a.ranking(b));
        ranked
    }

    /// Best score any agent could reach for this ticket
    fn max_score(&self, ticket: &Ticket, priority: PriorityScore) -> f64 {
        let weights = &self.config.weights;
        let language = if known_language(ticket).is_some() { weights.language_match } else { 0.0 };
        let experience = if priority.value() >= self.config.experience_priority_threshold {
            weights.experience
        } else {
            0.0
        };
        language + weights.load + experience + weights.performance
    }

    fn confidence(&self, ticket: &Ticket, priority: PriorityScore, score: f64) -> f64 {
        let max = self.max_score(ticket, priority);
        if max <= 0.0 { 1.0 } else { (score / max).clamp(0.0, 1.0) }
    }

    fn route_scored(&self, ticket: &Ticket, priority: PriorityScore, query: &CandidateQuery) -> Result<RoutingResult> {
        let ranked = self.rank(ticket, priority, self.directory.candidates(query));
        if ranked.is_empty() {
            info!("No eligible agent for ticket {} (category {})", ticket.id, query.category);
            return Ok(RoutingResult::unassigned(vec![RoutingReason::NoEligibleAgent]));
        }

        for (index, candidate) in ranked.iter().enumerate().take(self.config.max_reservation_attempts) {
            match self.directory.reserve(&candidate.agent.id) {
                Ok(load) => {
                    info!(
                        "Assigned ticket {} to {} (score {:.3}, load {}/{})",
                        ticket.id, candidate.agent.id, candidate.score, load, candidate.agent.max_load
                    );
                    let alternatives = ranked[index + 1..]
                        .iter()
                        .take(self.config.max_alternatives)
                        .map(RankedCandidate::as_alternative)
                        .collect();
                    return Ok(RoutingResult {
                        agent_id: Some(candidate.agent.id.clone()),
                        reasons: reasons_for(&candidate.terms, query),
                        confidence: self.confidence(ticket, priority, candidate.score),
                        alternatives,
                        ..RoutingResult::unassigned(Vec::new())
                    });
                }
                Err(e @ (TriageError::ReservationConflict(_) | TriageError::AgentNotFound(_))) => {
                    warn!("Ticket {}: {}, trying next candidate", ticket.id, e);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Ticket {}: every reservation attempt lost, leaving unassigned", ticket.id);
        Ok(RoutingResult::unassigned(vec![RoutingReason::NoEligibleAgent]))
    }

    fn route_override(
        &self,
        ticket: &Ticket,
        priority: PriorityScore,
        action: &EmittedAction,
    ) -> Result<RoutingResult> {
        let overridden = |agent_id: Option<AgentId>, team: Option<String>| RoutingResult {
            agent_id,
            team,
            reasons: vec![RoutingReason::RuleOverride],
            confidence: 1.0,
            override_rule: Some(action.rule_id.clone()),
            ..RoutingResult::unassigned(Vec::new())
        };

        if let Some(agent_id) = action.agent_id() {
            let agent_id = AgentId::from(agent_id);
            match self.directory.reserve(&agent_id) {
                Ok(_) => {
                    info!("Rule {} assigned ticket {} to {}", action.rule_id, ticket.id, agent_id);
                    return Ok(overridden(Some(agent_id), None));
                }
                Err(e) if action.to_team().is_some() => {
                    warn!("Rule {} named agent {} but {}; trying its team", action.rule_id, agent_id, e);
                }
                Err(e) => {
                    warn!("Rule {} named agent {} but {}; falling back to scored routing", action.rule_id, agent_id, e);
                    let query = self.query_for(ticket, priority);
                    return self.route_scored(ticket, priority, &query);
                }
            }
        }

        let team = match action.to_team() {
            Some(team) => team.to_string(),
            None => return Err(TriageError::configuration(&action.rule_id, "reassign without a target")),
        };

        let query = self.query_for(ticket, priority).in_team(team.clone());
        let mut members = self.directory.candidates(&query);
        members.sort_by(|a, b| a.current_load.cmp(&b.current_load).then_with(|| a.id.cmp(&b.id)));

        for member in members.iter().take(self.config.max_reservation_attempts) {
            match self.directory.reserve(&member.id) {
                Ok(_) => {
                    info!("Rule {} routed ticket {} to {} in team {}", action.rule_id, ticket.id, member.id, team);
                    return Ok(overridden(Some(member.id.clone()), Some(team)));
                }
                Err(e) if e.is_transient() => debug!("Team member {} unavailable: {}", member.id, e),
                Err(TriageError::AgentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!("Rule {} sent ticket {} to the {} queue", action.rule_id, ticket.id, team);
        let mut result = overridden(None, Some(team));
        result.confidence = 0.0;
        Ok(result)
    }
}

fn known_language(ticket: &Ticket) -> Option<&str> {
    ticket.language.as_deref().filter(|l| !l.trim().is_empty())
}

fn reasons_for(terms: &ScoreTerms, query: &CandidateQuery) -> Vec<RoutingReason> {
    let mut reasons = vec![RoutingReason::SkillMatch];
    if terms.language > 0.0 {
        reasons.push(RoutingReason::LanguageMatch);
    }
    if terms.load > 0.0 {
        reasons.push(RoutingReason::LoadBalance);
    }
    if terms.experience > 0.0 {
        reasons.push(RoutingReason::ExperiencedHandler);
    }
    if terms.performance > 0.0 {
        reasons.push(RoutingReason::HighPerformer);
    }
    if query.require_vip {
        reasons.push(RoutingReason::VipHandler);
    }
    if query.require_critical {
        reasons.push(RoutingReason::CriticalHandler);
    }
    reasons
}
