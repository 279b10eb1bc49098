//! # Rule-Based Overrides
//!
//! Operators configure an ordered list of conditional rules. Each rule tests one
//! aspect of a ticket and, on a match, emits an action for the caller (or the
//! routing engine) to carry out.
//!
//! ## Rule Lifecycle
//!
//! Rules arrive as [`RuleDefinition`]s, the loosely typed shape stored by the
//! persistence layer: a `rule_type` string, a JSON `conditions` object and a JSON
//! `action_params` map. Before evaluation each definition is compiled into a
//! [`Rule`] whose condition is a [`RuleCondition`] variant. A definition that
//! fails to compile (unknown type, malformed conditions, missing action
//! parameters) is skipped and reported as a [`RuleFailure`]; the remaining rules
//! still run.
//!
//! ## Evaluation Order
//!
//! Enabled rules run in ascending `order`, ties broken by rule id. All matching
//! rules fire and their actions compose. Evaluation is a fold that threads a
//! working priority through the rules:
//!
//! - `boost_priority` adds its `priority_boost` parameter to the working priority
//!   (clamped to 1..=5) immediately, so later `priority` rules see the new value.
//! - Every other action leaves the working priority untouched.
//! - A rule whose action kind is configured exclusive, or whose own `exclusive`
//!   flag is set, stops the pass after it fires.
//!
//! ## Conditions
//!
//! | rule_type   | conditions                                        |
//! |-------------|---------------------------------------------------|
//! | `category`  | `{"categories": [..]}`                            |
//! | `keyword`   | `{"keywords": [..], "match_mode": "any" \| "all"}` |
//! | `sentiment` | `{"sentiments": [..]}`                            |
//! | `priority`  | `{"min_priority": n, "max_priority": m}`          |
//! | `customer`  | `{"tiers": [..]}`                                 |
//! | `language`  | `{"languages": [..]}`                             |

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::config::RuleEngineConfig;
use crate::error::{Result, TriageError};
use crate::ticket::{Category, CustomerTier, PriorityScore, SentimentLabel, Ticket};

/// What a matched rule asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Escalate,
    Reassign,
    SkipQueue,
    Notify,
    BoostPriority,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Escalate => "escalate",
            ActionKind::Reassign => "reassign",
            ActionKind::SkipQueue => "skip_queue",
            ActionKind::Notify => "notify",
            ActionKind::BoostPriority => "boost_priority",
        }
    }
}

impl FromStr for ActionKind {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "escalate" => Ok(ActionKind::Escalate),
            // assign_team is the older name for a team reassignment
            "reassign" | "assign_team" => Ok(ActionKind::Reassign),
            "skip_queue" => Ok(ActionKind::SkipQueue),
            "notify" => Ok(ActionKind::Notify),
            "boost_priority" => Ok(ActionKind::BoostPriority),
            other => Err(TriageError::InvalidInput(format!("Unknown rule action: {}", other))),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule as stored by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rule_type: String,
    #[serde(default = "empty_object")]
    pub conditions: Value,
    pub action: String,
    #[serde(default)]
    pub action_params: Map<String, Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Evaluation order, ascending
    #[serde(default)]
    pub order: i32,
    /// Stop evaluating later rules once this one fires
    #[serde(default)]
    pub exclusive: bool,
    /// Only consider tickets from these intake sources
    #[serde(default)]
    pub applies_to_sources: Option<Vec<String>>,
    /// Only consider tickets in these categories
    #[serde(default)]
    pub applies_to_categories: Option<Vec<Category>>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        rule_type: impl Into<String>,
        conditions: Value,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            rule_type: rule_type.into(),
            conditions,
            action: action.into(),
            action_params: Map::new(),
            enabled: true,
            order: 0,
            exclusive: false,
            applies_to_sources: None,
            applies_to_categories: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.action_params.insert(key.into(), value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Keyword rule matching mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Any,
    All,
}

fn min_priority() -> u8 {
    PriorityScore::MIN.value()
}

fn max_priority() -> u8 {
    PriorityScore::MAX.value()
}

/// Typed rule condition, one variant per rule type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule_type", content = "conditions", rename_all = "snake_case")]
pub enum RuleCondition {
    Category {
        categories: Vec<Category>,
    },
    Keyword {
        keywords: Vec<String>,
        #[serde(default)]
        match_mode: MatchMode,
    },
    Sentiment {
        sentiments: Vec<SentimentLabel>,
    },
    Priority {
        #[serde(default = "min_priority")]
        min_priority: u8,
        #[serde(default = "max_priority")]
        max_priority: u8,
    },
    Customer {
        tiers: Vec<CustomerTier>,
    },
    Language {
        languages: Vec<String>,
    },
}

impl RuleCondition {
    /// Test the condition against a ticket and the current working priority
    pub fn matches(&self, ticket: &Ticket, priority: PriorityScore) -> bool {
        match self {
            RuleCondition::Category { categories } => categories.contains(ticket.category()),
            RuleCondition::Keyword { keywords, match_mode } => {
                let text = ticket.full_text().to_lowercase();
                let mut hits = keywords.iter().map(|keyword| text.contains(keyword.as_str()));
                match match_mode {
                    MatchMode::Any => hits.any(|hit| hit),
                    MatchMode::All => hits.all(|hit| hit),
                }
            }
            RuleCondition::Sentiment { sentiments } => sentiments.contains(&ticket.sentiment.label),
            RuleCondition::Priority { min_priority, max_priority } => {
                (*min_priority..=*max_priority).contains(&priority.value())
            }
            RuleCondition::Customer { tiers } => tiers.contains(&ticket.tier()),
            RuleCondition::Language { languages } => match &ticket.language {
                Some(language) => languages.iter().any(|l| l.eq_ignore_ascii_case(language.trim())),
                None => false,
            },
        }
    }

    fn check(&mut self) -> std::result::Result<(), String> {
        match self {
            RuleCondition::Category { categories } if categories.is_empty() => Err("categories is empty".into()),
            RuleCondition::Keyword { keywords, .. } => {
                if keywords.is_empty() {
                    return Err("keywords is empty".into());
                }
                if keywords.iter().any(|k| k.trim().is_empty()) {
                    return Err("keywords contains a blank entry".into());
                }
                for keyword in keywords.iter_mut() {
                    *keyword = keyword.to_lowercase();
                }
                Ok(())
            }
            RuleCondition::Sentiment { sentiments } if sentiments.is_empty() => Err("sentiments is empty".into()),
            RuleCondition::Priority { min_priority: low, max_priority: high } => {
                let (low, high) = (*low, *high);
                let range = PriorityScore::MIN.value()..=PriorityScore::MAX.value();
                if !range.contains(&low) || !range.contains(&high) {
                    Err(format!("priority range {}..={} outside 1..=5", low, high))
                } else if low > high {
                    Err(format!("min_priority {} above max_priority {}", low, high))
                } else {
                    Ok(())
                }
            }
            RuleCondition::Customer { tiers } if tiers.is_empty() => Err("tiers is empty".into()),
            RuleCondition::Language { languages } if languages.is_empty() => Err("languages is empty".into()),
            _ => Ok(()),
        }
    }
}

/// A compiled, ready-to-evaluate rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub condition: RuleCondition,
    pub action: ActionKind,
    pub params: Map<String, Value>,
    /// Priority adjustment for `boost_priority` rules
    pub boost: Option<i32>,
    pub order: i32,
    pub exclusive: bool,
    pub applies_to_sources: Option<Vec<String>>,
    pub applies_to_categories: Option<Vec<Category>>,
}

impl TryFrom<&RuleDefinition> for Rule {
    type Error = TriageError;

    fn try_from(definition: &RuleDefinition) -> Result<Self> {
        let fail = |reason: String| TriageError::configuration(definition.id.clone(), reason);

        let tagged = json!({
            "rule_type": definition.rule_type.trim().to_lowercase(),
            "conditions": definition.conditions,
        });
        let mut condition: RuleCondition = serde_json::from_value(tagged)
            .map_err(|e| fail(format!("invalid {} rule: {}", definition.rule_type, e)))?;
        condition.check().map_err(fail)?;

        let action = ActionKind::from_str(&definition.action)
            .map_err(|_| fail(format!("unknown action '{}'", definition.action)))?;

        let params = &definition.action_params;
        let boost = match action {
            ActionKind::BoostPriority => {
                let boost = params
                    .get("priority_boost")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| fail("boost_priority needs an integer priority_boost".to_string()))?;
                Some(boost.clamp(-4, 4) as i32)
            }
            ActionKind::Reassign => {
                if param_str(params, "to_team").is_none() && param_str(params, "agent_id").is_none() {
                    return Err(fail("reassign needs a to_team or agent_id parameter".to_string()));
                }
                None
            }
            _ => None,
        };

        Ok(Rule {
            id: definition.id.clone(),
            name: definition.name.clone(),
            condition,
            action,
            params: params.clone(),
            boost,
            order: definition.order,
            exclusive: definition.exclusive,
            applies_to_sources: definition.applies_to_sources.clone(),
            applies_to_categories: definition.applies_to_categories.clone(),
        })
    }
}

impl Rule {
    /// Scope filters pass when the ticket lacks the attribute
    fn in_scope(&self, ticket: &Ticket) -> bool {
        if let (Some(sources), Some(source)) = (&self.applies_to_sources, &ticket.source) {
            if !sources.iter().any(|s| s.eq_ignore_ascii_case(source)) {
                return false;
            }
        }
        if let Some(categories) = &self.applies_to_categories {
            if !categories.contains(ticket.category()) {
                return false;
            }
        }
        true
    }

    pub fn matches(&self, ticket: &Ticket, priority: PriorityScore) -> bool {
        self.in_scope(ticket) && self.condition.matches(ticket, priority)
    }
}

fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

/// A rule that could not be compiled and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFailure {
    pub rule_id: String,
    pub reason: String,
}

/// Action emitted by a matching rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedAction {
    pub rule_id: String,
    pub rule_name: String,
    pub kind: ActionKind,
    pub params: Map<String, Value>,
    /// Working priority when the rule was tested
    pub priority_before: PriorityScore,
    /// Working priority after the rule fired
    pub priority_after: PriorityScore,
}

impl EmittedAction {
    pub fn to_team(&self) -> Option<&str> {
        param_str(&self.params, "to_team")
    }

    pub fn agent_id(&self) -> Option<&str> {
        param_str(&self.params, "agent_id")
    }

    pub fn reason(&self) -> Option<&str> {
        param_str(&self.params, "reason")
    }
}

/// Compiled rules in evaluation order
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    failures: Vec<RuleFailure>,
}

impl RuleSet {
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Definitions skipped at compile time
    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Result of one rule pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub actions: Vec<EmittedAction>,
    pub initial_priority: PriorityScore,
    pub final_priority: PriorityScore,
    pub skipped: Vec<RuleFailure>,
    /// Rule whose exclusive action ended the pass
    pub stopped_by: Option<String>,
}

impl RuleOutcome {
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind).collect()
    }

    pub fn has(&self, kind: ActionKind) -> bool {
        self.actions.iter().any(|a| a.kind == kind)
    }
}

/// Ordered rule evaluator
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: RuleEngineConfig,
}

impl RuleEngine {
    pub fn new(config: RuleEngineConfig) -> Self {
        Self { config }
    }

    /// Compile enabled definitions, recording the ones that fail
    pub fn compile(&self, definitions: &[RuleDefinition]) -> RuleSet {
        let mut set = RuleSet::default();

        for definition in definitions.iter().filter(|d| d.enabled) {
            match Rule::try_from(definition) {
                Ok(rule) => set.rules.push(rule),
                Err(e) => {
                    warn!("Skipping rule {} ({}): {}", definition.id, definition.name, e);
                    set.failures.push(RuleFailure {
                        rule_id: definition.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        set.rules.sort_by(|a, b| match a.order.cmp(&b.order) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        set
    }

    /// Compile and evaluate in one step
    pub fn evaluate(&self, ticket: &Ticket, definitions: &[RuleDefinition]) -> Result<RuleOutcome> {
        let set = self.compile(definitions);
        self.evaluate_compiled(ticket, &set)
    }

    /// Run compiled rules against an evaluated ticket
    pub fn evaluate_compiled(&self, ticket: &Ticket, set: &RuleSet) -> Result<RuleOutcome> {
        let initial_priority = ticket.evaluated_priority()?;
        let mut outcome = RuleOutcome {
            actions: Vec::new(),
            initial_priority,
            final_priority: initial_priority,
            skipped: set.failures.clone(),
            stopped_by: None,
        };

        for rule in &set.rules {
            let before = outcome.final_priority;
            if !rule.matches(ticket, before) {
                continue;
            }

            let after = match rule.boost {
                Some(boost) => before.saturating_add(boost),
                None => before,
            };
            debug!(
                "Rule {} matched ticket {}: {} (priority {} -> {})",
                rule.id, ticket.id, rule.action, before, after
            );

            outcome.final_priority = after;
            outcome.actions.push(EmittedAction {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                kind: rule.action,
                params: rule.params.clone(),
                priority_before: before,
                priority_after: after,
            });

            if rule.exclusive || self.config.is_exclusive(rule.action) {
                debug!("Rule {} is exclusive, stopping evaluation", rule.id);
                outcome.stopped_by = Some(rule.id.clone());
                break;
            }
        }

        Ok(outcome)
    }
}

/// Starter rule set seeded for new installations
pub fn default_rules() -> Vec<RuleDefinition> {
    vec![
        RuleDefinition::new(
            "vip-skip-queue",
            "VIP Customer Priority",
            "customer",
            json!({"tiers": ["vip"]}),
            "skip_queue",
        )
        .with_description("Move VIP and enterprise tickets ahead of the queue")
        .with_param("reason", json!("vip_customer"))
        .with_order(10),
        RuleDefinition::new(
            "angry-escalation",
            "Angry Customer Escalation",
            "sentiment",
            json!({"sentiments": ["angry"]}),
            "escalate",
        )
        .with_description("Escalate tickets from angry customers to senior agents")
        .with_param("to_team", json!("senior_support"))
        .with_param("reason", json!("angry_customer"))
        .with_order(20),
        RuleDefinition::new(
            "critical-alert",
            "Critical Priority Alert",
            "priority",
            json!({"min_priority": 5}),
            "notify",
        )
        .with_description("Notify management about critical tickets")
        .with_param("channels", json!(["email"]))
        .with_param("template", json!("critical_alert"))
        .with_order(30),
        RuleDefinition::new(
            "technical-team",
            "Technical Issues to Tech Team",
            "category",
            json!({"categories": ["technical_issue", "bug_report"]}),
            "reassign",
        )
        .with_param("to_team", json!("technical_support"))
        .with_order(40),
        RuleDefinition::new(
            "finance-team",
            "Billing to Finance Team",
            "category",
            json!({"categories": ["billing_question", "return_refund"]}),
            "reassign",
        )
        .with_param("to_team", json!("finance"))
        .with_order(50),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ticket(priority: u8) -> Ticket {
        Ticket::new("T-1", "The export job keeps failing", Category::TechnicalIssue, CustomerTier::Standard)
            .with_subject("Export broken")
            .with_sentiment(SentimentLabel::Angry, -0.8)
            .with_priority(PriorityScore::clamped(priority as i32))
    }

    fn ids(outcome: &RuleOutcome) -> Vec<&str> {
        outcome.actions.iter().map(|a| a.rule_id.as_str()).collect()
    }

    #[test]
    fn test_evaluates_in_ascending_order() {
        let rules = vec![
            RuleDefinition::new("b", "second", "category", json!({"categories": ["technical_issue"]}), "notify").with_order(2),
            RuleDefinition::new("a", "first", "sentiment", json!({"sentiments": ["angry"]}), "escalate").with_order(1),
            RuleDefinition::new("c", "tie", "customer", json!({"tiers": ["standard"]}), "skip_queue").with_order(2),
        ];
        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["a", "b", "c"]);
        assert_eq!(outcome.kinds(), vec![ActionKind::Escalate, ActionKind::Notify, ActionKind::SkipQueue]);
    }

    #[test]
    fn test_escalate_does_not_change_priority_seen_by_later_rules() {
        let rules = vec![
            RuleDefinition::new("angry", "angry", "sentiment", json!({"sentiments": ["angry"]}), "escalate").with_order(1),
            RuleDefinition::new("p4", "p4", "priority", json!({"min_priority": 4}), "notify").with_order(2),
        ];
        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["angry"]);
        assert_eq!(outcome.final_priority.value(), 3);
    }

    #[test]
    fn test_boost_is_visible_to_later_rules() {
        let rules = vec![
            RuleDefinition::new("angry", "angry", "sentiment", json!({"sentiments": ["angry"]}), "boost_priority")
                .with_param("priority_boost", json!(1))
                .with_order(1),
            RuleDefinition::new("p4", "p4", "priority", json!({"min_priority": 4}), "notify").with_order(2),
        ];
        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["angry", "p4"]);
        assert_eq!(outcome.actions[1].priority_before.value(), 4);
        assert_eq!(outcome.final_priority.value(), 4);
    }

    #[test]
    fn test_boost_clamps() {
        let rules = vec![RuleDefinition::new("boost", "boost", "customer", json!({"tiers": ["standard"]}), "boost_priority")
            .with_param("priority_boost", json!(3))];
        let outcome = RuleEngine::default().evaluate(&ticket(4), &rules).unwrap();
        assert_eq!(outcome.final_priority, PriorityScore::MAX);
    }

    #[test]
    fn test_bad_rule_is_skipped_not_fatal() {
        let rules = vec![
            RuleDefinition::new("bad-type", "bad", "astrology", json!({}), "notify").with_order(1),
            RuleDefinition::new("bad-cond", "bad", "priority", json!({"min_priority": "high"}), "notify").with_order(2),
            RuleDefinition::new("no-boost", "bad", "category", json!({"categories": ["complaint"]}), "boost_priority").with_order(3),
            RuleDefinition::new("good", "good", "category", json!({"categories": ["technical_issue"]}), "notify").with_order(4),
        ];
        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["good"]);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(skipped, vec!["bad-type", "bad-cond", "no-boost"]);
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let rules = vec![RuleDefinition::new("off", "off", "category", json!({"categories": ["technical_issue"]}), "notify").disabled()];
        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert!(outcome.actions.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_exclusive_stops_the_pass() {
        let rules = vec![
            RuleDefinition::new("skip", "skip", "customer", json!({"tiers": ["standard"]}), "skip_queue").with_order(1),
            RuleDefinition::new("note", "note", "category", json!({"categories": ["technical_issue"]}), "notify").with_order(2),
        ];

        let configured = RuleEngine::new(RuleEngineConfig {
            exclusive_actions: vec![ActionKind::SkipQueue],
        });
        let outcome = configured.evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["skip"]);
        assert_eq!(outcome.stopped_by.as_deref(), Some("skip"));

        let mut flagged = rules.clone();
        flagged[0] = flagged[0].clone().exclusive();
        let outcome = RuleEngine::default().evaluate(&ticket(3), &flagged).unwrap();
        assert_eq!(ids(&outcome), vec!["skip"]);

        let outcome = RuleEngine::default().evaluate(&ticket(3), &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["skip", "note"]);
    }

    #[test]
    fn test_keyword_match_modes_use_subject_and_content() {
        let any = RuleDefinition::new("any", "any", "keyword", json!({"keywords": ["BROKEN", "refund"]}), "notify");
        let all = RuleDefinition::new("all", "all", "keyword", json!({"keywords": ["broken", "refund"], "match_mode": "all"}), "notify");
        let outcome = RuleEngine::default().evaluate(&ticket(3), &[any, all]).unwrap();
        assert_eq!(ids(&outcome), vec!["any"]);
    }

    #[test]
    fn test_priority_range_and_language() {
        let rules = vec![
            RuleDefinition::new("mid", "mid", "priority", json!({"min_priority": 2, "max_priority": 3}), "notify"),
            RuleDefinition::new("tr", "tr", "language", json!({"languages": ["TR"]}), "reassign")
                .with_param("to_team", json!("turkish_support")),
        ];
        let turkish = ticket(3).with_language("tr");
        let outcome = RuleEngine::default().evaluate(&turkish, &rules).unwrap();
        assert_eq!(ids(&outcome), vec!["mid", "tr"]);
        assert_eq!(outcome.actions[1].to_team(), Some("turkish_support"));

        let outcome = RuleEngine::default().evaluate(&ticket(5), &rules).unwrap();
        assert!(outcome.actions.is_empty());
    }

    #[test]
    fn test_scope_filters() {
        let mut rule = RuleDefinition::new("email", "email", "sentiment", json!({"sentiments": ["angry"]}), "notify");
        rule.applies_to_sources = Some(vec!["email".to_string()]);
        rule.applies_to_categories = Some(vec![Category::TechnicalIssue]);

        let from_chat = ticket(3).with_source("chat");
        assert!(RuleEngine::default().evaluate(&from_chat, &[rule.clone()]).unwrap().actions.is_empty());

        let from_email = ticket(3).with_source("Email");
        assert_eq!(RuleEngine::default().evaluate(&from_email, &[rule.clone()]).unwrap().actions.len(), 1);

        // Unknown source passes the source filter
        assert_eq!(RuleEngine::default().evaluate(&ticket(3), &[rule]).unwrap().actions.len(), 1);
    }

    #[test]
    fn test_unevaluated_ticket_is_invalid_input() {
        let unscored = Ticket::new("T-2", "hi", Category::GeneralInquiry, CustomerTier::Free);
        let result = RuleEngine::default().evaluate(&unscored, &default_rules());
        assert!(matches!(result, Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_default_rules_compile() {
        let set = RuleEngine::default().compile(&default_rules());
        assert!(set.failures().is_empty());
        assert_eq!(set.len(), 5);

        let vip = Ticket::new("T-3", "Invoice wrong", Category::BillingQuestion, CustomerTier::Vip)
            .with_priority(PriorityScore::MAX);
        let outcome = RuleEngine::default().evaluate_compiled(&vip, &set).unwrap();
        assert_eq!(ids(&outcome), vec!["vip-skip-queue", "critical-alert", "finance-team"]);
    }

    #[test]
    fn test_definition_deserializes_with_defaults() {
        let definition: RuleDefinition = serde_json::from_str(
            r#"{"id": "r1", "name": "tiers", "rule_type": "customer",
                "conditions": {"tiers": ["enterprise"]}, "action": "assign_team",
                "action_params": {"to_team": "key_accounts"}}"#,
        )
        .unwrap();
        assert!(definition.enabled);
        let rule = Rule::try_from(&definition).unwrap();
        assert_eq!(rule.action, ActionKind::Reassign);
        assert_eq!(rule.condition, RuleCondition::Customer { tiers: vec![CustomerTier::Vip] });
    }
}
