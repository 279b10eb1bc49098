//! End-to-end checks of the evaluate → rules → route pipeline

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use deskroute_triage_engine::agent::{Agent, AgentDirectory, AgentId, AgentStatus, FixedClock};
use deskroute_triage_engine::config::TriageConfig;
use deskroute_triage_engine::priority::PriorityScorer;
use deskroute_triage_engine::routing::RoutingReason;
use deskroute_triage_engine::rules::{ActionKind, RuleDefinition};
use deskroute_triage_engine::signals::SignalSet;
use deskroute_triage_engine::ticket::{Category, CustomerTier, PriorityScore, SentimentLabel, Ticket};
use deskroute_triage_engine::TriagePipeline;

fn directory(agents: Vec<Agent>) -> Arc<AgentDirectory> {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap()));
    Arc::new(AgentDirectory::from_agents(agents, clock).unwrap())
}

fn online(id: &str, category: Category) -> Agent {
    Agent::new(id, id)
        .with_skills([category])
        .with_languages(["en", "tr"])
        .with_status(AgentStatus::Online)
}

#[test]
fn test_everything_at_once_saturates_to_five() {
    let mut signals = SignalSet::empty(Category::BugReport, CustomerTier::Vip);
    signals.has_urgent_keyword = true;
    signals.has_high_impact_keyword = true;

    let outcome = PriorityScorer::default().score(&signals, SentimentLabel::Angry, CustomerTier::Vip, &Category::BugReport);
    assert_eq!(outcome.breakdown.unclamped, 11);
    assert_eq!(outcome.score, PriorityScore::MAX);
}

#[test]
fn test_calm_free_inquiry_scores_two() {
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![])).unwrap();
    let ticket = Ticket::new("T-2", "Do you offer a student plan?", Category::GeneralInquiry, CustomerTier::Free);

    let evaluation = pipeline.evaluate(&ticket).unwrap();
    assert_eq!(evaluation.priority.value(), 2);
    assert_eq!(evaluation.factor_tags(), vec!["free_customer"]);
}

#[test]
fn test_full_ticket_text_drives_priority() {
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![])).unwrap();
    let ticket = Ticket::new("T-1", "Production is down and every export has failed", Category::BugReport, CustomerTier::Vip)
        .with_subject("URGENT")
        .with_sentiment(SentimentLabel::Angry, -0.9);

    let evaluation = pipeline.evaluate(&ticket).unwrap();
    assert_eq!(evaluation.priority, PriorityScore::MAX);
    assert_eq!(
        evaluation.factor_tags(),
        vec!["urgent_keyword", "high_impact_keyword", "angry_sentiment", "vip_customer", "critical_category"]
    );
}

#[test]
fn test_less_loaded_billing_agent_wins() {
    let pipeline = TriagePipeline::new(
        TriageConfig::default(),
        directory(vec![
            online("agent-a", Category::BillingQuestion).with_load(4, 5),
            online("agent-b", Category::BillingQuestion).with_load(1, 5),
        ]),
    )
    .unwrap();
    let ticket = Ticket::new("T-3", "Question about my invoice", Category::BillingQuestion, CustomerTier::Standard);

    let outcome = pipeline.process(ticket, &pipeline.compile_rules(&[])).unwrap();
    assert_eq!(outcome.routing.agent_id, Some(AgentId::from("agent-b")));
    assert_eq!(outcome.routing.alternatives[0].agent_id, AgentId::from("agent-a"));
    assert!(outcome.routing.alternatives[0].score < 0.24);
}

#[test]
fn test_vip_critical_ticket_without_vip_agent_is_held() {
    let pipeline = TriagePipeline::new(
        TriageConfig::default(),
        directory(vec![online("agent-a", Category::Complaint).critical_authorized().with_experience(5)]),
    )
    .unwrap();
    let ticket = Ticket::new("T-4", "This is unacceptable, fix it immediately", Category::Complaint, CustomerTier::Vip)
        .with_sentiment(SentimentLabel::Angry, -0.95);

    let outcome = pipeline.process(ticket, &pipeline.compile_rules(&[])).unwrap();
    assert_eq!(outcome.routing.agent_id, None);
    assert_eq!(outcome.routing.confidence, 0.0);
    assert_eq!(outcome.routing.reasons, vec![RoutingReason::NoEligibleAgent]);
    assert_eq!(outcome.ticket.assigned_agent, None);
    assert_eq!(pipeline.directory().get(&"agent-a".into()).unwrap().current_load, 0);
}

fn threshold_rules(first_action: &str) -> Vec<RuleDefinition> {
    vec![
        RuleDefinition::new("angry", "Angry customers", "sentiment", json!({"sentiments": ["angry"]}), first_action)
            .with_param("priority_boost", json!(1))
            .with_order(1),
        RuleDefinition::new("high", "High priority alert", "priority", json!({"min_priority": 4}), "notify").with_order(2),
    ]
}

#[test]
fn test_threshold_rule_sees_pre_boost_score_after_escalate() {
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![])).unwrap();
    let ticket = Ticket::new("T-5", "Please add dark mode", Category::FeatureRequest, CustomerTier::Standard)
        .with_sentiment(SentimentLabel::Angry, -0.7)
        .with_priority(PriorityScore::MEDIUM);

    let outcome = pipeline.apply_rules(&ticket, &threshold_rules("escalate")).unwrap();
    assert_eq!(outcome.kinds(), vec![ActionKind::Escalate]);
    assert_eq!(outcome.final_priority, PriorityScore::MEDIUM);
}

#[test]
fn test_threshold_rule_sees_boosted_score_after_boost() {
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![])).unwrap();
    let ticket = Ticket::new("T-5", "Please add dark mode", Category::FeatureRequest, CustomerTier::Standard)
        .with_sentiment(SentimentLabel::Angry, -0.7)
        .with_priority(PriorityScore::MEDIUM);

    let outcome = pipeline.apply_rules(&ticket, &threshold_rules("boost_priority")).unwrap();
    assert_eq!(outcome.kinds(), vec![ActionKind::BoostPriority, ActionKind::Notify]);
    assert_eq!(outcome.final_priority.value(), 4);
}

#[test]
fn test_rule_evaluation_is_repeatable() {
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![])).unwrap();
    let ticket = Ticket::new("T-6", "Refund still missing", Category::ReturnRefund, CustomerTier::Vip)
        .with_sentiment(SentimentLabel::Angry, -0.8)
        .with_priority(PriorityScore::MAX);
    let rules = deskroute_triage_engine::default_rules();

    let first = pipeline.apply_rules(&ticket, &rules).unwrap();
    for _ in 0..10 {
        assert_eq!(pipeline.apply_rules(&ticket, &rules).unwrap(), first);
    }
    assert_eq!(
        first.kinds(),
        vec![ActionKind::SkipQueue, ActionKind::Escalate, ActionKind::Notify, ActionKind::Reassign]
    );
}

#[test]
fn test_default_rules_route_billing_to_finance_team() {
    let pipeline = TriagePipeline::new(
        TriageConfig::default(),
        directory(vec![
            online("fin-2", Category::BillingQuestion).with_team("finance").with_load(2, 5),
            online("fin-1", Category::BillingQuestion).with_team("finance").with_load(1, 5),
            online("general", Category::BillingQuestion),
        ]),
    )
    .unwrap();
    let rules = pipeline.compile_rules(&deskroute_triage_engine::default_rules());
    let ticket = Ticket::new("T-7", "Charged twice for March", Category::BillingQuestion, CustomerTier::Standard);

    let outcome = pipeline.process(ticket, &rules).unwrap();
    assert_eq!(outcome.routing.agent_id, Some(AgentId::from("fin-1")));
    assert_eq!(outcome.routing.team.as_deref(), Some("finance"));
    assert!(outcome.routing.has_reason(RoutingReason::RuleOverride));
}

#[test]
fn test_config_file_changes_weights() {
    let config = TriageConfig::from_toml_str(
        r#"
        [priority]
        critical_categories = ["feature_request"]

        [priority.weights]
        free_customer = 0
        "#,
    )
    .unwrap();
    let pipeline = TriagePipeline::new(config, directory(vec![])).unwrap();
    let ticket = Ticket::new("T-8", "Dark mode please", Category::FeatureRequest, CustomerTier::Free);

    let evaluation = pipeline.evaluate(&ticket).unwrap();
    assert_eq!(evaluation.priority.value(), 4);
    assert_eq!(evaluation.factor_tags(), vec!["critical_category"]);
}

#[test]
fn test_angry_customer_still_reaches_a_junior_agent() {
    let junior = Agent::new("junior", "Junior")
        .with_skills([Category::GeneralInquiry])
        .with_experience(2)
        .with_load(0, 5)
        .with_status(AgentStatus::Online);
    let pipeline = TriagePipeline::new(TriageConfig::default(), directory(vec![junior])).unwrap();
    let rules = pipeline.compile_rules(&deskroute_triage_engine::default_rules());
    let ticket = Ticket::new("T-9", "Where is my order? Nobody answers me", Category::GeneralInquiry, CustomerTier::Standard)
        .with_sentiment(SentimentLabel::Angry, -0.8);

    let outcome = pipeline.process(ticket, &rules).unwrap();
    assert!(outcome.rules.kinds().contains(&ActionKind::Escalate));
    assert_eq!(outcome.routing.agent_id, Some(AgentId::from("junior")));
    assert!(outcome.routing.has_reason(RoutingReason::Escalated));
    assert_eq!(
        outcome.routing.escalation.as_ref().and_then(|e| e.to_team.as_deref()),
        Some("senior_support")
    );
}
