//! Property tests for scoring bounds, purity and ranking order

use std::sync::Arc;

use proptest::prelude::*;

use deskroute_triage_engine::agent::{Agent, AgentDirectory, AgentStatus};
use deskroute_triage_engine::config::{PriorityConfig, PriorityWeights, RoutingConfig};
use deskroute_triage_engine::priority::PriorityScorer;
use deskroute_triage_engine::routing::RoutingEngine;
use deskroute_triage_engine::signals::SignalSet;
use deskroute_triage_engine::ticket::{Category, CustomerTier, PriorityScore, SentimentLabel, Ticket};

fn sentiment() -> impl Strategy<Value = SentimentLabel> {
    prop_oneof![
        Just(SentimentLabel::Positive),
        Just(SentimentLabel::Neutral),
        Just(SentimentLabel::Negative),
        Just(SentimentLabel::Angry),
    ]
}

fn tier() -> impl Strategy<Value = CustomerTier> {
    prop_oneof![
        Just(CustomerTier::Free),
        Just(CustomerTier::Standard),
        Just(CustomerTier::Premium),
        Just(CustomerTier::Vip),
    ]
}

fn category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::BUILTIN.to_vec())
}

fn weights() -> impl Strategy<Value = PriorityWeights> {
    prop::array::uniform8(-10i32..10).prop_map(|w| PriorityWeights {
        urgent_keyword: w[0],
        high_impact_keyword: w[1],
        negative_sentiment: w[2],
        angry_sentiment: w[3],
        vip_customer: w[4],
        premium_customer: w[5],
        free_customer: w[6],
        critical_category: w[7],
    })
}

fn candidate() -> impl Strategy<Value = (u32, u32, u8, u8)> {
    (1u32..8).prop_flat_map(|max| (0..max, Just(max), 1u8..=5, 0u8..=50))
}

proptest! {
    #[test]
    fn score_stays_in_range(
        urgent in any::<bool>(),
        high_impact in any::<bool>(),
        label in sentiment(),
        tier in tier(),
        category in category(),
        base in -5i32..10,
        weights in weights(),
    ) {
        let scorer = PriorityScorer::new(PriorityConfig { base, weights, ..PriorityConfig::default() });
        let mut signals = SignalSet::empty(category.clone(), tier);
        signals.has_urgent_keyword = urgent;
        signals.has_high_impact_keyword = high_impact;

        let outcome = scorer.score(&signals, label, tier, &category);
        prop_assert!(outcome.score >= PriorityScore::MIN);
        prop_assert!(outcome.score <= PriorityScore::MAX);
        prop_assert_eq!(outcome.breakdown.unclamped, base + outcome.factors.iter().map(|f| f.weight).sum::<i32>());
    }

    #[test]
    fn score_is_pure(
        text in ".{0,120}",
        label in sentiment(),
        tier in tier(),
        category in category(),
    ) {
        let scorer = PriorityScorer::default();
        let extractor = deskroute_triage_engine::signals::SignalExtractor::new(&Default::default());

        let first = scorer.score(&extractor.extract(Some(&text), &category, tier), label, tier, &category);
        let second = scorer.score(&extractor.extract(Some(&text), &category, tier), label, tier, &category);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn ranking_is_a_total_order(
        candidates in prop::collection::vec(candidate(), 1..12),
        priority in 1u8..=5,
    ) {
        let agents: Vec<Agent> = candidates
            .iter()
            .enumerate()
            .map(|(i, (current, max, experience, satisfaction))| {
                Agent::new(format!("agent-{:02}", i), "agent")
                    .with_skills([Category::TechnicalIssue])
                    .with_load(*current, *max)
                    .with_experience(*experience)
                    .with_satisfaction(*satisfaction as f64 / 10.0)
                    .with_status(AgentStatus::Online)
            })
            .collect();
        let directory = Arc::new(AgentDirectory::new());
        let engine = RoutingEngine::new(RoutingConfig::default(), &PriorityConfig::default(), directory);
        let priority = PriorityScore::try_from(priority).unwrap();
        let ticket = Ticket::new("T-1", "x", Category::TechnicalIssue, CustomerTier::Standard).with_priority(priority);

        let mut reversed = agents.clone();
        reversed.reverse();
        let forward = engine.rank(&ticket, priority, agents);
        let backward = engine.rank(&ticket, priority, reversed);

        // Input order never matters
        let forward_ids: Vec<_> = forward.iter().map(|c| c.agent.id.clone()).collect();
        let backward_ids: Vec<_> = backward.iter().map(|c| c.agent.id.clone()).collect();
        prop_assert_eq!(&forward_ids, &backward_ids);

        for pair in forward.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.score >= b.score);
            if a.score == b.score {
                prop_assert!(a.agent.current_load <= b.agent.current_load);
                if a.agent.current_load == b.agent.current_load {
                    prop_assert!(a.agent.id < b.agent.id);
                }
            }
        }
    }
}
