//! # Signal Extraction
//!
//! Derives lexical and structural signals from ticket text: urgency and impact
//! keyword hits, shouting/deadline/money patterns, and the most frequent terms.
//! Extraction is a pure function of its inputs. Only the keyword flags feed the
//! priority score; the remaining signals are carried for auditing.
//!
//! Matching is case-insensitive substring matching against every configured
//! language, because declared ticket languages are often wrong for mixed-language
//! customers.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::config::KeywordConfig;
use crate::ticket::{Category, CustomerTier, Ticket};

static DEADLINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)deadline|due date|\bby \w+ \d+|\buntil\b|son tarih|tarihe kadar|süre").unwrap()
});

static MONEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[$€£]\s?\d+|\d+\s*(tl|lira|dolar|euro|usd|eur)\b|\b(para|ücret|ödeme|fatura)\b").unwrap()
});

/// Structural patterns found in the text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextPatterns {
    /// Share of alphabetic characters that are uppercase
    pub caps_ratio: f64,
    pub exclamation_count: usize,
    pub question_count: usize,
    pub word_count: usize,
    pub has_deadline_mention: bool,
    pub has_money_mention: bool,
}

/// A repeated term and how often it appears
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

/// Everything the extractor found for one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    pub category: Category,
    pub customer_tier: CustomerTier,
    pub has_urgent_keyword: bool,
    pub has_high_impact_keyword: bool,
    /// Matched urgent keywords in configuration order
    pub urgent_matches: Vec<String>,
    /// Matched high-impact keywords in configuration order
    pub high_impact_matches: Vec<String>,
    pub patterns: TextPatterns,
    pub top_terms: Vec<TermCount>,
}

impl SignalSet {
    /// Signal set for a ticket with no usable text
    pub fn empty(category: Category, customer_tier: CustomerTier) -> Self {
        Self {
            category,
            customer_tier,
            has_urgent_keyword: false,
            has_high_impact_keyword: false,
            urgent_matches: Vec::new(),
            high_impact_matches: Vec::new(),
            patterns: TextPatterns::default(),
            top_terms: Vec::new(),
        }
    }
}

/// Keyword and pattern matcher built from a [`KeywordConfig`]
#[derive(Debug, Clone)]
pub struct SignalExtractor {
    urgent_words: Vec<String>,
    high_impact_words: Vec<String>,
    top_terms: usize,
    min_term_length: usize,
}

impl SignalExtractor {
    pub fn new(config: &KeywordConfig) -> Self {
        Self {
            urgent_words: flatten_keywords(&config.urgent_words),
            high_impact_words: flatten_keywords(&config.high_impact_words),
            top_terms: config.top_terms,
            min_term_length: config.min_term_length,
        }
    }

    /// Extract signals from raw text. `None` or blank text yields an all-false set.
    pub fn extract(&self, text: Option<&str>, category: &Category, tier: CustomerTier) -> SignalSet {
        let text = match text {
            Some(text) if !text.trim().is_empty() => text,
            _ => return SignalSet::empty(category.clone(), tier),
        };

        let lowered = text.to_lowercase();
        let urgent_matches = find_keywords(&lowered, &self.urgent_words);
        let high_impact_matches = find_keywords(&lowered, &self.high_impact_words);

        SignalSet {
            category: category.clone(),
            customer_tier: tier,
            has_urgent_keyword: !urgent_matches.is_empty(),
            has_high_impact_keyword: !high_impact_matches.is_empty(),
            urgent_matches,
            high_impact_matches,
            patterns: analyze_patterns(text),
            top_terms: self.frequent_terms(&lowered),
        }
    }

    /// Extract from a ticket's subject and content
    pub fn extract_ticket(&self, ticket: &Ticket) -> SignalSet {
        let text = ticket.full_text();
        self.extract(Some(&text), ticket.category(), ticket.tier())
    }

    fn frequent_terms(&self, lowered: &str) -> Vec<TermCount> {
        if self.top_terms == 0 {
            return Vec::new();
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for term in lowered.split(|c: char| !c.is_alphanumeric()) {
            if term.chars().count() >= self.min_term_length {
                *counts.entry(term).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<TermCount> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(term, count)| TermCount { term: term.to_string(), count })
            .collect();

        // BTreeMap order gives the alphabetical tie-break
        terms.sort_by(|a, b| b.count.cmp(&a.count));
        terms.truncate(self.top_terms);
        terms
    }
}

fn flatten_keywords(lists: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .values()
        .flatten()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty() && seen.insert(word.clone()))
        .collect()
}

fn find_keywords(lowered: &str, keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .filter(|keyword| lowered.contains(keyword.as_str()))
        .cloned()
        .collect()
}

fn analyze_patterns(text: &str) -> TextPatterns {
    let mut alphabetic = 0usize;
    let mut uppercase = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        alphabetic += 1;
        if c.is_uppercase() {
            uppercase += 1;
        }
    }

    TextPatterns {
        caps_ratio: if alphabetic == 0 { 0.0 } else { uppercase as f64 / alphabetic as f64 },
        exclamation_count: text.matches('!').count(),
        question_count: text.matches('?').count(),
        word_count: text.split_whitespace().count(),
        has_deadline_mention: DEADLINE_PATTERN.is_match(text),
        has_money_mention: MONEY_PATTERN.is_match(text),
    }
}
