//! # Ticket Evaluation Model
//!
//! The evaluation view of a support ticket: what the upstream classifier and
//! sentiment analyzer produced, plus the values this crate attaches (priority,
//! factor tags, routing outcome).
//!
//! Tickets are immutable snapshots from the caller's point of view. The pipeline
//! consumes a ticket and hands back a new one with results attached; nothing here
//! is shared or retained between calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::agent::AgentId;
use crate::error::{Result, TriageError};
use crate::routing::{AlternativeCandidate, RoutingResult};

/// Ticket topic. The built-in set can be extended through configuration, in which
/// case the extension arrives here as [`Category::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    TechnicalIssue,
    BillingQuestion,
    FeatureRequest,
    BugReport,
    AccountManagement,
    ReturnRefund,
    GeneralInquiry,
    Complaint,
    Custom(String),
}

impl Category {
    /// All built-in categories in declaration order
    pub const BUILTIN: [Category; 8] = [
        Category::TechnicalIssue,
        Category::BillingQuestion,
        Category::FeatureRequest,
        Category::BugReport,
        Category::AccountManagement,
        Category::ReturnRefund,
        Category::GeneralInquiry,
        Category::Complaint,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Category::TechnicalIssue => "technical_issue",
            Category::BillingQuestion => "billing_question",
            Category::FeatureRequest => "feature_request",
            Category::BugReport => "bug_report",
            Category::AccountManagement => "account_management",
            Category::ReturnRefund => "return_refund",
            Category::GeneralInquiry => "general_inquiry",
            Category::Complaint => "complaint",
            Category::Custom(name) => name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Category::Custom(_))
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "technical_issue" => Category::TechnicalIssue,
            "billing_question" => Category::BillingQuestion,
            "feature_request" => Category::FeatureRequest,
            "bug_report" => Category::BugReport,
            "account_management" => Category::AccountManagement,
            "return_refund" => Category::ReturnRefund,
            "general_inquiry" => Category::GeneralInquiry,
            "complaint" => Category::Complaint,
            _ => Category::Custom(normalized),
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from(value.as_str())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer account level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerTier {
    Free,
    Standard,
    Premium,
    /// Enterprise accounts are handled as VIP
    #[serde(alias = "enterprise")]
    Vip,
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Free => "free",
            CustomerTier::Standard => "standard",
            CustomerTier::Premium => "premium",
            CustomerTier::Vip => "vip",
        }
    }
}

impl Default for CustomerTier {
    fn default() -> Self {
        CustomerTier::Standard
    }
}

impl FromStr for CustomerTier {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(CustomerTier::Free),
            "standard" => Ok(CustomerTier::Standard),
            "premium" => Ok(CustomerTier::Premium),
            "vip" | "enterprise" => Ok(CustomerTier::Vip),
            other => Err(TriageError::InvalidInput(format!("Unknown customer tier: {}", other))),
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment label produced by the upstream analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Angry,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
            SentimentLabel::Angry => "angry",
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            "angry" => Ok(SentimentLabel::Angry),
            other => Err(TriageError::InvalidInput(format!("Unknown sentiment label: {}", other))),
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment result: label plus a score in [-1.0, 1.0]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

impl Sentiment {
    pub fn new(label: SentimentLabel, score: f64) -> Self {
        Self { label, score }
    }

    pub fn neutral() -> Self {
        Self::new(SentimentLabel::Neutral, 0.0)
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Classification result: category plus confidence in [0.0, 1.0]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub confidence: f64,
}

impl Classification {
    pub fn new(category: impl Into<Category>, confidence: f64) -> Self {
        Self {
            category: category.into(),
            confidence,
        }
    }
}

/// Priority on the closed 1..=5 scale. Construction saturates at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8")]
pub struct PriorityScore(u8);

impl PriorityScore {
    pub const MIN: PriorityScore = PriorityScore(1);
    pub const MAX: PriorityScore = PriorityScore(5);
    pub const MEDIUM: PriorityScore = PriorityScore(3);

    /// Clamp a running total into range
    pub fn clamped(total: i32) -> Self {
        PriorityScore(total.clamp(Self::MIN.0 as i32, Self::MAX.0 as i32) as u8)
    }

    pub fn saturating_add(self, delta: i32) -> Self {
        Self::clamped(self.0 as i32 + delta)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn level(self) -> PriorityLevel {
        PriorityLevel::from_score(self)
    }
}

impl TryFrom<u8> for PriorityScore {
    type Error = TriageError;

    fn try_from(value: u8) -> Result<Self> {
        if (Self::MIN.0..=Self::MAX.0).contains(&value) {
            Ok(PriorityScore(value))
        } else {
            Err(TriageError::InvalidInput(format!("Priority {} outside 1..=5", value)))
        }
    }
}

impl fmt::Display for PriorityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named priority level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn from_score(score: PriorityScore) -> Self {
        match score.value() {
            5 => PriorityLevel::Critical,
            4 => PriorityLevel::High,
            3 => PriorityLevel::Medium,
            2 => PriorityLevel::Low,
            _ => PriorityLevel::Minimal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Minimal => "minimal",
            PriorityLevel::Low => "low",
            PriorityLevel::Medium => "medium",
            PriorityLevel::High => "high",
            PriorityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        TicketId(value.to_string())
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        TicketId(value)
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the customer who opened the ticket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub tier: CustomerTier,
}

/// Evaluation view of a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub content: String,
    /// Detected or declared language code ("en", "tr", ...)
    #[serde(default)]
    pub language: Option<String>,
    /// Intake channel (email, zendesk, ...)
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub customer: CustomerRef,
    pub classification: Classification,
    #[serde(default)]
    pub sentiment: Sentiment,

    // Attached by the pipeline
    #[serde(default)]
    pub priority: Option<PriorityScore>,
    #[serde(default)]
    pub priority_level: Option<PriorityLevel>,
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub assigned_agent: Option<AgentId>,
    #[serde(default)]
    pub routing_confidence: Option<f64>,
    #[serde(default)]
    pub alternatives: Vec<AlternativeCandidate>,
}

impl Ticket {
    pub fn new(id: impl Into<TicketId>, content: impl Into<String>, category: impl Into<Category>, tier: CustomerTier) -> Self {
        Self {
            id: id.into(),
            subject: None,
            content: content.into(),
            language: None,
            source: None,
            customer: CustomerRef { id: None, tier },
            classification: Classification::new(category, 1.0),
            sentiment: Sentiment::neutral(),
            priority: None,
            priority_level: None,
            factors: Vec::new(),
            assigned_agent: None,
            routing_confidence: None,
            alternatives: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_sentiment(mut self, label: SentimentLabel, score: f64) -> Self {
        self.sentiment = Sentiment::new(label, score);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.classification.confidence = confidence;
        self
    }

    /// Set a priority directly (tickets evaluated elsewhere, tests)
    pub fn with_priority(mut self, priority: PriorityScore) -> Self {
        self.priority = Some(priority);
        self.priority_level = Some(priority.level());
        self
    }

    pub fn category(&self) -> &Category {
        &self.classification.category
    }

    pub fn tier(&self) -> CustomerTier {
        self.customer.tier
    }

    /// Subject and content joined for text matching
    pub fn full_text(&self) -> String {
        match &self.subject {
            Some(subject) if !subject.is_empty() => format!("{}\n{}", subject, self.content),
            _ => self.content.clone(),
        }
    }

    /// Priority computed by a previous evaluation pass
    pub fn evaluated_priority(&self) -> Result<PriorityScore> {
        self.priority.ok_or_else(|| {
            TriageError::InvalidInput(format!("Ticket {} has no priority; evaluate it first", self.id))
        })
    }

    /// Check the fields every evaluation depends on
    pub fn validate(&self) -> Result<()> {
        if self.id.0.trim().is_empty() {
            return Err(TriageError::InvalidInput("Ticket id is empty".to_string()));
        }

        let confidence = self.classification.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(TriageError::InvalidInput(format!(
                "Ticket {}: category confidence {} outside [0, 1]",
                self.id, confidence
            )));
        }

        let score = self.sentiment.score;
        if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
            return Err(TriageError::InvalidInput(format!(
                "Ticket {}: sentiment score {} outside [-1, 1]",
                self.id, score
            )));
        }

        if self.classification.category.as_str().is_empty() {
            return Err(TriageError::InvalidInput(format!("Ticket {}: category is empty", self.id)));
        }

        if matches!(&self.language, Some(lang) if lang.trim().is_empty()) {
            return Err(TriageError::InvalidInput(format!("Ticket {}: language is blank", self.id)));
        }

        Ok(())
    }

    /// Attach a routing outcome, returning the updated snapshot
    pub fn with_routing(mut self, result: &RoutingResult) -> Self {
        self.assigned_agent = result.agent_id.clone();
        self.routing_confidence = Some(result.confidence);
        self.alternatives = result.alternatives.clone();
        self
    }
}
