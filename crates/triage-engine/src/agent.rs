//! # Agent Directory & Load Tracker
//!
//! The directory is the authoritative in-memory view of support agents: what they
//! can handle (skills, languages, experience, authorizations), whether they are
//! reachable (status, working hours) and how busy they are (current vs. maximum
//! load).
//!
//! ## Hard Constraints
//!
//! [`AgentDirectory::candidates`] returns only agents that satisfy every
//! constraint of a [`CandidateQuery`]:
//!
//! - status is [`AgentStatus::Online`]
//! - skills include the ticket category
//! - languages include the requested language, when one is requested
//! - experience is at least the requested minimum
//! - current load is below max load
//! - VIP / critical authorization when the query requires it
//! - the directory clock falls inside the agent's working-hours window
//!
//! Agents failing any constraint are absent from the result rather than ranked low.
//!
//! ## Load Accounting
//!
//! Agent load is the only state this crate mutates. Each agent record sits behind
//! its own lock, so [`reserve`](AgentDirectory::reserve) and
//! [`release`](AgentDirectory::release) are serialized per agent while different
//! agents never contend. A reservation re-checks status and capacity under the
//! lock; `current_load <= max_load` holds at all times.
//!
//! ```
//! use deskroute_triage_engine::agent::{Agent, AgentDirectory, AgentStatus};
//! use deskroute_triage_engine::ticket::Category;
//!
//! let directory = AgentDirectory::new();
//! directory
//!     .register(
//!         Agent::new("agent-001", "Alice")
//!             .with_skills([Category::BillingQuestion])
//!             .with_load(0, 1)
//!             .with_status(AgentStatus::Online),
//!     )
//!     .unwrap();
//!
//! assert_eq!(directory.reserve(&"agent-001".into()).unwrap(), 1);
//! assert!(directory.reserve(&"agent-001".into()).is_err());
//! ```

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, TriageError};
use crate::ticket::Category;

/// Agent identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AgentId {
    fn from(value: String) -> Self {
        AgentId(value)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        AgentId(value.to_string())
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Busy,
    OnBreak,
    Away,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Busy => "busy",
            AgentStatus::OnBreak => "on_break",
            AgentStatus::Away => "away",
        }
    }
}

impl Default for AgentStatus {
    fn default() -> Self {
        AgentStatus::Offline
    }
}

impl FromStr for AgentStatus {
    type Err = TriageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" | "available" => Ok(AgentStatus::Online),
            "offline" => Ok(AgentStatus::Offline),
            "busy" => Ok(AgentStatus::Busy),
            "on_break" | "break" => Ok(AgentStatus::OnBreak),
            "away" => Ok(AgentStatus::Away),
            other => Err(TriageError::InvalidInput(format!("Unknown agent status: {}", other))),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}

fn all_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

/// Daily working window in a fixed UTC offset. A window whose end is earlier than
/// its start runs past midnight into the next day; equal start and end mean the
/// whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Days on which a window starts
    #[serde(default = "all_days")]
    pub days: Vec<Weekday>,
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            utc_offset_minutes: 0,
            days: all_days(),
        }
    }

    pub fn with_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn with_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt)
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let offset = match self.offset() {
            Some(offset) => offset,
            None => return false,
        };
        let local = now.with_timezone(&offset);
        let (day, time) = (local.weekday(), local.time());

        if self.start == self.end {
            self.days.contains(&day)
        } else if self.start < self.end {
            self.days.contains(&day) && time >= self.start && time < self.end
        } else {
            (time >= self.start && self.days.contains(&day)) || (time < self.end && self.days.contains(&day.pred()))
        }
    }
}

/// Running performance statistics, read-only for routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPerformance {
    pub resolved_count: u64,
    pub avg_resolution_secs: Option<f64>,
    /// Customer satisfaction on the configured scale (default 0 to 5)
    pub satisfaction_score: f64,
}

impl Default for AgentPerformance {
    fn default() -> Self {
        Self {
            resolved_count: 0,
            avg_resolution_secs: None,
            satisfaction_score: 0.0,
        }
    }
}

/// Support agent snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub skills: Vec<Category>,
    #[serde(default)]
    pub languages: Vec<String>,
    /// 1 (junior) to 5 (expert)
    #[serde(default = "default_experience")]
    pub experience_level: u8,
    #[serde(default)]
    pub current_load: u32,
    #[serde(default = "default_max_load")]
    pub max_load: u32,
    #[serde(default)]
    pub status: AgentStatus,
    /// No window means always working
    #[serde(default)]
    pub working_hours: Option<WorkingHours>,
    #[serde(default)]
    pub vip_authorized: bool,
    #[serde(default)]
    pub critical_authorized: bool,
    #[serde(default)]
    pub performance: AgentPerformance,
}

fn default_experience() -> u8 {
    1
}

fn default_max_load() -> u32 {
    10
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            team: None,
            skills: Vec::new(),
            languages: Vec::new(),
            experience_level: default_experience(),
            current_load: 0,
            max_load: default_max_load(),
            status: AgentStatus::Offline,
            working_hours: None,
            vip_authorized: false,
            critical_authorized: false,
            performance: AgentPerformance::default(),
        }
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn with_skills(mut self, skills: impl IntoIterator<Item = Category>) -> Self {
        self.skills = skills.into_iter().collect();
        self
    }

    pub fn with_languages<S: Into<String>>(mut self, languages: impl IntoIterator<Item = S>) -> Self {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_experience(mut self, level: u8) -> Self {
        self.experience_level = level;
        self
    }

    pub fn with_load(mut self, current: u32, max: u32) -> Self {
        self.current_load = current;
        self.max_load = max;
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = Some(hours);
        self
    }

    pub fn with_satisfaction(mut self, score: f64) -> Self {
        self.performance.satisfaction_score = score;
        self
    }

    pub fn vip_authorized(mut self) -> Self {
        self.vip_authorized = true;
        self
    }

    pub fn critical_authorized(mut self) -> Self {
        self.critical_authorized = true;
        self
    }

    pub fn has_capacity(&self) -> bool {
        self.current_load < self.max_load
    }

    pub fn has_skill(&self, category: &Category) -> bool {
        self.skills.contains(category)
    }

    pub fn speaks(&self, language: &str) -> bool {
        let language = language.trim();
        self.languages.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    pub fn is_working_at(&self, now: DateTime<Utc>) -> bool {
        self.working_hours.as_ref().is_none_or(|hours| hours.contains(now))
    }

    /// Load as a fraction of capacity
    pub fn load_ratio(&self) -> f64 {
        if self.max_load == 0 {
            1.0
        } else {
            self.current_load as f64 / self.max_load as f64
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.0.trim().is_empty() {
            return Err(TriageError::InvalidInput("Agent id is empty".to_string()));
        }
        if !(1..=5).contains(&self.experience_level) {
            return Err(TriageError::InvalidInput(format!(
                "Agent {}: experience level {} outside 1..=5",
                self.id, self.experience_level
            )));
        }
        if self.max_load == 0 || self.current_load > self.max_load {
            return Err(TriageError::InvalidInput(format!(
                "Agent {}: load {}/{} is not valid",
                self.id, self.current_load, self.max_load
            )));
        }
        let satisfaction = self.performance.satisfaction_score;
        if !satisfaction.is_finite() || satisfaction < 0.0 {
            return Err(TriageError::InvalidInput(format!(
                "Agent {}: satisfaction score {} must be non-negative",
                self.id, satisfaction
            )));
        }
        if let Some(hours) = &self.working_hours {
            if hours.offset().is_none() {
                return Err(TriageError::InvalidInput(format!(
                    "Agent {}: UTC offset {} minutes out of range",
                    self.id, hours.utc_offset_minutes
                )));
            }
        }
        Ok(())
    }

    fn satisfies(&self, query: &CandidateQuery, now: DateTime<Utc>) -> bool {
        self.status == AgentStatus::Online
            && self.has_skill(&query.category)
            && query.language.as_deref().is_none_or(|language| self.speaks(language))
            && self.experience_level >= query.min_experience
            && self.has_capacity()
            && (!query.require_vip || self.vip_authorized)
            && (!query.require_critical || self.critical_authorized)
            && query.team.as_deref().is_none_or(|team| self.team.as_deref() == Some(team))
            && !query.exclude.contains(&self.id)
            && self.is_working_at(now)
    }
}

/// Hard constraints for a candidate lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub category: Category,
    pub language: Option<String>,
    pub min_experience: u8,
    pub require_vip: bool,
    pub require_critical: bool,
    /// Restrict to one team
    pub team: Option<String>,
    /// Agents to leave out (reassignment)
    pub exclude: Vec<AgentId>,
}

impl CandidateQuery {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            language: None,
            min_experience: 1,
            require_vip: false,
            require_critical: false,
            team: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_min_experience(mut self, level: u8) -> Self {
        self.min_experience = level;
        self
    }

    pub fn require_vip(mut self, required: bool) -> Self {
        self.require_vip = required;
        self
    }

    pub fn require_critical(mut self, required: bool) -> Self {
        self.require_critical = required;
        self
    }

    pub fn in_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn excluding(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.exclude.extend(agents);
        self
    }
}

/// Time source for working-hours checks
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Directory-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub total: usize,
    pub online: usize,
    pub busy: usize,
    pub offline: usize,
    pub on_break: usize,
    pub away: usize,
    /// Online agents with spare capacity
    pub available: usize,
    pub total_load: u64,
    pub total_capacity: u64,
}

/// In-memory agent arena with per-agent locks
#[derive(Debug)]
pub struct AgentDirectory {
    agents: DashMap<AgentId, Arc<Mutex<Agent>>>,
    clock: Arc<dyn Clock>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            agents: DashMap::new(),
            clock,
        }
    }

    /// Build a directory from a snapshot, rejecting invalid or duplicate agents
    pub fn from_agents(agents: impl IntoIterator<Item = Agent>, clock: Arc<dyn Clock>) -> Result<Self> {
        let directory = Self::with_clock(clock);
        for agent in agents {
            directory.register(agent)?;
        }
        Ok(directory)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn register(&self, agent: Agent) -> Result<()> {
        agent.validate()?;

        match self.agents.entry(agent.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TriageError::DuplicateAgent(agent.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!("Registered agent {} ({}) with {} skills", agent.id, agent.name, agent.skills.len());
                slot.insert(Arc::new(Mutex::new(agent)));
                Ok(())
            }
        }
    }

    pub fn remove(&self, id: &AgentId) -> Result<Agent> {
        let (_, slot) = self
            .agents
            .remove(id)
            .ok_or_else(|| TriageError::AgentNotFound(id.clone()))?;
        info!("Removed agent {}", id);
        let agent = slot.lock().clone();
        Ok(agent)
    }

    fn slot(&self, id: &AgentId) -> Result<Arc<Mutex<Agent>>> {
        self.agents
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| TriageError::AgentNotFound(id.clone()))
    }

    pub fn get(&self, id: &AgentId) -> Option<Agent> {
        self.slot(id).ok().map(|slot| slot.lock().clone())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Set an agent's status, returning the previous one
    pub fn update_status(&self, id: &AgentId, status: AgentStatus) -> Result<AgentStatus> {
        let slot = self.slot(id)?;
        let mut agent = slot.lock();
        let previous = agent.status;
        agent.status = status;
        if previous != status {
            info!("Agent {} status {} -> {}", id, previous, status);
        }
        Ok(previous)
    }

    /// Snapshot of every agent, ordered by id
    pub fn list(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|entry| entry.value().lock().clone()).collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    /// Agents satisfying every hard constraint, ordered by id
    pub fn candidates(&self, query: &CandidateQuery) -> Vec<Agent> {
        let now = self.clock.now();
        let mut agents: Vec<Agent> = self
            .agents
            .iter()
            .filter_map(|entry| {
                let agent = entry.value().lock();
                agent.satisfies(query, now).then(|| agent.clone())
            })
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(
            "{} candidates for category={} language={:?} min_experience={} vip={} critical={}",
            agents.len(),
            query.category,
            query.language,
            query.min_experience,
            query.require_vip,
            query.require_critical
        );
        agents
    }

    /// Members of a team regardless of availability, ordered by id
    pub fn team_members(&self, team: &str) -> Vec<Agent> {
        self.list()
            .into_iter()
            .filter(|agent| agent.team.as_deref() == Some(team))
            .collect()
    }

    /// Take one slot of the agent's capacity. Fails with
    /// [`TriageError::ReservationConflict`] if the agent went offline or filled up
    /// since it was listed as a candidate.
    pub fn reserve(&self, id: &AgentId) -> Result<u32> {
        let slot = self.slot(id)?;
        let mut agent = slot.lock();

        if agent.status != AgentStatus::Online || !agent.has_capacity() {
            debug!(
                "Reservation conflict for {}: status={} load={}/{}",
                id, agent.status, agent.current_load, agent.max_load
            );
            return Err(TriageError::ReservationConflict(id.clone()));
        }

        agent.current_load += 1;
        debug!("Reserved agent {} (load {}/{})", id, agent.current_load, agent.max_load);
        Ok(agent.current_load)
    }

    /// Give back one slot of capacity
    pub fn release(&self, id: &AgentId) -> Result<u32> {
        let slot = self.slot(id)?;
        let mut agent = slot.lock();

        if agent.current_load == 0 {
            warn!("Release for agent {} with no load", id);
        } else {
            agent.current_load -= 1;
        }
        debug!("Released agent {} (load {}/{})", id, agent.current_load, agent.max_load);
        Ok(agent.current_load)
    }

    pub fn statistics(&self) -> DirectoryStats {
        let mut stats = DirectoryStats::default();

        for entry in self.agents.iter() {
            let agent = entry.value().lock();
            stats.total += 1;
            match agent.status {
                AgentStatus::Online => {
                    stats.online += 1;
                    if agent.has_capacity() {
                        stats.available += 1;
                    }
                }
                AgentStatus::Busy => stats.busy += 1,
                AgentStatus::Offline => stats.offline += 1,
                AgentStatus::OnBreak => stats.on_break += 1,
                AgentStatus::Away => stats.away += 1,
            }
            stats.total_load += agent.current_load as u64;
            stats.total_capacity += agent.max_load as u64;
        }

        stats
    }
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}
