//! Loading tickets, rules and agent rosters from TOML or JSON files

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use deskroute_triage_engine::agent::{Agent, AgentDirectory, SystemClock};
use deskroute_triage_engine::rules::{default_rules, RuleDefinition};
use deskroute_triage_engine::ticket::Ticket;
use deskroute_triage_engine::TriageConfig;

#[derive(Debug, Deserialize)]
struct Roster {
    agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

#[derive(Debug, Deserialize)]
struct TicketBatch {
    tickets: Vec<Ticket>,
}

pub fn config(path: Option<&Path>) -> Result<TriageConfig> {
    match path {
        Some(path) => TriageConfig::from_file(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(TriageConfig::default()),
    }
}

pub fn ticket(path: &Path) -> Result<Ticket> {
    deskroute_infra_common::load_file(path).with_context(|| format!("loading ticket {}", path.display()))
}

pub fn tickets(path: &Path) -> Result<Vec<Ticket>> {
    let batch: TicketBatch =
        deskroute_infra_common::load_file(path).with_context(|| format!("loading tickets {}", path.display()))?;
    Ok(batch.tickets)
}

/// Rule definitions from a file, or the built-in defaults
pub fn rules(path: Option<&Path>) -> Result<Vec<RuleDefinition>> {
    match path {
        Some(path) => {
            let file: RuleFile =
                deskroute_infra_common::load_file(path).with_context(|| format!("loading rules {}", path.display()))?;
            Ok(file.rules)
        }
        None => Ok(default_rules()),
    }
}

pub fn directory(path: &Path) -> Result<Arc<AgentDirectory>> {
    let roster: Roster =
        deskroute_infra_common::load_file(path).with_context(|| format!("loading agents {}", path.display()))?;
    let directory = AgentDirectory::from_agents(roster.agents, Arc::new(SystemClock))
        .with_context(|| format!("registering agents from {}", path.display()))?;
    Ok(Arc::new(directory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_rules_file_means_defaults() {
        assert_eq!(rules(None).unwrap(), default_rules());
    }

    #[test]
    fn test_rules_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "rules.toml",
            r#"
            [[rules]]
            id = "vip"
            name = "VIP first"
            rule_type = "customer"
            action = "skip_queue"
            conditions = { tiers = ["vip"] }
            "#,
        );

        let loaded = rules(Some(&path)).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "vip");
        assert!(loaded[0].enabled);
    }

    #[test]
    fn test_duplicate_agents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "agents.json",
            r#"{"agents": [{"id": "a", "name": "A"}, {"id": "a", "name": "Again"}]}"#,
        );

        assert!(directory(&path).is_err());
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "ticket.yaml", "id: T-1");
        assert!(ticket(&path).is_err());
    }
}
