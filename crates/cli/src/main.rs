//! deskroute command-line tool
//!
//! Scores, rule-checks and routes support tickets from local files and prints
//! the results as JSON.

mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};

use deskroute_infra_common::logging::{log_welcome, parse_log_level, setup_logging, LoggingConfig};
use deskroute_triage_engine::agent::AgentDirectory;
use deskroute_triage_engine::priority::OverrideDirection;
use deskroute_triage_engine::TriagePipeline;

#[derive(Parser, Debug)]
#[command(author, version, about = "Support ticket triage and routing", long_about = None)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true, env = "DESKROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print compact JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute priority and factors for a ticket
    Score {
        ticket: PathBuf,
    },
    /// Run the rule pass over a scored ticket
    Rules {
        ticket: PathBuf,
        /// Rule file; the built-in rules are used when omitted
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Score, apply rules and route a ticket
    Route {
        ticket: PathBuf,
        #[arg(short, long)]
        agents: PathBuf,
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Route every ticket in a `tickets = [...]` file
    Batch {
        tickets: PathBuf,
        #[arg(short, long)]
        agents: PathBuf,
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Rank eligible agents without reserving any
    Recommend {
        ticket: PathBuf,
        #[arg(short, long)]
        agents: PathBuf,
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },
    /// Manually raise or lower a ticket's priority
    Override {
        ticket: PathBuf,
        #[arg(value_enum)]
        direction: Direction,
        /// Why the priority changed
        #[arg(short, long = "reason")]
        reasons: Vec<String>,
    },
    /// Directory counters for an agent roster
    Stats {
        #[arg(short, long)]
        agents: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Direction {
    Up,
    Down,
}

impl From<Direction> for OverrideDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => OverrideDirection::Up,
            Direction::Down => OverrideDirection::Down,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = input::config(cli.config.as_deref())?;

    let mut logging = LoggingConfig::from_section(&config.logging, "deskroute")?;
    if let Some(level) = &cli.log_level {
        logging.level = parse_log_level(level)?;
    }
    setup_logging(logging)?;
    log_welcome("deskroute", env!("CARGO_PKG_VERSION"));

    let compact = cli.compact;
    match cli.command {
        Command::Score { ticket } => {
            let pipeline = TriagePipeline::new(config, Arc::new(AgentDirectory::new()))?;
            let ticket = input::ticket(&ticket)?;
            print(&pipeline.evaluate(&ticket)?, compact)
        }
        Command::Rules { ticket, rules } => {
            let pipeline = TriagePipeline::new(config, Arc::new(AgentDirectory::new()))?;
            let ticket = input::ticket(&ticket)?;
            let ticket = pipeline.evaluate(&ticket)?.attach(ticket);
            let rules = pipeline.compile_rules(&input::rules(rules.as_deref())?);
            for failure in rules.failures() {
                info!("Skipped rule {}: {}", failure.rule_id, failure.reason);
            }
            print(&pipeline.apply_compiled(&ticket, &rules)?, compact)
        }
        Command::Route { ticket, agents, rules } => {
            let pipeline = TriagePipeline::new(config, input::directory(&agents)?)?;
            let rules = pipeline.compile_rules(&input::rules(rules.as_deref())?);
            let outcome = pipeline.process(input::ticket(&ticket)?, &rules)?;
            print(&outcome, compact)
        }
        Command::Batch { tickets, agents, rules } => {
            let pipeline = Arc::new(TriagePipeline::new(config, input::directory(&agents)?)?);
            let tickets = input::tickets(&tickets)?;
            let rules = input::rules(rules.as_deref())?;
            debug!("Routing batch of {} tickets", tickets.len());

            let results = pipeline.process_batch(tickets, &rules).await;
            let outcomes = results
                .into_iter()
                .map(|result| match result {
                    Ok(outcome) => serde_json::to_value(outcome).context("serializing outcome"),
                    Err(e) => Ok(serde_json::json!({ "error": e.to_string() })),
                })
                .collect::<Result<Vec<_>>>()?;
            print(&outcomes, compact)?;
            print(&pipeline.directory().statistics(), compact)
        }
        Command::Recommend { ticket, agents, limit } => {
            let pipeline = TriagePipeline::new(config, input::directory(&agents)?)?;
            let ticket = input::ticket(&ticket)?;
            let ticket = pipeline.evaluate(&ticket)?.attach(ticket);
            print(&pipeline.recommend(&ticket, limit)?, compact)
        }
        Command::Override { ticket, direction, reasons } => {
            let pipeline = TriagePipeline::new(config, Arc::new(AgentDirectory::new()))?;
            let ticket = input::ticket(&ticket)?;
            let ticket = pipeline.evaluate(&ticket)?.attach(ticket);
            let (ticket, _) = pipeline.override_priority(ticket, &reasons, direction.into())?;
            print(&ticket, compact)
        }
        Command::Stats { agents } => print(&input::directory(&agents)?.statistics(), compact),
    }
}

fn print<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_override_arguments() {
        let cli = Cli::try_parse_from(["deskroute", "override", "t.json", "up", "--reason", "outage"]).unwrap();
        match cli.command {
            Command::Override { direction, reasons, .. } => {
                assert!(matches!(OverrideDirection::from(direction), OverrideDirection::Up));
                assert_eq!(reasons, vec!["outage".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
