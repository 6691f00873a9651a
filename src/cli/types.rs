//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::{ChangeKind, DowntimeWindow, Entity, ServiceScope, Toggles};

#[derive(Parser, Debug)]
#[command(name = "fleetmon")]
#[command(about = "Bulk monitoring changes with validation and retry", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Extra YAML config file, merged over .fleetmon/
    #[arg(short, long, global = true, env = "FLEETMON_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search the inventory API
    Query(QueryArgs),

    /// Enable checks and/or notifications
    Enable(ToggleArgs),

    /// Disable checks and/or notifications
    Disable(ToggleArgs),

    /// Schedule a maintenance window on every service
    Downtime(DowntimeArgs),

    /// Remove maintenance windows
    DowntimeDelete(TargetArgs),

    /// Acknowledge current problems
    Ack(AckArgs),

    /// Remove acknowledgements
    AckDelete(TargetArgs),

    /// Run (or submit results for) passive checks
    Passive(PassiveArgs),
}

/// Entities and services a change applies to.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Entity names
    pub hosts: Vec<String>,

    /// File with one entity name per line; blank lines and `#` comments are skipped
    #[arg(long)]
    pub hosts_file: Option<PathBuf>,

    /// Services to change; every service when omitted
    #[arg(short, long, value_delimiter = ',')]
    pub services: Vec<String>,
}

impl TargetArgs {
    /// Named entities followed by the file's, in order.
    pub fn entities(&self) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self.hosts.iter().map(|h| Entity::from(h.trim())).collect();

        if let Some(path) = &self.hosts_file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read hosts file {}", path.display()))?;
            entities.extend(parse_hosts(&contents));
        }

        anyhow::ensure!(
            !entities.is_empty(),
            "No entities given; pass names or --hosts-file"
        );
        Ok(entities)
    }

    pub fn scope(&self) -> ServiceScope {
        if self.services.is_empty() {
            ServiceScope::All
        } else {
            ServiceScope::from_names(self.services.iter().map(|s| s.trim()))
        }
    }
}

fn parse_hosts(contents: &str) -> impl Iterator<Item = Entity> + '_ {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(Entity::from)
}

#[derive(Args, Debug)]
pub struct ToggleArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Change active checks
    #[arg(long)]
    pub checks: bool,

    /// Change notifications
    #[arg(long)]
    pub notifications: bool,

    /// Comment recorded with the change
    #[arg(long)]
    pub comment: Option<String>,
}

impl ToggleArgs {
    /// Neither flag means both.
    pub fn toggles(&self) -> Toggles {
        let toggles = Toggles::new(self.checks, self.notifications);
        match &self.comment {
            Some(comment) => toggles.with_comment(comment.clone()),
            None => toggles,
        }
    }
}

#[derive(Args, Debug)]
pub struct DowntimeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Window length in seconds
    #[arg(short, long)]
    pub duration: u64,

    /// Comment shown on the window
    #[arg(long, default_value = "scheduled maintenance")]
    pub comment: String,

    /// RFC 3339 start time; now when omitted
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
}

impl DowntimeArgs {
    pub fn kind(&self) -> ChangeKind {
        ChangeKind::Downtime(DowntimeWindow {
            comment: self.comment.clone(),
            duration_secs: self.duration,
            start_time: self.start.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Args, Debug)]
pub struct AckArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Acknowledgement comment
    #[arg(long, default_value = "acknowledged")]
    pub comment: String,
}

#[derive(Args, Debug)]
pub struct PassiveArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Submit passive results instead of scheduling a run
    #[arg(long)]
    pub submit: bool,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Inventory object type, e.g. `device`
    pub object_type: String,

    /// Entity names to look up; the filters alone decide when empty
    #[arg(long = "host", value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// File with one entity name per line
    #[arg(long)]
    pub hosts_file: Option<PathBuf>,

    /// Fields to return
    #[arg(short, long, value_delimiter = ',', default_value = "name")]
    pub fields: Vec<String>,

    /// Extra filter as `field=value1,value2`; repeatable
    #[arg(long = "filter")]
    pub filters: Vec<String>,

    /// Row field used as the entity key
    #[arg(long, default_value = "name")]
    pub key_field: String,
}

impl QueryArgs {
    pub fn entities(&self) -> Result<Vec<Entity>> {
        let mut entities: Vec<Entity> = self.hosts.iter().map(|h| Entity::from(h.trim())).collect();
        if let Some(path) = &self.hosts_file {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read hosts file {}", path.display()))?;
            entities.extend(parse_hosts(&contents));
        }
        Ok(entities)
    }

    /// Parse every `--filter` into `(field, values)`.
    pub fn parsed_filters(&self) -> Result<Vec<(String, Vec<String>)>> {
        self.filters
            .iter()
            .map(|raw| {
                let (field, values) = raw
                    .split_once('=')
                    .with_context(|| format!("Filter '{raw}' is not field=value"))?;
                let values: Vec<String> = values
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect();
                anyhow::ensure!(
                    !field.trim().is_empty() && !values.is_empty(),
                    "Filter '{raw}' needs a field and at least one value"
                );
                Ok((field.trim().to_string(), values))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_enable() {
        let cli = Cli::parse_from(["fleetmon", "enable", "h1", "h2", "--services", "HTTP,SSH", "--checks"]);
        let Commands::Enable(args) = cli.command else {
            panic!("expected enable");
        };
        assert_eq!(args.target.hosts, vec!["h1", "h2"]);
        assert_eq!(args.target.scope(), ServiceScope::from_names(["HTTP", "SSH"]));
        let toggles = args.toggles();
        assert!(toggles.checks);
        assert!(!toggles.notifications);
    }

    #[test]
    fn test_no_toggle_flags_means_both() {
        let cli = Cli::parse_from(["fleetmon", "--json", "disable", "h1"]);
        assert!(cli.json);
        let Commands::Disable(args) = cli.command else {
            panic!("expected disable");
        };
        let toggles = args.toggles();
        assert!(toggles.checks && toggles.notifications);
        assert!(args.target.scope().is_all());
    }

    #[test]
    fn test_hosts_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "h1\n\n# retired\n  h2  \n").unwrap();

        let target = TargetArgs {
            hosts: vec!["h0".to_string()],
            hosts_file: Some(file.path().to_path_buf()),
            services: vec![],
        };
        let names: Vec<String> = target
            .entities()
            .unwrap()
            .iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(names, vec!["h0", "h1", "h2"]);
    }

    #[test]
    fn test_no_entities_is_an_error() {
        assert!(TargetArgs::default().entities().is_err());
    }

    #[test]
    fn test_downtime_start() {
        let cli = Cli::parse_from([
            "fleetmon",
            "downtime",
            "h1",
            "--duration",
            "3600",
            "--start",
            "2026-01-02T03:04:05Z",
        ]);
        let Commands::Downtime(args) = cli.command else {
            panic!("expected downtime");
        };
        let ChangeKind::Downtime(window) = args.kind() else {
            panic!("expected downtime kind");
        };
        assert_eq!(window.duration_secs, 3600);
        assert_eq!(window.start_time.timestamp(), 1_767_323_045);
    }

    #[test]
    fn test_query_filters() {
        let cli = Cli::parse_from([
            "fleetmon",
            "query",
            "device",
            "--host",
            "h1,h2",
            "--filter",
            "status=active,staged",
        ]);
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.entities().unwrap().len(), 2);
        assert_eq!(
            args.parsed_filters().unwrap(),
            vec![(
                "status".to_string(),
                vec!["active".to_string(), "staged".to_string()]
            )]
        );
    }

    #[test]
    fn test_bad_filter_rejected() {
        let args = QueryArgs {
            object_type: "device".to_string(),
            hosts: vec![],
            hosts_file: None,
            fields: vec![],
            filters: vec!["status".to_string()],
            key_field: "name".to_string(),
        };
        assert!(args.parsed_filters().is_err());
    }
}
