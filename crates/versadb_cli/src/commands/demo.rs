//! Demo command implementation.
//!
//! Each scenario drives a fresh in-memory factory on its own virtual
//! clock and records every request and connection notification.

use clap::ValueEnum;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use versadb_core::{
    Connection, DatabaseOptions, Factory, OpenArgs, Request, Scheduler, StoreDefinition, Ticks,
};

/// Scripted protocol scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Upgrade a database while a cooperative connection is open
    Upgrade,
    /// Delete a database held open by a connection that never yields
    Delete,
    /// Open the same new database at two versions in the same turn
    Race,
    /// Upgrade a database held open by a connection that never yields
    Blocked,
}

/// One observed notification.
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    /// Virtual time of the notification.
    pub tick: Ticks,
    /// Request or connection id.
    pub source: String,
    /// Notification kind.
    pub event: &'static str,
    /// Human-readable details.
    pub detail: String,
}

#[derive(Clone)]
struct Trace {
    scheduler: Scheduler,
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl Trace {
    fn new(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: scheduler.clone(),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(&self, source: String, event: &'static str, detail: String) {
        debug!(source = %source, event, detail = %detail, "trace");
        self.entries.lock().push(TraceEntry {
            tick: self.scheduler.now(),
            source,
            event,
            detail,
        });
    }

    fn watch_request(&self, request: &Request) {
        let source = request.id().to_string();

        let (trace, src) = (self.clone(), source.clone());
        request.on_blocked(move |change| trace.push(src.clone(), "blocked", change.to_string()));

        let (trace, src) = (self.clone(), source.clone());
        request.on_upgrade_needed(move |event| {
            trace.push(
                src,
                "upgradeneeded",
                format!("{} -> {}", event.old_version, event.new_version),
            );
        });

        let (trace, src) = (self.clone(), source.clone());
        request.on_success(move |event| {
            let detail = match &event.result {
                Some(connection) => format!(
                    "{} at version {} stores {:?}",
                    connection.id(),
                    connection.version(),
                    connection.object_store_names()
                ),
                None => format!("deleted (was version {:?})", event.old_version),
            };
            trace.push(src, "success", detail);
        });

        let (trace, src) = (self.clone(), source);
        request.on_error(move |err| trace.push(src, "error", format!("{}: {}", err.name(), err)));
    }

    /// Records "versionchange" and "close" on `connection`, closing it on
    /// each notification when `cooperative`.
    fn watch_connection(&self, connection: &Arc<Connection>, cooperative: bool) {
        let source = connection.id().to_string();

        let (trace, src) = (self.clone(), source.clone());
        let target = Arc::downgrade(connection);
        connection.on_version_change(move |change| {
            trace.push(src.clone(), "versionchange", change.to_string());
            if cooperative {
                if let Some(connection) = target.upgrade() {
                    connection.close();
                }
            }
        });

        let (trace, src) = (self.clone(), source);
        connection.on_close(move |_| trace.push(src, "close", String::new()));
    }

    fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().clone()
    }
}

/// Runs the demo command.
pub fn run(scenario: Scenario, format: &str, ticks: Ticks) -> Result<(), Box<dyn std::error::Error>> {
    let entries = execute(scenario, ticks)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        "text" => {
            println!("Scenario: {:?}", scenario);
            println!();
            for entry in &entries {
                println!(
                    "[{:>6}] {:<8} {:<14} {}",
                    entry.tick, entry.source, entry.event, entry.detail
                );
            }
        }
        other => return Err(format!("Unknown format: {}", other).into()),
    }
    Ok(())
}

/// Runs `scenario` and returns its trace.
fn execute(scenario: Scenario, ticks: Ticks) -> Result<Vec<TraceEntry>, Box<dyn std::error::Error>> {
    let factory = Factory::in_memory();
    let trace = Trace::new(factory.scheduler());

    match scenario {
        Scenario::Upgrade => {
            connect(&factory, &trace, "library", 1, true)?;
            let request = factory.open_version("library", 2)?;
            trace.watch_request(&request);
            request.on_upgrade_needed(|event| {
                if let Err(err) = event.connection.create_object_store("archive") {
                    tracing::warn!(error = %err, "create_object_store failed");
                }
            });
            factory.scheduler().advance(ticks);
        }
        Scenario::Delete => {
            let holdout = connect(&factory, &trace, "library", 1, false)?;
            let request = factory.delete_database("library");
            trace.watch_request(&request);
            factory.scheduler().advance(ticks);
            holdout.close();
            factory.scheduler().run_until_idle();
        }
        Scenario::Race => {
            for version in [1, 2] {
                let request = factory.open_version("library", version)?;
                trace.watch_request(&request);
                let watcher = trace.clone();
                let target = Arc::downgrade(&request);
                request.on_success(move |_| {
                    if let Some(connection) = target.upgrade().and_then(|r| r.result()) {
                        watcher.watch_connection(&connection, true);
                    }
                });
            }
            factory.scheduler().advance(ticks);
        }
        Scenario::Blocked => {
            let holdout = connect(&factory, &trace, "library", 1, false)?;
            let request = factory.open_version("library", 2)?;
            trace.watch_request(&request);
            factory.scheduler().advance(ticks);
            holdout.close();
            factory.scheduler().run_until_idle();
        }
    }

    Ok(trace.entries())
}

/// Opens `name` with a `notes` store and returns the settled connection.
fn connect(
    factory: &Factory,
    trace: &Trace,
    name: &str,
    version: u64,
    cooperative: bool,
) -> Result<Arc<Connection>, Box<dyn std::error::Error>> {
    let options = DatabaseOptions::new().store("notes", StoreDefinition::new().key_path("id"));
    let request = factory.open_with(OpenArgs::new(name).version(version).options(options))?;
    trace.watch_request(&request);
    factory.scheduler().run_until_idle();

    if let Some(err) = request.error() {
        return Err(format!("open of {} failed: {}", name, err).into());
    }
    let connection = request
        .result()
        .ok_or_else(|| format!("open of {} did not complete", name))?;
    trace.watch_connection(&connection, cooperative);
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(entries: &[TraceEntry]) -> Vec<&'static str> {
        entries.iter().map(|e| e.event).collect()
    }

    #[test]
    fn test_upgrade_scenario() {
        let entries = execute(Scenario::Upgrade, 2000).unwrap();
        assert_eq!(
            events(&entries),
            vec![
                "upgradeneeded",
                "success",
                "versionchange",
                "close",
                "upgradeneeded",
                "success"
            ]
        );
        assert!(entries.last().unwrap().detail.contains("[\"archive\", \"notes\"]"));
    }

    #[test]
    fn test_delete_scenario_blocks_once() {
        let entries = execute(Scenario::Delete, 2000).unwrap();
        let blocked: Vec<_> = entries.iter().filter(|e| e.event == "blocked").collect();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].tick, 500);
        assert_eq!(entries.last().unwrap().event, "success");
    }

    #[test]
    fn test_blocked_scenario_reports_at_1000() {
        let entries = execute(Scenario::Blocked, 2000).unwrap();
        let blocked: Vec<_> = entries.iter().filter(|e| e.event == "blocked").collect();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].tick, 1000);
    }

    #[test]
    fn test_race_scenario_both_succeed() {
        let entries = execute(Scenario::Race, 0).unwrap();
        let successes = entries.iter().filter(|e| e.event == "success").count();
        assert_eq!(successes, 2);
        assert!(entries.iter().all(|e| e.event != "error"));
    }
}
