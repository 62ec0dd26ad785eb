//! Command runner
//!
//! Runs each declared command on its own: success is logged with the count or
//! identifier the store returned, failure is logged with the underlying
//! reason. Nothing is retried and no failure stops or influences another
//! command. All commands of a batch are started together and awaited as a
//! group, so the driver is free to interleave them.

use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info};

use crate::command::{Command, CommandOutcome};
use crate::scripts::Script;
use crate::store::DocumentStore;
use curator_common::CuratorError;

/// A command that did not succeed, with the store's reason
#[derive(Error, Debug, Clone)]
#[error("❌ Error {label}: {source}")]
pub struct CommandFailure {
    pub command: String,
    pub label: &'static str,
    #[source]
    pub source: CuratorError,
}

impl CommandFailure {
    pub fn is_duplicate_key(&self) -> bool {
        self.source.is_duplicate_key()
    }
}

/// Outcome of one command, kept for the caller's summary
#[derive(Debug, Clone)]
pub struct CommandReport {
    pub command: String,
    pub result: std::result::Result<CommandOutcome, CommandFailure>,
}

impl CommandReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Reports of a batch, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<CommandReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommandFailure> {
        self.reports.iter().filter_map(|r| r.result.as_ref().err())
    }
}

/// Issues commands against a store and logs every outcome
pub struct CommandRunner<S> {
    store: S,
}

impl<S: DocumentStore> CommandRunner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a single command. Never returns an error: a failure is logged and
    /// carried in the report.
    pub async fn run_one(&self, command: &Command) -> CommandReport {
        let description = command.to_string();

        let result = match command.execute(&self.store).await {
            Ok(outcome) => {
                info!(
                    db = self.store.database_name(),
                    collection = %command.collection,
                    "{}",
                    outcome
                );
                Ok(outcome)
            }
            Err(source) => {
                let failure = CommandFailure {
                    command: description.clone(),
                    label: command.failure_label(),
                    source,
                };
                error!(
                    db = self.store.database_name(),
                    collection = %command.collection,
                    command = %description,
                    "{}",
                    failure
                );
                Err(failure)
            }
        };

        CommandReport {
            command: description,
            result,
        }
    }

    /// Start every command at once and wait for all of them.
    pub async fn run_all(&self, commands: &[Command]) -> RunSummary {
        let reports = join_all(commands.iter().map(|command| self.run_one(command))).await;
        RunSummary { reports }
    }

    pub async fn run_script(&self, script: &Script) -> RunSummary {
        info!(
            script = script.name,
            db = self.store.database_name(),
            commands = script.commands.len(),
            "running script"
        );
        self.run_all(&script.commands).await
    }
}
