//! Ordered collection of process handles with concurrent batch execution.

use super::handle::ProcessHandle;
use crate::cancel::CancellationToken;
use crate::error::{ProcflowError, Result};
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Holds handles in insertion order and runs them as a batch.
///
/// Ids are not required to be unique: [`get`](Self::get) returns the first
/// match and [`remove`](Self::remove) drops every match.
#[derive(Debug, Default)]
pub struct ProcessManager {
    processes: Vec<Arc<ProcessHandle>>,
}

impl ProcessManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager seeded with `handles`, keeping their order.
    pub fn with_handles<I>(handles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Arc<ProcessHandle>>,
    {
        Self {
            processes: handles.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a handle. Duplicate ids are allowed.
    pub fn add(&mut self, handle: impl Into<Arc<ProcessHandle>>) -> &mut Self {
        let handle = handle.into();
        debug!("Adding process {}: {}", handle.id(), handle.command());
        self.processes.push(handle);
        self
    }

    /// Remove every handle with this id.
    pub fn remove(&mut self, id: u64) -> &mut Self {
        let before = self.processes.len();
        self.processes.retain(|handle| handle.id() != id);
        debug!("Removed {} process(es) with id {}", before - self.processes.len(), id);
        self
    }

    /// First handle with this id, in insertion order.
    pub fn get(&self, id: u64) -> Option<&Arc<ProcessHandle>> {
        self.processes.iter().find(|handle| handle.id() == id)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProcessHandle>> {
        self.processes.iter()
    }

    /// Ids in insertion order, duplicates included.
    pub fn ids(&self) -> Vec<u64> {
        self.processes.iter().map(|handle| handle.id()).collect()
    }

    /// Number of handles currently owning a live process.
    pub fn running_count(&self) -> usize {
        self.processes.iter().filter(|handle| handle.is_running()).count()
    }

    /// Run every handle concurrently and wait for the batch.
    ///
    /// All runs are started before any is awaited, and every run observes the
    /// same `cancel` token, so firing it cancels the whole batch.
    ///
    /// Returns the first failure to arrive, in completion order. Siblings are
    /// **not** cancelled when one fails: they keep running on their own tasks
    /// and their outcomes are only visible through each handle's state.
    /// Use [`run_all_settled`](Self::run_all_settled) to collect every result.
    pub async fn run_all(&self, cancel: Option<&CancellationToken>) -> Result<()> {
        info!("Running batch of {} process(es)", self.processes.len());

        let mut pending: FuturesUnordered<_> = self
            .spawn_runs(cancel)
            .into_iter()
            .map(|(_, task)| task)
            .collect();

        while let Some(joined) = pending.next().await {
            if let Err(e) = joined? {
                warn!(
                    "Batch failed: {} ({} run(s) left in flight)",
                    e,
                    pending.len()
                );
                return Err(e);
            }
        }

        info!("Batch completed");
        Ok(())
    }

    /// Run every handle concurrently and wait for all of them.
    ///
    /// Results come back in insertion order, paired with each handle's id.
    pub async fn run_all_settled(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Vec<(u64, Result<()>)> {
        info!("Running batch of {} process(es) to completion", self.processes.len());

        let (ids, tasks): (Vec<_>, Vec<_>) = self.spawn_runs(cancel).into_iter().unzip();
        let results = join_all(tasks).await;

        ids.into_iter()
            .zip(results)
            .map(|(id, joined)| (id, joined.map_err(ProcflowError::from).and_then(|r| r)))
            .collect()
    }

    fn spawn_runs(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Vec<(u64, JoinHandle<Result<()>>)> {
        self.processes
            .iter()
            .map(|handle| {
                let handle = Arc::clone(handle);
                // Clones share one underlying token.
                let cancel = cancel.cloned();
                let id = handle.id();
                let task = tokio::spawn(async move { handle.run(cancel.as_ref()).await });
                (id, task)
            })
            .collect()
    }
}
