//! Concurrent fan-out of one snapshot to every destination.
//!
//! All dispatches are spawned before any is awaited, and every one is joined
//! (wait-for-all, never wait-for-first). Outcome `i` always belongs to
//! destination `i`, whatever order they finish in. Only outcome 0, the
//! primary, decides what the caller gets.

use std::future::Future;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::Instrument;

use super::dispatch::{DispatchOutcome, Dispatcher, UpstreamResponse};
use super::events::{self, MirrorEvent};
use super::snapshot::RequestSnapshot;
use crate::error::MirrorError;

/// Fans snapshots out to a fixed, ordered destination list.
#[derive(Clone)]
pub struct FanOut {
    dispatcher: Dispatcher,
    destinations: Arc<[String]>,
}

impl FanOut {
    /// `destinations[0]` is the primary.
    pub fn new(dispatcher: Dispatcher, destinations: Vec<String>) -> Self {
        Self {
            dispatcher,
            destinations: destinations.into(),
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    /// Dispatch to every destination concurrently and collect all outcomes,
    /// in destination order.
    pub async fn run(
        &self,
        snapshot: Arc<RequestSnapshot>,
    ) -> Result<Vec<DispatchOutcome>, MirrorError> {
        let tasks = self
            .destinations
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, destination)| {
                let dispatcher = self.dispatcher.clone();
                let snapshot = snapshot.clone();
                async move { dispatcher.dispatch(&snapshot, index, &destination).await }
            });

        join_positional(tasks)
            .await
            .map_err(|e| self.orchestration_fault(snapshot.request_id(), e))
    }

    /// A dispatch task panicked or was cancelled: emit `forwarding_failed`
    /// once and turn the fault into the 500 error.
    fn orchestration_fault(&self, request_id: &str, fault: JoinError) -> MirrorError {
        let error = MirrorError::ForwardingFailed(fault);
        events::emit(
            self.dispatcher.sink(),
            &MirrorEvent::ForwardingFailed {
                request_id,
                error: &error,
            },
        );
        error
    }

    /// Fan out and return the primary's response.
    pub async fn forward(
        &self,
        snapshot: Arc<RequestSnapshot>,
    ) -> Result<UpstreamResponse, MirrorError> {
        if self.destinations.is_empty() {
            return Err(MirrorError::NoPrimaryResponse);
        }
        let outcomes = self.run(snapshot).await?;
        select_primary(outcomes)
    }
}

/// Spawn every future, then await them all in order.
///
/// A task that panics or is cancelled does not cut the join short: the rest
/// are still awaited, and the first such fault is returned afterwards.
pub async fn join_positional<I, F, T>(tasks: I) -> Result<Vec<T>, JoinError>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<JoinHandle<T>> = tasks
        .into_iter()
        .map(|task| tokio::spawn(task.in_current_span()))
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    let mut fault = None;
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                fault.get_or_insert(e);
            }
        }
    }

    match fault {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Pick the caller's response from the primary outcome; discard the rest.
pub fn select_primary(outcomes: Vec<DispatchOutcome>) -> Result<UpstreamResponse, MirrorError> {
    let mut outcomes = outcomes.into_iter();
    let primary = outcomes.next();

    let (succeeded, failed) = outcomes.fold((0usize, 0usize), |(ok, err), outcome| {
        if outcome.is_success() {
            (ok + 1, err)
        } else {
            (ok, err + 1)
        }
    });
    if succeeded + failed > 0 {
        tracing::debug!(succeeded, failed, "Discarding secondary outcomes");
    }

    match primary {
        Some(DispatchOutcome::Success(response)) => Ok(response),
        Some(DispatchOutcome::Failure(failure)) => {
            tracing::warn!(
                destination = %failure.destination,
                error = %failure.error,
                "Primary destination failed"
            );
            Err(MirrorError::NoPrimaryResponse)
        }
        None => Err(MirrorError::NoPrimaryResponse),
    }
}
