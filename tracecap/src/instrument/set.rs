//! Fan-out/join coordination across the instrument collection.
//!
//! Each lifecycle phase fans the corresponding hook out to every registered
//! instrument in insertion order and waits for *all* of them to settle
//! before resolving. A failing instrument never cancels its siblings; only
//! the session's own cancellation token stops in-flight work. The empty
//! collection is the identity: every phase resolves immediately as success.

use crate::domain::{Phase, Pid, SessionError};
use crate::policy::PolicyBroker;
use crate::session::Recording;
use futures::future::join_all;
use log::warn;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Instrument;

/// Ordered, immutable-after-start collection of instruments.
#[derive(Default)]
pub struct InstrumentSet {
    instruments: Vec<Arc<dyn Instrument>>,
}

impl InstrumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument. Insertion order is preserved and determines
    /// fan-out launch order.
    pub fn add(&mut self, instrument: Arc<dyn Instrument>) {
        self.instruments.push(instrument);
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Union of every instrument's policy requirements, deduplicated,
    /// first-seen order.
    pub fn required_policy(&self) -> Vec<String> {
        let mut policies: Vec<String> = Vec::new();
        for instrument in &self.instruments {
            for policy in instrument.required_policy() {
                if !policies.contains(&policy) {
                    policies.push(policy);
                }
            }
        }
        policies
    }

    /// Obtain privileged access for the union of declared policies.
    ///
    /// Runs before any instrument's `prepare`. When no instrument declares
    /// a requirement the step is skipped entirely; otherwise a broker
    /// failure aborts the session.
    ///
    /// # Errors
    /// The broker's failure, verbatim.
    pub async fn acquire_policy(
        &self,
        broker: &dyn PolicyBroker,
    ) -> Result<(), SessionError> {
        let policies = self.required_policy();
        if policies.is_empty() {
            return Ok(());
        }
        broker.acquire(&policies).await.map_err(SessionError::from)
    }

    /// Run `prepare` on every instrument and wait for all to settle.
    ///
    /// # Errors
    /// The first failure in collection order, after every sibling settled.
    pub async fn prepare_all(&self, recording: &Recording) -> Result<(), SessionError> {
        let futures: Vec<_> =
            self.instruments.iter().map(|i| i.prepare(recording)).collect();
        self.collect_outcome(Phase::Prepare, join_all(futures).await)
    }

    /// Run `record` on every instrument concurrently, each observing a
    /// clone of the shared cancellation token, and wait for all to settle.
    ///
    /// # Errors
    /// The first failure in collection order, after every sibling settled.
    pub async fn record_all(
        &self,
        recording: &Recording,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let futures: Vec<_> = self
            .instruments
            .iter()
            .map(|i| i.record(recording, cancel.clone()))
            .collect();
        self.collect_outcome(Phase::Record, join_all(futures).await)
    }

    /// Run `augment` on every instrument and wait for all to settle.
    ///
    /// # Errors
    /// The first failure in collection order, after every sibling settled.
    pub async fn augment_all(&self, recording: &Recording) -> Result<(), SessionError> {
        let futures: Vec<_> =
            self.instruments.iter().map(|i| i.augment(recording)).collect();
        self.collect_outcome(Phase::Augment, join_all(futures).await)
    }

    /// Deliver the `process_started` notification to every instrument and
    /// wait for all to settle.
    ///
    /// # Errors
    /// The first failure in collection order, after every sibling settled.
    pub async fn notify_process_started(
        &self,
        recording: &Recording,
        pid: Pid,
        comm: &str,
    ) -> Result<(), SessionError> {
        let futures: Vec<_> = self
            .instruments
            .iter()
            .map(|i| i.process_started(recording, pid, comm))
            .collect();
        self.collect_outcome(Phase::ProcessStarted, join_all(futures).await)
    }

    /// Fold settled per-instrument results into one phase outcome.
    ///
    /// The first failure in collection order becomes the phase's error;
    /// additional failures are logged so they are not silently dropped.
    fn collect_outcome(
        &self,
        phase: Phase,
        results: Vec<anyhow::Result<()>>,
    ) -> Result<(), SessionError> {
        let mut first: Option<SessionError> = None;
        for (instrument, result) in self.instruments.iter().zip(results) {
            if let Err(cause) = result {
                if first.is_none() {
                    first = Some(SessionError::Instrument {
                        instrument: instrument.name().to_string(),
                        phase,
                        cause,
                    });
                } else {
                    warn!("{} also failed during {phase}: {cause:#}", instrument.name());
                }
            }
        }
        match first {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
