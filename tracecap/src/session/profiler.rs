//! Profiler façade and the session driver task.
//!
//! The [`Profiler`] collects a session's configuration (instruments, spawn
//! configuration, policy broker) and starts the recording. The driver task
//! it spawns runs the phase sequence: acquire policy, prepare everything,
//! launch the target, record concurrently with target supervision, augment,
//! and flush. Whatever happens in between, the capture writer is flushed
//! before the recording reaches a terminal state.

use crate::domain::{Pid, SessionError};
use crate::instrument::{Instrument, InstrumentSet};
use crate::policy::{PolicyBroker, SystemBusBroker};
use crate::spawn::Spawnable;
use log::{info, warn};
use std::sync::Arc;
use tracecap_capture::CaptureWriter;

use super::{Recording, SessionEnd};

/// Configures and starts profiling sessions.
pub struct Profiler {
    instruments: InstrumentSet,
    spawnable: Option<Spawnable>,
    broker: Arc<dyn PolicyBroker>,
}

impl Profiler {
    pub fn new() -> Self {
        Self {
            instruments: InstrumentSet::new(),
            spawnable: None,
            broker: Arc::new(SystemBusBroker::new()),
        }
    }

    /// Register an instrument for the next recording. Insertion order is
    /// preserved.
    pub fn add_instrument(&mut self, instrument: Arc<dyn Instrument>) {
        self.instruments.add(instrument);
    }

    /// Configure the process the recording will spawn and supervise.
    pub fn set_spawnable(&mut self, spawnable: Spawnable) {
        self.spawnable = Some(spawnable);
    }

    /// Replace the policy broker (tests, embedders).
    pub fn set_policy_broker(&mut self, broker: Arc<dyn PolicyBroker>) {
        self.broker = broker;
    }

    /// Start recording into `writer` and return the session handle.
    ///
    /// Consumes the profiler: the instrument collection is immutable once
    /// recording starts. Must be called from within a Tokio runtime; the
    /// driver task runs in the background and start-up failures (policy,
    /// prepare, spawn) surface from [`Recording::wait`].
    pub fn record(self, writer: Arc<CaptureWriter>) -> Recording {
        let recording = Recording::new(writer);
        let driver = recording.clone();
        let Self { instruments, spawnable, broker } = self;
        tokio::spawn(async move {
            drive(&driver, &instruments, spawnable, broker.as_ref()).await;
        });
        recording
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the session to completion and publish the outcome.
async fn drive(
    recording: &Recording,
    instruments: &InstrumentSet,
    spawnable: Option<Spawnable>,
    broker: &dyn PolicyBroker,
) {
    let mut result = run_phases(recording, instruments, spawnable, broker).await;

    // The capture must be consistent on every exit path, including phase
    // failures.
    if let Err(flush_err) = recording.writer().flush() {
        if result.is_ok() {
            result = Err(SessionError::Capture(flush_err));
        } else {
            warn!("capture flush failed after session error: {flush_err}");
        }
    }

    recording.finish(result);
}

async fn run_phases(
    recording: &Recording,
    instruments: &InstrumentSet,
    spawnable: Option<Spawnable>,
    broker: &dyn PolicyBroker,
) -> Result<SessionEnd, SessionError> {
    instruments.acquire_policy(broker).await?;
    instruments.prepare_all(recording).await?;
    recording.mark_running();

    let cancel = recording.cancel_token();
    let spawnable = spawnable.filter(|_| !cancel.is_cancelled());

    let record_result = if let Some(spawnable) = spawnable {
        let comm = spawnable.command_name().to_string();
        let mut child = spawnable
            .spawn()
            .map_err(|source| SessionError::Spawn { command: comm.clone(), source })?;
        info!("spawned target {comm} (pid {:?})", child.id());

        let supervise = async {
            let notify_result = match child.id() {
                Some(pid) => {
                    instruments.notify_process_started(recording, Pid(pid), &comm).await
                }
                None => Ok(()),
            };
            tokio::select! {
                status = child.wait() => {
                    let code = status.ok().and_then(|status| status.code());
                    info!("target exited with code {code:?}");
                    recording.note_child_exit(code);
                }
                () = cancel.cancelled() => {
                    // The target is session-scoped; reap it so wait() can
                    // resolve.
                    if let Err(e) = child.start_kill() {
                        warn!("failed to kill target: {e}");
                    }
                    let _ = child.wait().await;
                }
            }
            notify_result
        };

        let (record_result, notify_result) = tokio::join!(
            async {
                let result = instruments.record_all(recording, &cancel).await;
                // Capture is over once every record settled; tear down
                // target supervision.
                cancel.cancel();
                result
            },
            supervise
        );
        record_result.and(notify_result)
    } else {
        instruments.record_all(recording, &cancel).await
    };
    record_result?;

    instruments.augment_all(recording).await?;
    Ok(recording.take_end())
}
