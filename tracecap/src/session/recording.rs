//! One profiling session.
//!
//! A [`Recording`] owns the capture writer, the diagnostics feed, and the
//! shared cancellation token for exactly one session. It is a cheap-clone
//! handle: the driver task and any number of observers share the same
//! underlying state.
//!
//! State machine: `Starting -> Running -> Stopping -> Finished(end)`, with
//! `Failed` reachable from any point. [`stop`](Recording::stop) is
//! idempotent and non-blocking; [`wait`](Recording::wait) resolves only
//! once every instrument phase has settled and the sink has been flushed.

use crate::diagnostics::DiagnosticsFeed;
use crate::domain::SessionError;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracecap_capture::CaptureWriter;

/// Non-error ways a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every instrument's `record` returned of its own accord.
    Completed,
    /// An external stop request ended the session.
    Stopped,
    /// The spawned target exited on its own; expected, not an error.
    ChildExited { status: Option<i32> },
}

/// Lifecycle state of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Starting,
    Running,
    Stopping,
    Finished(SessionEnd),
    Failed,
}

impl RecordingState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecordingState::Finished(_) | RecordingState::Failed)
    }
}

struct RecordingInner {
    writer: Arc<CaptureWriter>,
    diagnostics: DiagnosticsFeed,
    cancel: CancellationToken,
    state: watch::Sender<RecordingState>,
    started: Instant,
    /// First termination reason wins; `None` until stop or child exit.
    pending_end: Mutex<Option<SessionEnd>>,
    /// Driver's final result, consumed by the first `wait` call.
    outcome: Mutex<Option<Result<SessionEnd, SessionError>>>,
}

/// Handle to one profiling session.
#[derive(Clone)]
pub struct Recording {
    inner: Arc<RecordingInner>,
}

impl Recording {
    pub(crate) fn new(writer: Arc<CaptureWriter>) -> Self {
        let (state, _) = watch::channel(RecordingState::Starting);
        Self {
            inner: Arc::new(RecordingInner {
                writer,
                diagnostics: DiagnosticsFeed::new(),
                cancel: CancellationToken::new(),
                state,
                started: Instant::now(),
                pending_end: Mutex::new(None),
                outcome: Mutex::new(None),
            }),
        }
    }

    /// Request a graceful stop.
    ///
    /// Idempotent, non-blocking, callable from any task: signals the shared
    /// cancellation token and moves a running session to `Stopping`. The
    /// session is finished only once [`wait`](Self::wait) resolves.
    pub fn stop(&self) {
        self.end_with(SessionEnd::Stopped);
    }

    /// Wait for the session to finish.
    ///
    /// Resolves once every instrument's `record` and the subsequent
    /// `augment` have settled and the capture sink has been flushed.
    ///
    /// # Errors
    /// Policy, instrument, spawn, or sink failure. A target process that
    /// exits on its own is reported as `Ok(SessionEnd::ChildExited)`.
    pub async fn wait(&self) -> Result<SessionEnd, SessionError> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|state| state.is_terminal())
            .await
            .map_err(|_| SessionError::Driver("recording task abandoned".to_string()))?;

        if let Some(outcome) = self.inner.outcome.lock().unwrap().take() {
            return outcome;
        }
        // A second waiter only gets the terminal state; the full error was
        // handed to whoever waited first.
        match state {
            RecordingState::Finished(end) => Ok(end),
            _ => Err(SessionError::Driver("recording failed".to_string())),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RecordingState {
        *self.inner.state.borrow()
    }

    /// The capture sink shared by every instrument in this session.
    pub fn writer(&self) -> &Arc<CaptureWriter> {
        &self.inner.writer
    }

    /// Handle to the append-only diagnostics feed.
    pub fn diagnostics(&self) -> DiagnosticsFeed {
        self.inner.diagnostics.clone()
    }

    /// Report a user-visible notice on the diagnostics feed.
    pub fn add_diagnostic(&self, domain: impl Into<String>, message: impl Into<String>) {
        self.inner.diagnostics.append(domain, message);
    }

    /// Nanoseconds since the session started, for capture frame timestamps.
    pub fn timestamp_ns(&self) -> u64 {
        u64::try_from(self.inner.started.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn note_child_exit(&self, status: Option<i32>) {
        self.end_with(SessionEnd::ChildExited { status });
    }

    fn end_with(&self, end: SessionEnd) {
        {
            let mut pending = self.inner.pending_end.lock().unwrap();
            if pending.is_none() {
                *pending = Some(end);
            }
        }
        self.inner.state.send_if_modified(|state| {
            if *state == RecordingState::Running {
                *state = RecordingState::Stopping;
                true
            } else {
                false
            }
        });
        self.inner.cancel.cancel();
    }

    /// `Starting -> Running`, unless a stop already arrived.
    pub(crate) fn mark_running(&self) {
        let next = if self.inner.cancel.is_cancelled() {
            RecordingState::Stopping
        } else {
            RecordingState::Running
        };
        self.inner.state.send_if_modified(|state| {
            if *state == RecordingState::Starting {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    /// Termination reason recorded so far, defaulting to a natural
    /// completion.
    pub(crate) fn take_end(&self) -> SessionEnd {
        self.inner.pending_end.lock().unwrap().take().unwrap_or(SessionEnd::Completed)
    }

    /// Publish the driver's result and enter the terminal state.
    pub(crate) fn finish(&self, result: Result<SessionEnd, SessionError>) {
        let terminal = match &result {
            Ok(end) => RecordingState::Finished(*end),
            Err(_) => RecordingState::Failed,
        };
        *self.inner.outcome.lock().unwrap() = Some(result);
        self.inner.state.send_replace(terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_recording() -> (Recording, TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = CaptureWriter::create(dir.path().join("capture.tcap"), false, 4096)
            .expect("create writer");
        (Recording::new(Arc::new(writer)), dir)
    }

    #[tokio::test]
    async fn test_new_recording_is_starting() {
        let (recording, _dir) = test_recording();
        assert_eq!(recording.state(), RecordingState::Starting);
        assert!(!recording.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_first_reason_wins() {
        let (recording, _dir) = test_recording();
        recording.mark_running();
        assert_eq!(recording.state(), RecordingState::Running);

        recording.stop();
        recording.stop();
        assert_eq!(recording.state(), RecordingState::Stopping);
        assert!(recording.cancel_token().is_cancelled());

        // A child exit after the stop must not rewrite the reason.
        recording.note_child_exit(Some(0));
        assert_eq!(recording.take_end(), SessionEnd::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_running_skips_running_state() {
        let (recording, _dir) = test_recording();
        recording.stop();
        recording.mark_running();
        assert_eq!(recording.state(), RecordingState::Stopping);
    }

    #[tokio::test]
    async fn test_wait_returns_published_outcome() {
        let (recording, _dir) = test_recording();
        let waiter = recording.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        recording.finish(Ok(SessionEnd::Completed));
        let end = handle.await.expect("join").expect("outcome");
        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(recording.state(), RecordingState::Finished(SessionEnd::Completed));
    }

    #[tokio::test]
    async fn test_take_end_defaults_to_completed() {
        let (recording, _dir) = test_recording();
        assert_eq!(recording.take_end(), SessionEnd::Completed);
    }
}
