//! Target process lifecycle capture.
//!
//! Writes a frame when the spawned target starts and a summary frame after
//! capture stops. The record phase itself only parks on the cancellation
//! token: the interesting moments arrive through the `process_started`
//! notification and the augment pass.

use super::Instrument;
use crate::domain::Pid;
use crate::session::Recording;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct ProcessLifecycle {
    started: Mutex<Option<(Pid, String)>>,
}

impl ProcessLifecycle {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Instrument for ProcessLifecycle {
    fn name(&self) -> &str {
        "process-lifecycle"
    }

    async fn record(
        &self,
        _recording: &Recording,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        cancel.cancelled().await;
        Ok(())
    }

    async fn process_started(
        &self,
        recording: &Recording,
        pid: Pid,
        comm: &str,
    ) -> anyhow::Result<()> {
        let event = tracecap_capture::CaptureEvent::new(
            recording.timestamp_ns(),
            self.name(),
            "process-started",
            json!({ "pid": pid.0, "comm": comm }),
        );
        recording.writer().write(&event).context("failed to append process start")?;
        *self.started.lock().unwrap() = Some((pid, comm.to_string()));
        Ok(())
    }

    async fn augment(&self, recording: &Recording) -> anyhow::Result<()> {
        let payload = match self.started.lock().unwrap().as_ref() {
            Some((pid, comm)) => json!({ "spawned": true, "pid": pid.0, "comm": comm }),
            None => json!({ "spawned": false }),
        };
        let event = tracecap_capture::CaptureEvent::new(
            recording.timestamp_ns(),
            self.name(),
            "process-summary",
            payload,
        );
        recording.writer().write(&event).context("failed to append process summary")?;
        Ok(())
    }
}
