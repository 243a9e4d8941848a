//! Instrument capability contract.
//!
//! An instrument captures one category of telemetry during a recording
//! session. The contract is a single flat trait with four optional async
//! lifecycle hooks; every hook defaults to an immediate success, so concrete
//! instruments override only the phases they need.
//!
//! Lifecycle of one session:
//!
//! 1. `required_policy` for every instrument, union acquired up front
//! 2. `prepare` for every instrument, all settled before the next phase
//! 3. `record` for every instrument concurrently, sharing one cancellation
//!    token
//! 4. `process_started` once the spawned target is running (may interleave
//!    with `record`)
//! 5. `augment` after every `record` has settled
//!
//! Hooks return `anyhow::Result` so implementations can attach context
//! freely; the coordinator attributes failures to the instrument and phase.

pub mod cpu;
pub mod process;
pub mod set;

pub use cpu::CpuCounters;
pub use process::ProcessLifecycle;
pub use set::InstrumentSet;

use crate::domain::Pid;
use crate::session::Recording;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A pluggable telemetry capture unit.
#[async_trait]
pub trait Instrument: Send + Sync {
    /// Stable name used for logs, error attribution, and capture frames.
    fn name(&self) -> &str;

    /// Privileged resources this instrument needs before recording may
    /// begin. Pure; callable at any time.
    fn required_policy(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time setup scoped to `recording`. Called exactly once per
    /// session, before any `record` starts.
    async fn prepare(&self, _recording: &Recording) -> anyhow::Result<()> {
        Ok(())
    }

    /// Main data-capture phase, run concurrently with every other
    /// instrument's `record`. Must observe `cancel` and resolve promptly
    /// once it fires, flushing any buffered data into the recording's sink
    /// first.
    async fn record(
        &self,
        _recording: &Recording,
        _cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Post-capture enrichment, run once every `record` has settled.
    async fn augment(&self, _recording: &Recording) -> anyhow::Result<()> {
        Ok(())
    }

    /// Notification that the spawned target began executing.
    async fn process_started(
        &self,
        _recording: &Recording,
        _pid: Pid,
        _comm: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
