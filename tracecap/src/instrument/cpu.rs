//! Aggregate CPU counter sampling.
//!
//! Samples the `cpu` summary line of `/proc/stat` on a fixed interval for
//! the duration of the record phase and appends one counter frame per tick
//! to the capture stream. Requires no privileged policy. On systems where
//! `/proc/stat` is unavailable the instrument reports a diagnostic and
//! resolves successfully; a missing sampler must not fail the session.

use super::Instrument;
use crate::session::Recording;
use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PROC_STAT: &str = "/proc/stat";

/// Jiffy totals from the aggregate `cpu` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTotals {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

/// Parse the aggregate `cpu` line out of `/proc/stat` contents.
///
/// Returns `None` when the line is missing or malformed.
pub fn parse_cpu_line(stat: &str) -> Option<CpuTotals> {
    let line = stat.lines().find(|line| line.starts_with("cpu "))?;
    let fields: Vec<u64> =
        line.split_whitespace().skip(1).map_while(|field| field.parse().ok()).collect();
    if fields.len() < 7 {
        return None;
    }
    Some(CpuTotals {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
    })
}

/// Interval sampler for aggregate CPU jiffies.
pub struct CpuCounters {
    interval: Duration,
}

impl CpuCounters {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for CpuCounters {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[async_trait]
impl Instrument for CpuCounters {
    fn name(&self) -> &str {
        "cpu-counters"
    }

    async fn record(
        &self,
        recording: &Recording,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let stat = match std::fs::read_to_string(PROC_STAT) {
                Ok(stat) => stat,
                Err(e) => {
                    recording.add_diagnostic("cpu", format!("{PROC_STAT} unreadable: {e}"));
                    return Ok(());
                }
            };
            let Some(totals) = parse_cpu_line(&stat) else {
                recording.add_diagnostic("cpu", format!("no cpu summary line in {PROC_STAT}"));
                return Ok(());
            };

            let event = tracecap_capture::CaptureEvent::new(
                recording.timestamp_ns(),
                self.name(),
                "cpu-totals",
                json!({
                    "user": totals.user,
                    "nice": totals.nice,
                    "system": totals.system,
                    "idle": totals.idle,
                    "iowait": totals.iowait,
                    "irq": totals.irq,
                    "softirq": totals.softirq,
                }),
            );
            recording.writer().write(&event).context("failed to append cpu counters")?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_line() {
        let stat = "cpu  361711 1204 86071 4305221 5497 0 4983 0 0 0\n\
                    cpu0 45392 201 10713 537788 672 0 2303 0 0 0\n";
        let totals = parse_cpu_line(stat).expect("summary line");
        assert_eq!(totals.user, 361_711);
        assert_eq!(totals.idle, 4_305_221);
        assert_eq!(totals.softirq, 4983);
    }

    #[test]
    fn test_parse_ignores_per_cpu_lines() {
        // No aggregate line, only per-cpu ones: must not mistake cpu0 for it.
        let stat = "cpu0 1 2 3 4 5 6 7 0 0 0\n";
        assert!(parse_cpu_line(stat).is_none());
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert!(parse_cpu_line("cpu  1 2 3\n").is_none());
    }
}
