//! # tracecap - Main Entry Point
//!
//! The session driver: parses arguments, opens the capture file, starts the
//! profiler against the built-in instrument collection, reports diagnostics,
//! and shuts down with a well-formed capture on every exit path.
//!
//! Signal behavior is graduated: the first two interrupts request a graceful
//! stop (letting in-flight instrument data flush), a third abandons the wait
//! and exits after a best-effort flush.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};

use tracecap::cli::Args;
use tracecap::domain::SessionError;
use tracecap::instrument::{CpuCounters, ProcessLifecycle};
use tracecap::session::{Profiler, Recording, SessionEnd};
use tracecap::spawn::{parse_overlay_entry, Spawnable};
use tracecap_capture::{CaptureError, CaptureWriter};

// Exit codes (clap reports argument errors with its own code 2)
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

/// Yield passes granted to late completion work between the two shutdown
/// flushes.
const SHUTDOWN_DRAIN_PASSES: usize = 64;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

#[tokio::main(flavor = "current_thread")]
async fn run() -> Result<()> {
    let args = Args::parse();

    let writer = match CaptureWriter::create(&args.capture_file, args.force, args.buffer_size) {
        Ok(writer) => Arc::new(writer),
        Err(CaptureError::TargetExists(path)) => {
            bail!("{} exists. Use --force to overwrite", path.display());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open {}", args.capture_file.display()));
        }
    };

    // Spawn configuration: working directory, argv, environment overlay.
    let mut spawnable = Spawnable::new(args.command[0].clone());
    spawnable.append_args(args.command[1..].iter().cloned());
    let cwd = match args.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to resolve working directory")?,
    };
    spawnable.set_cwd(cwd);
    for entry in &args.env {
        let (key, value) = parse_overlay_entry(entry);
        spawnable.setenv(key, value);
    }

    let mut profiler = Profiler::new();
    profiler.add_instrument(Arc::new(CpuCounters::default()));
    profiler.add_instrument(Arc::new(ProcessLifecycle::new()));
    profiler.set_spawnable(spawnable);

    let recording = profiler.record(Arc::clone(&writer));

    spawn_diagnostics_printer(&recording);

    if args.duration > 0 {
        let limited = recording.clone();
        let limit = Duration::from_secs(args.duration);
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!("duration limit reached");
            limited.stop();
        });
    }

    if !args.quiet {
        eprintln!("Recording, press ^C to exit");
    }

    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let session = wait_with_signals(&recording, &mut sigint, &mut sigterm).await;

    // Two-phase shutdown flush: flush what the session produced, give
    // already-scheduled tasks a chance to run their completion work, then
    // flush again to catch late-arriving buffered writes.
    if !args.quiet {
        eprint!("Saving capture to {}... ", args.capture_file.display());
    }
    writer.flush().context("Failed to flush capture")?;
    for _ in 0..SHUTDOWN_DRAIN_PASSES {
        tokio::task::yield_now().await;
    }
    writer.flush().context("Failed to flush capture")?;
    if !args.quiet {
        eprintln!("done!");
    }

    if let Some(SessionEnd::ChildExited { status }) = session? {
        info!("session ended with target exit {status:?}");
    }
    Ok(())
}

/// Wait for the recording while translating interrupt signals into the
/// graduated stop behavior: first and second request a graceful stop, third
/// abandons the wait (`Ok(None)`).
async fn wait_with_signals(
    recording: &Recording,
    sigint: &mut Signal,
    sigterm: &mut Signal,
) -> Result<Option<SessionEnd>, SessionError> {
    let wait = recording.wait();
    tokio::pin!(wait);

    let mut interrupts = 0u32;
    loop {
        tokio::select! {
            outcome = &mut wait => return outcome.map(Some),
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }

        interrupts += 1;
        if interrupts >= 3 {
            eprintln!("\nForcing exit without waiting for the capture to complete.");
            return Ok(None);
        }
        if interrupts == 1 {
            eprintln!("\nStopping profiler. Press ^C twice more to force exit.");
        } else {
            eprintln!("\nStopping profiler. Press ^C once more to force exit.");
        }
        recording.stop();
    }
}

/// Print every diagnostic to stderr, including the initial drain of entries
/// appended before we subscribed.
fn spawn_diagnostics_printer(recording: &Recording) {
    let feed = recording.diagnostics();
    let mut changes = feed.watch();
    tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            for position in change.position..change.position + change.added {
                if let Some(diagnostic) = feed.get(position) {
                    eprintln!("{}: {}", diagnostic.domain(), diagnostic.message());
                }
            }
        }
    });
}
