//! # tracecap - Profiling Session Orchestrator
//!
//! tracecap coordinates an open set of pluggable *instruments* (each
//! capturing one kind of telemetry) through a common asynchronous lifecycle
//! around a single recording session, multiplexing their output into one
//! capture file.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Session Driver (CLI)                     │
//! │   argument parsing · signal handling · two-phase flush      │
//! └───────────────────────┬─────────────────────────────────────┘
//!                         │ startRecording / stop / wait
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Profiler ──▶ Recording (state machine, diagnostics feed)   │
//! │                  │                                          │
//! │                  ▼                                          │
//! │            InstrumentSet (fan-out / join-all)               │
//! │   policy ─▶ prepare ─▶ record ∥ target supervision ─▶       │
//! │                                          augment ─▶ flush   │
//! └───────┬─────────────────┬─────────────────┬─────────────────┘
//!         ▼                 ▼                 ▼
//!   Instrument A      Instrument B      Instrument C
//!         └────────────────┴────────┬──────────┘
//!                                   ▼
//!                       capture stream (one file)
//! ```
//!
//! ## Lifecycle Guarantees
//!
//! - `prepare` settles for every instrument before any `record` starts;
//!   every `record` settles before any `augment` starts.
//! - Joins wait for *all* instruments; one failure never cancels siblings.
//! - Cancellation is a single monotonic token per recording, signalled by
//!   [`Recording::stop`](session::Recording::stop) or by the spawned
//!   target exiting.
//! - The capture writer is flushed before a recording reaches a terminal
//!   state, whatever happened before.
//!
//! ## Module Structure
//!
//! - [`session`]: the [`Profiler`](session::Profiler) façade and
//!   [`Recording`](session::Recording) lifecycle
//! - [`instrument`]: the capability trait, the fan-out coordinator, and
//!   built-in instruments
//! - [`diagnostics`]: append-only observable feed of (domain, message)
//!   notices
//! - [`policy`]: privileged policy acquisition over the system control
//!   channel
//! - [`spawn`]: target process configuration and environment overlay
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: core types and the error taxonomy

pub mod cli;
pub mod diagnostics;
pub mod domain;
pub mod instrument;
pub mod policy;
pub mod session;
pub mod spawn;
