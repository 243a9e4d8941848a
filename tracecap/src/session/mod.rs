//! Session orchestration: the profiler façade and the recording lifecycle.

pub mod profiler;
pub mod recording;

pub use profiler::Profiler;
pub use recording::{Recording, RecordingState, SessionEnd};
