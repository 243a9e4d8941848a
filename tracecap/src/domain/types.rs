//! Newtype wrappers and small enums used throughout the crate.

use std::fmt;

/// Process ID of the spawned target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instrument lifecycle phase, used for error attribution and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Record,
    Augment,
    ProcessStarted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Record => "record",
            Phase::Augment => "augment",
            Phase::ProcessStarted => "process-started",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_display() {
        assert_eq!(Pid(4321).to_string(), "4321");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Prepare.to_string(), "prepare");
        assert_eq!(Phase::ProcessStarted.to_string(), "process-started");
    }
}
