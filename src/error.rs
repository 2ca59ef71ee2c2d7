use thiserror::Error;

/// Everything that can end a test early.
///
/// Scoreboard variants carry the `Debug` rendering of the transactions involved so the
/// failure message is self-contained once the simulation is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RstbErr {
    #[error("{interface}: expected {expected}, got {actual}")]
    Mismatch {
        interface: String,
        expected: String,
        actual: String,
    },

    #[error("{interface}: unexpected transaction {actual} with no prediction")]
    Starvation { interface: String, actual: String },

    #[error("{interface}: {count} predicted transaction(s) never observed: {pending}")]
    Leftover {
        interface: String,
        count: usize,
        pending: String,
    },

    #[error("timed out after {steps} steps waiting for {what}")]
    Timeout { what: String, steps: u64 },

    #[error("no simulation object named {0}")]
    UnknownObject(String),

    #[error("bus {bus} has no signal {signal}")]
    MissingSignal { bus: String, signal: String },

    #[error("signal {signal} is {actual} bits wide, expected {expected}")]
    WidthMismatch {
        signal: String,
        expected: u32,
        actual: u32,
    },

    #[error("unknown time unit {0}")]
    InvalidTimeUnit(String),

    #[error("can't convert {time} {unit} to sim steps without rounding")]
    TimeRounding { time: String, unit: String },

    #[error("delta cycle limit of {max} exceeded at step {time}")]
    DeltaLimit { time: u64, max: u32 },

    #[error("callback handle {0} is not registered")]
    UnknownCallback(usize),

    #[error("no simulation is running on this thread")]
    NoSimulation,

    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mismatch_display() {
        let e = RstbErr::Mismatch {
            interface: "o_rx".into(),
            expected: "A".into(),
            actual: "B".into(),
        };
        assert_eq!(e.to_string(), "o_rx: expected A, got B");
    }

    #[test]
    fn leftover_display() {
        let e = RstbErr::Leftover {
            interface: "o_tx".into(),
            count: 2,
            pending: "[x, y]".into(),
        };
        assert_eq!(
            e.to_string(),
            "o_tx: 2 predicted transaction(s) never observed: [x, y]"
        );
    }

    #[test]
    fn timeout_display() {
        let e = RstbErr::Timeout {
            what: "rising edge on top.pulse_out".into(),
            steps: 20_000,
        };
        assert_eq!(
            e.to_string(),
            "timed out after 20000 steps waiting for rising edge on top.pulse_out"
        );
    }
}
