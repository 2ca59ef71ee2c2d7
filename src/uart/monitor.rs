use crate::bus::{Bus, ResetLine, Transaction};
use crate::prelude::*;
use crate::sampler::{EventSink, SamplerEvent};
use crate::scoreboard::Checker;

/// Sampler sink that hands every sampled wire state to a checker: the capture of idle and
/// reset ticks, and the start, data and stop samples of a frame.
pub struct WireMonitor<T> {
    checker: Checker<T>,
}

impl<T> WireMonitor<T> {
    pub fn new(checker: Checker<T>) -> Self {
        Self { checker }
    }
}

impl<T: Transaction> EventSink<T> for WireMonitor<T> {
    fn on_event(&mut self, event: SamplerEvent<T>) -> SimpleResult<()> {
        let actual = match event {
            SamplerEvent::Reset(c) | SamplerEvent::Idle(c) => c,
            SamplerEvent::Start { sample, .. } | SamplerEvent::Bit { sample, .. } => sample,
            SamplerEvent::Frame(_) => return Ok(()),
        };
        self.checker.check(actual)
    }
}

/// Captures a bus on every clock tick and checks the captures `filter` accepts, plus every
/// capture taken in reset.
pub struct BusMonitor<T> {
    clk: SimObject,
    bus: Bus<T>,
    reset: ResetLine,
    checker: Checker<T>,
    filter: fn(&T) -> bool,
}

impl<T: Transaction> BusMonitor<T> {
    pub fn new(
        clk: SimObject,
        bus: Bus<T>,
        reset: ResetLine,
        checker: Checker<T>,
        filter: fn(&T) -> bool,
    ) -> Self {
        Self {
            clk,
            bus,
            reset,
            checker,
            filter,
        }
    }

    #[allow(unreachable_code)]
    pub async fn run(self) -> RstbResult {
        loop {
            self.clk.rising_edge_ro().await?;
            let actual = self.bus.capture()?;
            if self.reset.asserted()? || (self.filter)(&actual) {
                self.checker.check(actual)?;
            }
        }
        Ok(Val::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expected::expected_queue;
    use crate::scoreboard::Scoreboard;
    use crate::uart::TxWire;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_check_is_returned_to_the_sampler() {
        let sb = Scoreboard::new();
        let (pred, exp) = expected_queue("o_tx", TxWire::IDLE);
        pred.predict(TxWire::START);
        let mut monitor = WireMonitor::new(sb.checker(exp));

        assert_eq!(monitor.on_event(SamplerEvent::Idle(TxWire::IDLE)), Ok(()));
        assert_eq!(
            monitor.on_event(SamplerEvent::Idle(TxWire::IDLE)),
            Err(RstbErr::Mismatch {
                interface: "o_tx".to_string(),
                expected: format!("{:?}", TxWire::START),
                actual: format!("{:?}", TxWire::IDLE),
            })
        );
        // nothing predicted is left for the stop bit
        assert!(matches!(
            monitor.on_event(SamplerEvent::Bit {
                index: 9,
                sample: TxWire::STOP,
            }),
            Err(RstbErr::Starvation { .. })
        ));
    }
}
