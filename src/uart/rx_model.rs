use super::transactions::{RxLine, RxOutput};
use crate::expected::Predictor;
use crate::prelude::*;
use crate::sampler::{EventSink, SamplerEvent, FRAME_BITS};

// a sampled stop bit sets bit 9, anything below is a break
const STOP_BIT: u16 = 1 << (FRAME_BITS - 1);

/// Predicts `o_rx_data_valid`/`o_rx_data` from the samples of `i_rx`.
pub struct RxModel {
    predictor: Predictor<RxOutput>,
    shift: u16,
    bits: usize,
    last_reset: bool,
}

impl RxModel {
    pub fn new(predictor: Predictor<RxOutput>) -> Self {
        Self {
            predictor,
            shift: 0,
            bits: 0,
            last_reset: false,
        }
    }

    fn on_reset(&mut self) {
        // the output is idle in the same tick reset is seen
        if !self.predictor.amend(RxOutput::IDLE) {
            self.predictor.push(RxOutput::IDLE);
        }
        self.predictor.predict_fill(RxOutput::IDLE);
        self.shift = 0;
        self.bits = 0;
        self.last_reset = true;
    }

    fn fold(&mut self, bit: bool) {
        self.shift |= (bit as u16) << self.bits;
        self.bits = (self.bits + 1) % FRAME_BITS;
        if self.bits == 0 {
            self.frame_done();
        }
    }

    fn frame_done(&mut self) {
        if self.last_reset {
            // no output follows the reset fill, drop it before predicting data
            self.last_reset = false;
            if let Some(stale) = self.predictor.retract_fill() {
                SIM_IF.warn(&format!(
                    "{}: discarding stale placeholder {:?}",
                    self.predictor.interface(),
                    stale
                ));
            }
        }
        let backlog = self.predictor.committed_len();
        if backlog > 0 {
            SIM_IF.error(&format!(
                "{}: {} earlier byte(s) still not received",
                self.predictor.interface(),
                backlog
            ));
        }
        if self.shift >= STOP_BIT {
            let data = (self.shift >> 1) as u8;
            SIM_IF.debug(&format!("rx model: byte {:#04x}", data));
            self.predictor.predict(RxOutput::byte(data));
        } else {
            SIM_IF.log(&format!(
                "rx model: break (frame {:#05x}), no output expected",
                self.shift
            ));
        }
        self.shift = 0;
    }
}

impl EventSink<RxLine> for RxModel {
    fn on_event(&mut self, event: SamplerEvent<RxLine>) -> SimpleResult<()> {
        match event {
            SamplerEvent::Reset(_) => self.on_reset(),
            SamplerEvent::Start { sample, .. } | SamplerEvent::Bit { sample, .. } => {
                self.fold(sample.rx)
            }
            SamplerEvent::Idle(_) | SamplerEvent::Frame(_) => {}
        }
        Ok(())
    }
}
