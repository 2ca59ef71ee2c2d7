use super::transactions::{TxInput, TxWire};
use crate::expected::Predictor;
use crate::prelude::*;
use crate::sampler::{EventSink, SamplerEvent, FRAME_BITS};

/// Predicts `o_tx`/`o_tx_ready` from the start strobes on `i_tx_start`.
///
/// The input side runs one tick ahead of the wire, so every prediction is made for the next
/// tick and stays tentative until then.
pub struct TxModel {
    predictor: Predictor<TxWire>,
    shift: u8,
}

impl TxModel {
    pub fn new(predictor: Predictor<TxWire>) -> Self {
        Self { predictor, shift: 0 }
    }
}

impl EventSink<TxInput> for TxModel {
    fn on_event(&mut self, event: SamplerEvent<TxInput>) -> SimpleResult<()> {
        match event {
            SamplerEvent::Reset(_) => {
                // asynchronous reset: the wire drops in this very tick
                if !self.predictor.amend(TxWire::RESET) {
                    self.predictor.push(TxWire::RESET);
                }
                self.predictor.predict_fill(TxWire::RESET);
            }
            SamplerEvent::Idle(_) => self.predictor.predict_fill(TxWire::IDLE),
            SamplerEvent::Start { trigger, .. } => {
                self.shift = trigger.tx_data;
                SIM_IF.debug(&format!("tx model: sending {:#04x}", self.shift));
                self.predictor.predict(TxWire::START);
            }
            SamplerEvent::Bit { index, .. } if index + 1 < FRAME_BITS => {
                self.predictor.predict(TxWire::data_bit(self.shift & 1 != 0));
                self.shift >>= 1;
            }
            SamplerEvent::Bit { .. } => self.predictor.predict(TxWire::STOP),
            SamplerEvent::Frame(_) => {}
        }
        Ok(())
    }
}
