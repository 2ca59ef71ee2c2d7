use crate::prelude::*;
use std::fmt;
use std::marker::PhantomData;

/// One named signal of a transaction and its width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub width: u32,
}

/// Fixed-schema record captured from a group of signals at one instant.
pub trait Transaction: Clone + PartialEq + fmt::Debug + Send + 'static {
    const FIELDS: &'static [Field];

    /// Builds the transaction from raw values given in `FIELDS` order.
    fn from_values(values: &[u32]) -> Self;
}

/// Signals of a [`Transaction`], resolved once against the design.
///
/// Field `f` of a bus with prefix `p` is the signal `p_f`, or `f` for an empty prefix.
pub struct Bus<T> {
    name: String,
    signals: Vec<SimObject>,
    _t: PhantomData<fn() -> T>,
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signals: self.signals.clone(),
            _t: PhantomData,
        }
    }
}

impl<T: Transaction> Bus<T> {
    pub fn new(dut: SimObject, prefix: &str) -> SimpleResult<Self> {
        let name = match prefix {
            "" => dut.name(),
            _ => format!("{}.{}", dut.name(), prefix),
        };
        let mut signals = Vec::with_capacity(T::FIELDS.len());
        for field in T::FIELDS {
            let signal_name = match prefix {
                "" => field.name.to_string(),
                _ => format!("{}_{}", prefix, field.name),
            };
            let signal = dut
                .get_child(&signal_name)
                .map_err(|_| RstbErr::MissingSignal {
                    bus: name.clone(),
                    signal: signal_name.clone(),
                })?;
            if signal.size() != field.width {
                return Err(RstbErr::WidthMismatch {
                    signal: signal.name(),
                    expected: field.width,
                    actual: signal.size(),
                });
            }
            signals.push(signal);
        }
        Ok(Self {
            name,
            signals,
            _t: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal(&self, field: &str) -> Option<SimObject> {
        T::FIELDS
            .iter()
            .position(|f| f.name == field)
            .map(|i| self.signals[i])
    }

    /// Reads all fields in one go. Call from a ReadOnly region to get settled values.
    pub fn capture(&self) -> SimpleResult<T> {
        let values = self
            .signals
            .iter()
            .map(|s| s.try_u32())
            .collect::<SimpleResult<Vec<_>>>()?;
        Ok(T::from_values(&values))
    }
}

/// Reset input shared by the samplers and monitors of a testbench.
#[derive(Debug, Clone, Copy)]
pub struct ResetLine {
    signal: SimObject,
    active_low: bool,
}

impl ResetLine {
    pub fn active_low(signal: SimObject) -> Self {
        Self {
            signal,
            active_low: true,
        }
    }
    pub fn asserted(&self) -> SimpleResult<bool> {
        Ok((self.signal.try_u32()? != 0) != self.active_low)
    }
}
