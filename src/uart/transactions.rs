use crate::bus::{Field, Transaction};
use crate::sampler::{LineLevel, Strobe};

/// `i_rx`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxLine {
    pub rx: bool,
}

impl Transaction for RxLine {
    const FIELDS: &'static [Field] = &[Field {
        name: "rx",
        width: 1,
    }];
    fn from_values(values: &[u32]) -> Self {
        Self { rx: values[0] != 0 }
    }
}

impl LineLevel for RxLine {
    fn line(&self) -> bool {
        self.rx
    }
}

/// `o_rx_data_valid`, `o_rx_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxOutput {
    pub rx_data_valid: bool,
    pub rx_data: u8,
}

impl RxOutput {
    /// Output in reset and between bytes.
    pub const IDLE: Self = Self {
        rx_data_valid: false,
        rx_data: 0,
    };

    pub fn byte(data: u8) -> Self {
        Self {
            rx_data_valid: true,
            rx_data: data,
        }
    }
}

impl Transaction for RxOutput {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "rx_data_valid",
            width: 1,
        },
        Field {
            name: "rx_data",
            width: 8,
        },
    ];
    fn from_values(values: &[u32]) -> Self {
        Self {
            rx_data_valid: values[0] != 0,
            rx_data: values[1] as u8,
        }
    }
}

/// `i_tx_start`, `i_tx_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInput {
    pub tx_start: bool,
    pub tx_data: u8,
}

impl Transaction for TxInput {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "tx_start",
            width: 1,
        },
        Field {
            name: "tx_data",
            width: 8,
        },
    ];
    fn from_values(values: &[u32]) -> Self {
        Self {
            tx_start: values[0] != 0,
            tx_data: values[1] as u8,
        }
    }
}

impl Strobe for TxInput {
    fn strobe(&self) -> bool {
        self.tx_start
    }
}

/// `o_tx`, `o_tx_ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxWire {
    pub tx: bool,
    pub tx_ready: bool,
}

impl TxWire {
    pub const RESET: Self = Self::new(false, false);
    pub const IDLE: Self = Self::new(true, true);
    pub const START: Self = Self::new(false, false);
    pub const STOP: Self = Self::new(true, false);

    pub const fn new(tx: bool, tx_ready: bool) -> Self {
        Self { tx, tx_ready }
    }

    pub fn data_bit(bit: bool) -> Self {
        Self::new(bit, false)
    }
}

impl Transaction for TxWire {
    const FIELDS: &'static [Field] = &[
        Field {
            name: "tx",
            width: 1,
        },
        Field {
            name: "tx_ready",
            width: 1,
        },
    ];
    fn from_values(values: &[u32]) -> Self {
        Self::new(values[0] != 0, values[1] != 0)
    }
}

impl LineLevel for TxWire {
    fn line(&self) -> bool {
        self.tx
    }
}
