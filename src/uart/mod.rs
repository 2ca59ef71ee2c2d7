//! UART verification components.

pub mod driver;
mod monitor;
mod rx_model;
mod tb;
mod transactions;
mod tx_model;

pub use monitor::{BusMonitor, WireMonitor};
pub use rx_model::RxModel;
pub use tb::{UartConfig, UartTb, CLK_PERIOD_PS};
pub use transactions::{RxLine, RxOutput, TxInput, TxWire};
pub use tx_model::TxModel;
