use super::driver;
use super::monitor::{BusMonitor, WireMonitor};
use super::rx_model::RxModel;
use super::transactions::{RxLine, RxOutput, TxInput, TxWire};
use super::tx_model::TxModel;
use crate::bus::{Bus, ResetLine};
use crate::expected::expected_queue;
use crate::prelude::*;
use crate::sampler::{BitSampler, LineFallsActive, LineFallsFromHigh, StrobeRises};
use crate::scoreboard::Scoreboard;
use crate::trigger::Phase;

pub const CLK_PERIOD_PS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Clock ticks per bit.
    pub baud: u32,
}

impl UartConfig {
    /// Reads the `BAUD` parameter of the design.
    pub fn from_dut(dut: SimObject) -> SimpleResult<Self> {
        let baud = dut.get_child("BAUD")?.try_u32()?;
        if baud < 2 {
            return Err(RstbErr::Failed(format!(
                "{}.BAUD = {} is too short to sample mid-bit",
                dut.name(),
                baud
            )));
        }
        Ok(Self { baud })
    }
}

/// UART receiver and transmitter testbench: clock, samplers, reference models, monitors and
/// one scoreboard with the interfaces `o_rx` and `o_tx`.
#[derive(Clone)]
pub struct UartTb {
    pub scoreboard: Scoreboard,
    pub config: UartConfig,
    dut: SimObject,
    clk: SimObject,
    rstn: SimObject,
}

impl UartTb {
    pub fn new(dut: SimObject) -> SimpleResult<Self> {
        let config = UartConfig::from_dut(dut)?;
        let clk = dut.get_child("clk")?;
        let rstn = dut.get_child("rstn")?;
        let reset = ResetLine::active_low(rstn);
        let scoreboard = Scoreboard::new();

        // receive path: i_rx -> model -> o_rx_data_valid/o_rx_data
        let rx_in = Bus::<RxLine>::new(dut, "i")?;
        let rx_out = Bus::<RxOutput>::new(dut, "o")?;
        let (rx_pred, rx_exp) = expected_queue("o_rx", RxOutput::IDLE);
        let rx_sampler = BitSampler::new(config.baud, LineFallsActive)?;
        let rx_monitor = BusMonitor::new(
            clk,
            rx_out,
            reset,
            scoreboard.checker(rx_exp),
            |out: &RxOutput| out.rx_data_valid,
        );

        // transmit path: i_tx_start/i_tx_data -> model -> o_tx/o_tx_ready
        let tx_in = Bus::<TxInput>::new(dut, "i")?;
        let tx_out = Bus::<TxWire>::new(dut, "o")?;
        let (tx_pred, tx_exp) = expected_queue("o_tx", TxWire::RESET);
        let tx_in_sampler = BitSampler::new(config.baud, StrobeRises)?;
        let tx_out_sampler = BitSampler::new(config.baud, LineFallsFromHigh)?;

        Task::fork(clock(clk, CLK_PERIOD_PS, "ps"));
        Task::fork(rx_sampler.run(clk, rx_in, reset, Phase::Model, RxModel::new(rx_pred)));
        Task::fork(rx_monitor.run());
        Task::fork(tx_in_sampler.run(clk, tx_in, reset, Phase::Model, TxModel::new(tx_pred)));
        Task::fork(tx_out_sampler.run(
            clk,
            tx_out,
            reset,
            Phase::Check,
            WireMonitor::new(scoreboard.checker(tx_exp)),
        ));

        Ok(Self {
            scoreboard,
            config,
            dut,
            clk,
            rstn,
        })
    }

    pub fn clk(&self) -> SimObject {
        self.clk
    }

    /// Drives idle inputs and holds reset for `duration`.
    pub async fn reset(&self, duration: u64, unit: &str) -> RstbResult {
        self.dut.c("i_rx").set(1);
        self.dut.c("i_tx_start").set(0);
        self.dut.c("i_tx_data").set(0);
        reset_dut(self.clk, self.rstn, duration, unit).await
    }

    /// Asserts reset from a clock edge on, for `ticks` clock ticks.
    pub async fn pulse_reset(&self, ticks: u32) -> RstbResult {
        self.clk.rising_edge_rw().await?;
        self.rstn.set(0);
        for _ in 0..ticks {
            self.clk.rising_edge_rw().await?;
        }
        self.rstn.set(1);
        Ok(Val::None)
    }

    pub async fn send_rx_byte(&self, byte: u8) -> RstbResult {
        driver::send_rx_byte(self.clk, self.dut.c("i_rx"), self.config.baud, byte).await
    }

    pub async fn hold_rx_low(&self, ticks: u32) -> RstbResult {
        driver::hold_rx_low(self.clk, self.dut.c("i_rx"), ticks).await
    }

    pub async fn send_tx_byte(&self, byte: u8) -> RstbResult {
        driver::send_tx_byte(
            self.clk,
            self.dut.c("i_tx_start"),
            self.dut.c("i_tx_data"),
            self.dut.c("o_tx_ready"),
            byte,
        )
        .await
    }

    /// Waits `frames` frame times, enough for outstanding bytes to show up.
    pub async fn idle_frames(&self, frames: u32) -> RstbResult {
        clock_cycles(self.clk, frames * 10 * self.config.baud).await
    }

    pub fn finish(&self) -> RstbResult {
        self.scoreboard.finish()
    }
}
