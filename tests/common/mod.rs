#![allow(dead_code)]

use rstb_uart::prelude::*;

/// Deliberate defects for checking that the testbench notices them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bug {
    None,
    /// transmitter shifts the byte out MSB first
    TxMsbFirst,
    /// transmitter never leaves idle
    TxIgnoresStart,
    /// receiver flips bit 0 of every byte
    RxFlipsLsb,
    /// receiver reports a byte twice
    RxDoubleValid,
    /// receiver never reports a byte
    RxSilent,
}

pub const BAUD: u32 = 10;

pub fn quiet() -> TbConfig {
    TbConfig::new().summary(false).results_xml(None)
}

/// UART with receiver and transmitter, active-low asynchronous reset.
pub fn uart(baud: u32, bug: Bug) -> Design {
    let design = Design::new("top")
        .signal("clk", 1)
        .signal_init("rstn", 1, 1)
        .param("BAUD", baud)
        .signal_init("i_rx", 1, 1)
        .signal("o_rx_data_valid", 1)
        .signal("o_rx_data", 8)
        .signal("i_tx_start", 1)
        .signal("i_tx_data", 8)
        .signal("o_tx", 1)
        .signal("o_tx_ready", 1);
    let design = with_receiver(design, baud, bug);
    with_transmitter(design, baud, bug)
}

fn with_receiver(design: Design, baud: u32, bug: Bug) -> Design {
    let mut busy = false;
    let mut prev_rx = 1;
    let mut count = 0;
    let mut shift: u16 = 0;
    let mut pending_repeat = false;
    design.process(&["clk", "rstn"], move |p| {
        if p.get("rstn") == 0 {
            busy = false;
            prev_rx = 1;
            pending_repeat = false;
            p.set("o_rx_data_valid", 0);
            p.set("o_rx_data", 0);
            return;
        }
        if !p.rose("clk") {
            return;
        }
        let rx = p.get("i_rx");
        let mut valid = 0;
        if pending_repeat {
            pending_repeat = false;
            valid = 1;
        }
        if !busy {
            if prev_rx == 1 && rx == 0 {
                busy = true;
                count = 0;
                shift = 0;
            }
        } else {
            count += 1;
            let half = baud / 2;
            if count >= half && (count - half) % baud == 0 {
                let bit = (count - half) / baud;
                shift |= (rx as u16) << bit;
                if bit == 0 && rx == 1 {
                    // start bit gone by mid-bit: glitch
                    busy = false;
                } else if bit == 9 {
                    busy = false;
                    if shift >> 9 == 1 {
                        let mut data = (shift >> 1) as u8;
                        if bug == Bug::RxFlipsLsb {
                            data ^= 1;
                        }
                        p.set("o_rx_data", data as u32);
                        valid = (bug != Bug::RxSilent) as u32;
                        pending_repeat = bug == Bug::RxDoubleValid;
                    }
                }
            }
        }
        prev_rx = rx;
        p.set("o_rx_data_valid", valid);
    })
}

fn with_transmitter(design: Design, baud: u32, bug: Bug) -> Design {
    let mut busy = false;
    let mut count = 0;
    let mut bit = 0;
    let mut frame: u16 = 0;
    design.process(&["clk", "rstn"], move |p| {
        if p.get("rstn") == 0 {
            busy = false;
            p.set("o_tx", 0);
            p.set("o_tx_ready", 0);
            return;
        }
        if !p.rose("clk") {
            return;
        }
        if !busy {
            if p.get("i_tx_start") == 1 && bug != Bug::TxIgnoresStart {
                let mut data = p.get("i_tx_data") as u8;
                if bug == Bug::TxMsbFirst {
                    data = data.reverse_bits();
                }
                frame = 1 << 9 | (data as u16) << 1;
                busy = true;
                count = 0;
                bit = 0;
                p.set("o_tx", 0);
                p.set("o_tx_ready", 0);
            } else {
                p.set("o_tx", 1);
                p.set("o_tx_ready", 1);
            }
            return;
        }
        count += 1;
        if count < baud {
            return;
        }
        count = 0;
        bit += 1;
        if bit == 10 {
            busy = false;
            p.set("o_tx", 1);
            p.set("o_tx_ready", 1);
        } else {
            p.set("o_tx", (frame >> bit & 1) as u32);
        }
    })
}

/// Free running divider: one-tick pulse every `PERIOD` ticks while enabled.
pub fn clock_divider(period: u32) -> Design {
    let mut count = 0;
    Design::new("top")
        .signal("clk", 1)
        .signal_init("rstn", 1, 1)
        .signal("enable", 1)
        .signal("pulse_out", 1)
        .param("PERIOD", period)
        .process(&["clk", "rstn"], move |p| {
            if p.get("rstn") == 0 {
                count = 0;
                p.set("pulse_out", 0);
                return;
            }
            if !p.rose("clk") {
                return;
            }
            if p.get("enable") == 0 {
                count = 0;
                p.set("pulse_out", 0);
                return;
            }
            count = (count + 1) % p.get("PERIOD");
            p.set("pulse_out", (count == 0) as u32);
        })
}
