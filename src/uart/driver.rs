use crate::prelude::*;
use crate::sampler::FRAME_BITS;

/// Drives one frame of `byte` on the serial input `rx`, each bit for `baud` clock ticks.
/// Returns when the stop bit is complete, so frames can be sent back to back.
pub async fn send_rx_byte(clk: SimObject, rx: SimObject, baud: u32, byte: u8) -> RstbResult {
    let frame = (1u16 << (FRAME_BITS - 1)) | (byte as u16) << 1;
    clk.rising_edge_rw().await?;
    for i in 0..FRAME_BITS {
        rx.set((frame >> i & 1) as u32);
        for _ in 0..baud {
            clk.rising_edge_rw().await?;
        }
    }
    Ok(Val::None)
}

/// Holds `rx` low for `ticks` clock ticks, then releases it to idle.
pub async fn hold_rx_low(clk: SimObject, rx: SimObject, ticks: u32) -> RstbResult {
    clk.rising_edge_rw().await?;
    rx.set(0);
    for _ in 0..ticks {
        clk.rising_edge_rw().await?;
    }
    rx.set(1);
    Ok(Val::None)
}

/// Waits until the transmitter is ready, then pulses `tx_start` for one tick with `byte` on
/// `tx_data`.
pub async fn send_tx_byte(
    clk: SimObject,
    tx_start: SimObject,
    tx_data: SimObject,
    tx_ready: SimObject,
    byte: u8,
) -> RstbResult {
    loop {
        clk.rising_edge_rw().await?;
        if tx_ready.bool() {
            break;
        }
    }
    tx_data.set(byte as u32);
    tx_start.set(1);
    clk.rising_edge_rw().await?;
    tx_start.set(0);
    Ok(Val::None)
}
