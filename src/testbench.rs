use crate::prelude::*;

/*
 * CLOCK
 */
#[allow(unreachable_code)]
pub async fn clock(clk: SimObject, period: u32, unit: &str) -> RstbResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        SIM_IF.warn(&format!("Clock period {period}{unit} not dividable by 2. High time will be {high}{unit}; low time will be {low}{unit}.", period=period, unit=unit, high=high_t, low=low_t));
    }
    loop {
        clk.set(0);
        Trigger::timer(low_t as u64, unit).await;
        clk.set(1);
        Trigger::timer(high_t as u64, unit).await;
    }
    Ok(Val::None)
}

/*
 * RESET
 */
/// Holds the active-low `rstn` asserted for `duration` and releases it in the ReadWrite
/// region after the next rising edge of `clk`, like any other synchronous stimulus.
pub async fn reset_dut(clk: SimObject, rstn: SimObject, duration: u64, unit: &str) -> RstbResult {
    rstn.set(0);
    Trigger::timer(duration, unit).await;
    clk.rising_edge_rw().await?;
    rstn.set(1);
    SIM_IF.debug(&format!("{} released", rstn.name()));
    Ok(Val::None)
}
