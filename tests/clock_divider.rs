mod common;

use common::{clock_divider, quiet};
use pretty_assertions::assert_eq;
use rstb_uart::prelude::*;
use rstb_uart::uart::CLK_PERIOD_PS;

async fn rises(signal: SimObject) -> RstbResult {
    signal.rising_edge().await;
    Ok(Val::None)
}

async fn pulses_every_period(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk");
    let enable = dut.c("enable");
    let pulse = dut.c("pulse_out");
    let period = dut.c("PERIOD").u32();

    Task::fork(clock(clk, CLK_PERIOD_PS, "ps"));
    reset_dut(clk, dut.c("rstn"), 5, "ns").await?;
    enable.set(1);

    let mut high = Vec::new();
    for tick in 0..10 * period {
        clk.rising_edge_ro().await?;
        if pulse.bool() {
            high.push(tick);
        }
    }
    if high.len() != 10 {
        return Err(RstbErr::Failed(format!("pulses at ticks {:?}", high)));
    }
    // one tick wide, exactly one period apart
    if let Some(w) = high.windows(2).find(|w| w[1] - w[0] != period) {
        return Err(RstbErr::Failed(format!(
            "pulses {} ticks apart, expected {}",
            w[1] - w[0],
            period
        )));
    }

    clk.rising_edge_rw().await?;
    enable.set(0);
    let quiet_steps = 100 * CLK_PERIOD_PS as u64;
    match with_timeout(rises(pulse), quiet_steps, "pulse_out").await {
        Err(RstbErr::Timeout { .. }) => Ok(Val::String(format!("{} pulses", high.len()))),
        other => Err(RstbErr::Failed(format!(
            "pulse while disabled: {:?}",
            other
        ))),
    }
}

#[test]
fn divider_pulses_only_while_enabled() {
    let report = native::run(
        clock_divider(10),
        vec![Test::new("pulses_every_period", |dut| {
            pulses_every_period(dut).boxed()
        })],
        &quiet(),
    )
    .unwrap();
    assert_eq!(report.failures(), Vec::<String>::new());
}

async fn never_enabled(dut: SimObject) -> RstbResult {
    let clk = dut.c("clk");
    Task::fork(clock(clk, CLK_PERIOD_PS, "ps"));
    reset_dut(clk, dut.c("rstn"), 5, "ns").await?;
    clock_cycles(clk, 20).await?;
    rises(dut.c("pulse_out")).await
}

#[test]
fn waiting_on_a_silent_signal_times_out() {
    let report = native::run(
        clock_divider(10),
        vec![Test::new("never_enabled", |dut| never_enabled(dut).boxed())],
        &quiet().max_sim_steps(Some(200 * CLK_PERIOD_PS as u64)),
    )
    .unwrap();
    assert!(matches!(
        report.result("never_enabled"),
        Some(Err(RstbErr::Timeout { .. }))
    ));
}
