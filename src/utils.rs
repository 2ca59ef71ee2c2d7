use crate::prelude::*;
use futures::future::{select, Either};
use rand as rnd;
use std::future::Future;

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> RstbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await;
    }
    Ok(Val::None)
}

/// Races `future` against a timer of `steps` simulation steps.
///
/// Losing the race yields `RstbErr::Timeout` naming `what`, so a signal that never toggles
/// fails the test instead of hanging it.
pub async fn with_timeout<F>(future: F, steps: u64, what: &str) -> RstbResult
where
    F: Future<Output = RstbResult>,
{
    futures::pin_mut!(future);
    match select(future, Trigger::timer_steps(steps)).await {
        Either::Left((result, _)) => result,
        Either::Right(_) => Err(RstbErr::Timeout {
            what: what.to_string(),
            steps,
        }),
    }
}

/// Random payload byte for stimulus.
#[inline]
pub fn rand_byte() -> u8 {
    rnd::random::<u8>()
}
