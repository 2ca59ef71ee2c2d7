//! Baud-cadence sampling of serial lines.
//!
//! A [`BitSampler`] watches a [`Transaction`] once per clock tick. While idle it asks its
//! [`StartCondition`] whether a frame begins. Once one does, it samples half a baud interval
//! later (start bit) and then every baud interval for the 8 data bits and the stop bit. Reset
//! pre-empts everything.
//!
//! Events per tick:
//!
//! | tick                         | event                          |
//! |------------------------------|--------------------------------|
//! | reset asserted               | `Reset(capture)`               |
//! | idle, no start               | `Idle(capture)`                |
//! | start detected at `d`        | none                           |
//! | `d + baud/2`                 | `Start { trigger, sample }`    |
//! | `d + baud/2 + i*baud`, i 1..9 | `Bit { index: i, sample }`    |
//! | after bit 9                  | `Frame(..)`                    |
//! | until `d + 10*baud`          | none, idle again from there    |

use crate::bus::{Bus, ResetLine, Transaction};
use crate::prelude::*;
use crate::trigger::Phase;

pub const FRAME_BITS: usize = 10;

/// Transactions carrying a serial line, idle high.
pub trait LineLevel {
    fn line(&self) -> bool;
}

/// Transactions carrying a start strobe.
pub trait Strobe {
    fn strobe(&self) -> bool;
}

pub trait StartCondition<T>: Send {
    /// `prev` is the capture of the previous tick. It is None on the first tick and on the
    /// first tick out of reset, as levels seen in reset say nothing about a frame.
    fn is_start(&self, prev: Option<&T>, cur: &T) -> bool;
    /// Checked at the start bit sample point, a false return drops the frame.
    fn still_valid(&self, _trigger: &T, _cur: &T) -> bool {
        true
    }
}

/// Line goes from idle (high) to active (low). Without a previous tick the line counts as
/// idle, so a start bit already driven when reset is released starts a frame. Pulses shorter
/// than half a bit are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFallsActive;

impl<T: LineLevel> StartCondition<T> for LineFallsActive {
    fn is_start(&self, prev: Option<&T>, cur: &T) -> bool {
        prev.map_or(true, |p| p.line()) && !cur.line()
    }
    fn still_valid(&self, _trigger: &T, cur: &T) -> bool {
        !cur.line()
    }
}

/// Like [`LineFallsActive`], but the line has to be seen high first. For outputs that are
/// driven low in reset and only go idle on the first clock after it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFallsFromHigh;

impl<T: LineLevel> StartCondition<T> for LineFallsFromHigh {
    fn is_start(&self, prev: Option<&T>, cur: &T) -> bool {
        prev.map_or(false, |p| p.line()) && !cur.line()
    }
    fn still_valid(&self, _trigger: &T, cur: &T) -> bool {
        !cur.line()
    }
}

/// Start strobe is high.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrobeRises;

impl<T: Strobe> StartCondition<T> for StrobeRises {
    fn is_start(&self, _prev: Option<&T>, cur: &T) -> bool {
        cur.strobe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame<T> {
    /// Capture that started the frame.
    pub trigger: T,
    /// Start bit, 8 data bits LSB first, stop bit.
    pub samples: Vec<T>,
}

impl<T: LineLevel> Frame<T> {
    /// Line levels with the start bit in bit 0 and the stop bit in bit 9.
    pub fn bits(&self) -> u16 {
        self.samples
            .iter()
            .enumerate()
            .fold(0, |acc, (i, s)| acc | ((s.line() as u16) << i))
    }
    pub fn data(&self) -> u8 {
        (self.bits() >> 1) as u8
    }
    pub fn stop_ok(&self) -> bool {
        self.bits() >> 9 != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEvent<T> {
    Reset(T),
    Idle(T),
    Start { trigger: T, sample: T },
    Bit { index: usize, sample: T },
    Frame(Frame<T>),
}

pub trait EventSink<T>: Send {
    /// An error ends the sampler task with it.
    fn on_event(&mut self, event: SamplerEvent<T>) -> SimpleResult<()>;
}

impl<T, F> EventSink<T> for F
where
    F: FnMut(SamplerEvent<T>) -> SimpleResult<()> + Send,
{
    fn on_event(&mut self, event: SamplerEvent<T>) -> SimpleResult<()> {
        self(event)
    }
}

#[derive(Debug, Clone)]
enum State<T> {
    Idle,
    Active {
        trigger: T,
        countdown: u32,
        samples: Vec<T>,
    },
    // rest of the stop bit
    Tail {
        countdown: u32,
    },
}

pub struct BitSampler<T, S> {
    baud: u32,
    start: S,
    state: State<T>,
    prev: Option<T>,
}

impl<T: Transaction, S: StartCondition<T>> BitSampler<T, S> {
    /// `baud` is the number of clock ticks per bit, at least 2.
    pub fn new(baud: u32, start: S) -> SimpleResult<Self> {
        if baud < 2 {
            return Err(RstbErr::Failed(format!(
                "baud interval of {} ticks is too short to sample mid-bit",
                baud
            )));
        }
        Ok(Self {
            baud,
            start,
            state: State::Idle,
            prev: None,
        })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    /// Advances one clock tick with the capture `cur`.
    pub fn step(&mut self, cur: T, in_reset: bool) -> Vec<SamplerEvent<T>> {
        let events = self.advance(&cur, in_reset);
        self.prev = if in_reset { None } else { Some(cur) };
        events
    }

    fn advance(&mut self, cur: &T, in_reset: bool) -> Vec<SamplerEvent<T>> {
        if in_reset {
            self.state = State::Idle;
            return vec![SamplerEvent::Reset(cur.clone())];
        }
        match &mut self.state {
            State::Idle => {}
            State::Tail { countdown } => {
                *countdown -= 1;
                if *countdown > 0 {
                    return Vec::new();
                }
                // stop bit is over, this tick is idle again
                self.state = State::Idle;
            }
            State::Active {
                trigger,
                countdown,
                samples,
            } => {
                *countdown -= 1;
                if *countdown > 0 {
                    return Vec::new();
                }
                if samples.is_empty() {
                    if !self.start.still_valid(trigger, cur) {
                        SIM_IF.debug("Start condition gone at mid-bit, ignoring glitch");
                        self.state = State::Idle;
                        return vec![SamplerEvent::Idle(cur.clone())];
                    }
                    samples.push(cur.clone());
                    *countdown = self.baud;
                    return vec![SamplerEvent::Start {
                        trigger: trigger.clone(),
                        sample: cur.clone(),
                    }];
                }
                samples.push(cur.clone());
                let index = samples.len() - 1;
                let bit = SamplerEvent::Bit {
                    index,
                    sample: cur.clone(),
                };
                if index + 1 < FRAME_BITS {
                    *countdown = self.baud;
                    return vec![bit];
                }
                let frame = Frame {
                    trigger: trigger.clone(),
                    samples: std::mem::take(samples),
                };
                self.state = State::Tail {
                    countdown: self.baud - self.baud / 2,
                };
                return vec![bit, SamplerEvent::Frame(frame)];
            }
        }

        if self.start.is_start(self.prev.as_ref(), cur) {
            self.state = State::Active {
                trigger: cur.clone(),
                countdown: self.baud / 2,
                samples: Vec::with_capacity(FRAME_BITS),
            };
            Vec::new()
        } else {
            vec![SamplerEvent::Idle(cur.clone())]
        }
    }

    /// Samples `bus` on every rising edge of `clk`, in the ReadOnly `phase`, and feeds the
    /// events to `sink`. Runs until the test ends.
    #[allow(unreachable_code)]
    pub async fn run<K: EventSink<T>>(
        mut self,
        clk: SimObject,
        bus: Bus<T>,
        reset: ResetLine,
        phase: Phase,
        mut sink: K,
    ) -> RstbResult {
        loop {
            clk.rising_edge().await;
            Trigger::read_only_phase(phase).await;
            let cur = bus.capture()?;
            let in_reset = reset.asserted()?;
            for event in self.step(cur, in_reset) {
                sink.on_event(event)?;
            }
        }
        Ok(Val::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Field;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Line(bool);

    impl Transaction for Line {
        const FIELDS: &'static [Field] = &[Field {
            name: "rx",
            width: 1,
        }];
        fn from_values(values: &[u32]) -> Self {
            Line(values[0] != 0)
        }
    }

    impl LineLevel for Line {
        fn line(&self) -> bool {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Start(bool, u8);

    impl Transaction for Start {
        const FIELDS: &'static [Field] = &[
            Field {
                name: "start",
                width: 1,
            },
            Field {
                name: "data",
                width: 8,
            },
        ];
        fn from_values(values: &[u32]) -> Self {
            Start(values[0] != 0, values[1] as u8)
        }
    }

    impl Strobe for Start {
        fn strobe(&self) -> bool {
            self.0
        }
    }

    const BAUD: u32 = 4;

    // line level per tick for a whole frame, start bit first
    fn frame_ticks(byte: u8, stop: bool) -> Vec<bool> {
        let mut bits = vec![false];
        bits.extend((0..8).map(|i| byte >> i & 1 != 0));
        bits.push(stop);
        bits.iter()
            .flat_map(|b| std::iter::repeat(*b).take(BAUD as usize))
            .collect()
    }

    fn feed<S: StartCondition<Line>>(
        sampler: &mut BitSampler<Line, S>,
        ticks: &[bool],
    ) -> Vec<(usize, SamplerEvent<Line>)> {
        ticks
            .iter()
            .enumerate()
            .flat_map(|(t, l)| {
                sampler
                    .step(Line(*l), false)
                    .into_iter()
                    .map(move |e| (t, e))
            })
            .collect()
    }

    #[test]
    fn rejects_tiny_baud() {
        assert!(BitSampler::<Line, _>::new(1, LineFallsActive).is_err());
    }

    #[test]
    fn samples_mid_bit() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        let mut ticks = vec![true, true];
        ticks.extend(frame_ticks(0x6b, true));
        ticks.extend([true, true]);
        let events = feed(&mut sampler, &ticks);

        // two idle ticks, then the frame starting at tick 2
        assert_eq!(events[0], (0, SamplerEvent::Idle(Line(true))));
        assert_eq!(events[1], (1, SamplerEvent::Idle(Line(true))));
        assert_eq!(
            events[2],
            (
                2 + 2,
                SamplerEvent::Start {
                    trigger: Line(false),
                    sample: Line(false)
                }
            )
        );
        let bits: Vec<_> = events
            .iter()
            .filter_map(|(t, e)| match e {
                SamplerEvent::Bit { index, sample } => Some((*t, *index, sample.0)),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = (1..=9)
            .map(|i| (4 + i * BAUD as usize, i, i == 9 || (0x6b >> (i - 1)) & 1 != 0))
            .collect();
        assert_eq!(bits, expected);

        let frame = events
            .iter()
            .find_map(|(t, e)| match e {
                SamplerEvent::Frame(f) => Some((*t, f.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(frame.0, 4 + 9 * BAUD as usize);
        assert_eq!(frame.1.data(), 0x6b);
        assert!(frame.1.stop_ok());

        // idle again exactly one frame after the start was seen
        let idle_again: Vec<_> = events
            .iter()
            .filter(|(t, e)| *t > 2 && matches!(e, SamplerEvent::Idle(_)))
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(idle_again, vec![2 + 10 * BAUD as usize, 3 + 10 * BAUD as usize]);
    }

    #[test]
    fn back_to_back_frames() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        let mut ticks = vec![true];
        ticks.extend(frame_ticks(0x4b, true));
        ticks.extend(frame_ticks(0x00, true));
        ticks.push(true);
        let frames: Vec<_> = feed(&mut sampler, &ticks)
            .into_iter()
            .filter_map(|(_, e)| match e {
                SamplerEvent::Frame(f) => Some((f.data(), f.stop_ok())),
                _ => None,
            })
            .collect();
        assert_eq!(frames, vec![(0x4b, true), (0x00, true)]);
    }

    #[test]
    fn held_low_line_is_one_broken_frame() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        let mut ticks = vec![true];
        ticks.extend(std::iter::repeat(false).take(30 * BAUD as usize));
        let frames: Vec<_> = feed(&mut sampler, &ticks)
            .into_iter()
            .filter_map(|(_, e)| match e {
                SamplerEvent::Frame(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].bits(), 0);
        assert!(!frames[0].stop_ok());
    }

    #[test]
    fn glitch_is_ignored() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        let events = feed(&mut sampler, &[true, false, true, true, true, true]);
        assert!(events.iter().all(|(_, e)| matches!(e, SamplerEvent::Idle(_))));
        // the tick at the start bit sample point reports idle, the waiting tick nothing
        assert_eq!(
            events.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            vec![0, 3, 4, 5]
        );
        assert!(sampler.is_idle());
    }

    #[test]
    fn reset_preempts_a_frame() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        let mut ticks = vec![true];
        ticks.extend(frame_ticks(0xff, true));
        let mut events = Vec::new();
        for (t, l) in ticks.iter().enumerate() {
            events.extend(sampler.step(Line(*l), t == 15));
        }
        assert!(events.contains(&SamplerEvent::Reset(Line(true))));
        assert!(!events.iter().any(|e| matches!(e, SamplerEvent::Frame(_))));
        assert!(sampler.is_idle());
    }

    #[test]
    fn start_bit_held_through_reset_release() {
        let mut sampler = BitSampler::new(BAUD, LineFallsActive).unwrap();
        for _ in 0..5 {
            sampler.step(Line(false), true);
        }
        let frames: Vec<_> = feed(&mut sampler, &frame_ticks(0x55, true))
            .into_iter()
            .filter_map(|(t, e)| match e {
                SamplerEvent::Frame(f) => Some((t, f.data(), f.stop_ok())),
                _ => None,
            })
            .collect();
        // the release tick is the start of the frame
        assert_eq!(frames, vec![(2 + 9 * BAUD as usize, 0x55, true)]);
    }

    #[test]
    fn output_low_in_reset_is_not_a_start() {
        let mut sampler = BitSampler::new(BAUD, LineFallsFromHigh).unwrap();
        sampler.step(Line(false), true);
        let events = feed(&mut sampler, &[false, true, true]);
        assert!(events.iter().all(|(_, e)| matches!(e, SamplerEvent::Idle(_))));
        assert_eq!(events.len(), 3);

        let mut ticks = vec![true];
        ticks.extend(frame_ticks(0x6b, true));
        let frames = feed(&mut sampler, &ticks)
            .into_iter()
            .filter(|(_, e)| matches!(e, SamplerEvent::Frame(_)))
            .count();
        assert_eq!(frames, 1);
    }

    #[test]
    fn strobe_starts_frame_without_transition() {
        let mut sampler = BitSampler::new(BAUD, StrobeRises).unwrap();
        let mut events = Vec::new();
        events.extend(sampler.step(Start(false, 0), false));
        events.extend(sampler.step(Start(true, 0x6b), false));
        events.extend(sampler.step(Start(false, 0), false));
        events.extend(sampler.step(Start(false, 0), false));
        assert_eq!(
            events,
            vec![
                SamplerEvent::Idle(Start(false, 0)),
                SamplerEvent::Start {
                    trigger: Start(true, 0x6b),
                    sample: Start(false, 0)
                }
            ]
        );
    }
}
