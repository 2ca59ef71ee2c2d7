use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{
    signal::SimObject,
    sim_if::{SimCallback, SIM_IF},
    value::Val,
    RstbResult,
};

struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn new() -> Self {
        Self {
            handle: None,
            callbacks: VecDeque::new(),
        }
    }
}

// ReadOnly waiters are kept per phase, see `Phase`.
struct ReadOnlyHandles {
    handle: Option<usize>,
    model: VecDeque<TrigShared>,
    check: VecDeque<TrigShared>,
}

struct Triggers {
    // key is signal handle as u64
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time
    timers: IntMap<CallbackHandles>,
    read_write: CallbackHandles,
    read_only: ReadOnlyHandles,
}

impl Triggers {
    fn new() -> Self {
        Self {
            edges: IntMap::new(),
            timers: IntMap::new(),
            read_write: CallbackHandles::new(),
            read_only: ReadOnlyHandles {
                handle: None,
                model: VecDeque::new(),
                check: VecDeque::new(),
            },
        }
    }
}

thread_local! {
    static TRIGGERS: RefCell<Triggers> = RefCell::new(Triggers::new());
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

/// Sub-phases of the ReadOnly region.
///
/// Every task waiting in `Model` runs to its next suspension point before any task waiting in
/// `Check` is woken. Samplers feeding reference models wait in `Model`, monitors feeding a
/// scoreboard wait in `Check`, so a prediction derived from an input observed at some instant
/// is always queued before the output observed at the same instant is compared.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Phase {
    Model,
    Check,
}

pub(crate) fn cancel_all_triggers() {
    let handles = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut handles = Vec::new();
        handles.extend(t.read_only.handle.take());
        handles.extend(t.read_write.handle.take());
        for (_, cb) in t.timers.drain() {
            handles.extend(cb.handle);
        }
        for (_, cb) in t.edges.drain() {
            handles.extend(cb.handle);
        }
        *t = Triggers::new();
        handles
    });
    for handle in handles {
        // the host may already have retired one-shot callbacks
        let _ = SIM_IF.cancel_callback(handle);
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    fired: Arc<AtomicBool>,
    // If trigger is an edge, the react method needs to know if it is a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
}

impl TrigShared {
    fn fire(self) {
        self.fired.store(true, Ordering::Release);
        self.waker.wake();
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly(Phase),
}

#[derive(Debug)]
pub struct Trigger {
    kind: TrigKind,
    // set once registered, flipped by `react`
    fired: Option<Arc<AtomicBool>>,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, fired: None }
    }
    pub fn timer(time: u64, unit: &str) -> Self {
        let steps = SIM_IF
            .get_sim_steps(time as f64, unit)
            .unwrap_or_else(|e| panic!("Invalid timer {}{}: {}", time, unit, e));
        Trigger::new(TrigKind::Timer(steps))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    /// ReadOnly region, after all `read_only_model` waiters have run.
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly(Phase::Check))
    }
    /// ReadOnly region, before any `read_only` waiter runs.
    pub fn read_only_model() -> Self {
        Trigger::new(TrigKind::ReadOnly(Phase::Model))
    }
    pub fn read_only_phase(phase: Phase) -> Self {
        Trigger::new(TrigKind::ReadOnly(phase))
    }
    pub fn kind(&self) -> TrigKind {
        self.kind
    }
}

fn register(cb: SimCallback) -> usize {
    SIM_IF
        .register_callback(cb)
        .unwrap_or_else(|e| panic!("Can't register {:?} callback: {}", cb, e))
}

impl Future for Trigger {
    type Output = Val;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(fired) = &self.fired {
            // A task can be woken by a trigger it stopped waiting for (select), so only our
            // own flag counts.
            return match fired.load(Ordering::Acquire) {
                true => Poll::Ready(Val::None),
                false => Poll::Pending,
            };
        }
        let fired = Arc::new(AtomicBool::new(false));
        let mut shared = TrigShared {
            waker: cx.waker().clone(),
            fired: fired.clone(),
            edge_kind: EdgeKind::Any,
        };
        self.fired = Some(fired);

        match self.kind {
            TrigKind::ReadWrite => TRIGGERS.with(|t| {
                let mut t = t.borrow_mut();
                t.read_write.callbacks.push_back(shared);
                if t.read_write.handle.is_none() {
                    t.read_write.handle = Some(register(SimCallback::ReadWrite));
                }
            }),
            TrigKind::ReadOnly(phase) => TRIGGERS.with(|t| {
                let mut t = t.borrow_mut();
                match phase {
                    Phase::Model => t.read_only.model.push_back(shared),
                    Phase::Check => t.read_only.check.push_back(shared),
                }
                if t.read_only.handle.is_none() {
                    t.read_only.handle = Some(register(SimCallback::ReadOnly));
                }
            }),
            TrigKind::Timer(steps) => {
                // Add current time to key since since simulator will send back absolute time, not delta
                let abs_time = steps + SIM_IF.get_sim_time_steps();
                TRIGGERS.with(|t| {
                    let mut t = t.borrow_mut();
                    if let Some(callbacks) = t.timers.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let mut callbacks = CallbackHandles::new();
                        callbacks.handle = Some(register(SimCallback::Time(steps)));
                        callbacks.callbacks.push_back(shared);
                        t.timers.insert(abs_time, callbacks);
                    }
                })
            }
            TrigKind::Edge(sig_hdl, edge_kind) => {
                shared.edge_kind = edge_kind;
                TRIGGERS.with(|t| {
                    let mut t = t.borrow_mut();
                    if let Some(callbacks) = t.edges.get_mut(sig_hdl as u64) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let mut callbacks = CallbackHandles::new();
                        callbacks.handle = Some(register(SimCallback::Edge(sig_hdl)));
                        callbacks.callbacks.push_back(shared);
                        t.edges.insert(sig_hdl as u64, callbacks);
                    }
                })
            }
        }
        Poll::Pending
    }
}

/// Entry point for the host: wakes everything waiting on `cb` and runs the woken tasks.
#[inline]
pub fn react(cb: SimCallback, edge: Option<EdgeKind>) {
    if cb == SimCallback::ReadOnly {
        react_read_only();
        return;
    }

    let mut cancel = None;
    let wake: VecDeque<TrigShared> = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        match cb {
            SimCallback::ReadWrite => {
                t.read_write.handle = None; // remove handle, since CB is now done
                std::mem::take(&mut t.read_write.callbacks)
            }
            SimCallback::Time(abs_time) => t
                .timers
                .remove(abs_time)
                .map(|callbacks| callbacks.callbacks)
                .unwrap_or_default(),
            SimCallback::Edge(sig_hdl) => {
                let Some(mut callbacks) = t.edges.remove(sig_hdl as u64) else {
                    return VecDeque::new();
                };
                let edge = edge.unwrap_or(EdgeKind::Any);
                let (woken, resched): (VecDeque<_>, VecDeque<_>) = callbacks
                    .callbacks
                    .drain(..)
                    .partition(|trig| trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge);
                if resched.is_empty() {
                    // if no callbacks are remaining, cancel
                    cancel = callbacks.handle;
                } else {
                    callbacks.callbacks = resched;
                    t.edges.insert(sig_hdl as u64, callbacks);
                }
                woken
            }
            SimCallback::ReadOnly => VecDeque::new(),
        }
    });
    if let Some(handle) = cancel {
        let _ = SIM_IF.cancel_callback(handle);
    }

    if !wake.is_empty() {
        for shared in wake {
            shared.fire();
        }
        // execute woken tasks
        executor::run_once();
    }
}

fn react_read_only() {
    let model = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        t.read_only.handle = None;
        std::mem::take(&mut t.read_only.model)
    });
    for shared in model {
        shared.fire();
    }
    executor::run_once();

    let check = TRIGGERS.with(|t| std::mem::take(&mut t.borrow_mut().read_only.check));
    for shared in check {
        shared.fire();
    }
    executor::run_once();
}
