use intmap::IntMap;
use log::Level;
use num_format::{Locale, ToFormattedString};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use crate::config::TbConfig;
use crate::executor;
use crate::logging;
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{SimCallback, SimIf, SIM_IF};
use crate::test::{SimReport, Test};
use crate::trigger::{self, EdgeKind};
use crate::{RstbErr, SimpleResult};

const ROOT: usize = 0;

thread_local! {
    static KERNEL: RefCell<Option<Kernel>> = RefCell::new(None);
}

fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> SimpleResult<R> {
    KERNEL.with(|k| match k.borrow_mut().as_mut() {
        Some(kernel) => Ok(f(kernel)),
        None => Err(RstbErr::NoSimulation),
    })
}

type ProcessBody = Box<dyn FnMut(&mut ProcessCtx<'_>)>;

/// Declaration of the simulated design: one scope with flat signals, parameters and
/// behavioural processes standing in for the DUT logic.
///
/// ```ignore
/// let design = Design::new("top")
///     .signal("clk", 1)
///     .signal_init("rstn", 1, 1)
///     .param("BAUD", 10)
///     .process(&["clk"], |p| {
///         if p.rose("clk") {
///             let q = p.get("d");
///             p.set("q", q);
///         }
///     });
/// ```
pub struct Design {
    name: String,
    precision: i8,
    signals: Vec<(String, u32, u32, bool)>,
    processes: Vec<(Vec<String>, ProcessBody)>,
}

impl Design {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            precision: -12,
            signals: Vec::new(),
            processes: Vec::new(),
        }
    }
    pub fn signal(self, name: &str, width: u32) -> Self {
        self.signal_init(name, width, 0)
    }
    pub fn signal_init(mut self, name: &str, width: u32, init: u32) -> Self {
        self.signals.push((name.to_string(), width, init, false));
        self
    }
    /// Read-only integer, like an HDL generic.
    pub fn param(mut self, name: &str, value: u32) -> Self {
        self.signals.push((name.to_string(), 32, value, true));
        self
    }
    pub fn precision(mut self, precision: i8) -> Self {
        self.precision = precision;
        self
    }
    /// Adds a process that runs once at time zero and again in every delta cycle in which
    /// one of `sensitivity` changed. Writes are non-blocking: all processes of a delta see
    /// the values from before that delta.
    pub fn process(
        mut self,
        sensitivity: &[&str],
        body: impl FnMut(&mut ProcessCtx<'_>) + 'static,
    ) -> Self {
        self.processes.push((
            sensitivity.iter().map(|s| s.to_string()).collect(),
            Box::new(body),
        ));
        self
    }

    fn elaborate(self) -> SimpleResult<Kernel> {
        let mut signals = vec![SignalSlot {
            name: self.name.clone(),
            width: 0,
            value: 0,
            param: false,
        }];
        let mut names = HashMap::new();
        let mut locals = HashMap::new();
        names.insert(self.name.clone(), ROOT);
        for (name, width, init, param) in self.signals {
            if !(1..=32).contains(&width) {
                return Err(RstbErr::WidthMismatch {
                    signal: format!("{}.{}", self.name, name),
                    expected: 32,
                    actual: width,
                });
            }
            if locals.contains_key(&name) {
                return Err(RstbErr::Failed(format!(
                    "signal {}.{} declared twice",
                    self.name, name
                )));
            }
            let handle = signals.len();
            names.insert(format!("{}.{}", self.name, name), handle);
            locals.insert(name.clone(), handle);
            signals.push(SignalSlot {
                name,
                width,
                value: init & mask(width),
                param,
            });
        }
        let mut processes = Vec::new();
        for (sensitivity, body) in self.processes {
            let sensitivity = sensitivity
                .iter()
                .map(|s| {
                    locals
                        .get(s)
                        .copied()
                        .ok_or_else(|| RstbErr::UnknownObject(format!("{}.{}", self.name, s)))
                })
                .collect::<SimpleResult<Vec<_>>>()?;
            processes.push(Process { sensitivity, body });
        }
        Ok(Kernel {
            precision: self.precision,
            signals,
            names,
            locals,
            processes,
            time: 0,
            next_cb: 0,
            callbacks: IntMap::new(),
            timers: BTreeMap::new(),
            edges: IntMap::new(),
            read_write: None,
            read_only: None,
            changes: Vec::new(),
            in_read_only: false,
            initialized: false,
        })
    }
}

/// View of the design handed to a process body.
pub struct ProcessCtx<'a> {
    signals: &'a [SignalSlot],
    locals: &'a HashMap<String, usize>,
    events: &'a [Change],
    writes: &'a mut Vec<(usize, u32)>,
}

impl<'a> ProcessCtx<'a> {
    fn handle(&self, name: &str) -> usize {
        match self.locals.get(name) {
            Some(handle) => *handle,
            None => panic!("Design has no signal {}", name),
        }
    }
    pub fn get(&self, name: &str) -> u32 {
        self.signals[self.handle(name)].value
    }
    pub fn set(&mut self, name: &str, value: u32) {
        let handle = self.handle(name);
        self.writes.push((handle, value));
    }
    pub fn rose(&self, name: &str) -> bool {
        self.edge(name, EdgeKind::Rising)
    }
    pub fn fell(&self, name: &str) -> bool {
        self.edge(name, EdgeKind::Falling)
    }
    pub fn changed(&self, name: &str) -> bool {
        let handle = self.handle(name);
        self.events.iter().any(|c| c.sig == handle)
    }
    fn edge(&self, name: &str, kind: EdgeKind) -> bool {
        let handle = self.handle(name);
        self.events.iter().any(|c| c.sig == handle && c.edge == kind)
    }
}

struct SignalSlot {
    name: String,
    width: u32,
    value: u32,
    param: bool,
}

struct Process {
    sensitivity: Vec<usize>,
    body: ProcessBody,
}

enum CbKind {
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

struct Change {
    sig: usize,
    edge: EdgeKind,
    // edge callback registered when the change happened
    watch: Option<usize>,
}

struct Kernel {
    precision: i8,
    signals: Vec<SignalSlot>,
    names: HashMap<String, usize>,
    locals: HashMap<String, usize>,
    processes: Vec<Process>,
    time: u64,
    next_cb: usize,
    callbacks: IntMap<CbKind>,
    timers: BTreeMap<u64, Vec<usize>>,
    edges: IntMap<usize>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    changes: Vec<Change>,
    in_read_only: bool,
    initialized: bool,
}

#[inline]
fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

impl Kernel {
    fn slot(&self, obj: &SimObject) -> SimpleResult<&SignalSlot> {
        self.signals
            .get(obj.handle)
            .ok_or_else(|| RstbErr::UnknownObject(format!("<handle {}>", obj.handle)))
    }

    fn apply(&mut self, sig: usize, value: u32) {
        let slot = &mut self.signals[sig];
        let value = value & mask(slot.width);
        if slot.value == value {
            return;
        }
        let edge = match (slot.value, value) {
            (0, _) => EdgeKind::Rising,
            (_, 0) => EdgeKind::Falling,
            _ => EdgeKind::Any,
        };
        slot.value = value;
        let watch = self.edges.get(sig as u64).copied();
        self.changes.push(Change { sig, edge, watch });
    }

    // Runs one delta of processes; None once the design is settled.
    fn evaluate_processes(&mut self) -> Option<Vec<Change>> {
        if self.initialized && self.changes.is_empty() {
            return None;
        }
        let init = !self.initialized;
        self.initialized = true;
        let events = std::mem::take(&mut self.changes);
        let mut writes = Vec::new();
        {
            let Kernel {
                signals,
                locals,
                processes,
                ..
            } = self;
            for process in processes.iter_mut() {
                let triggered = init
                    || process
                        .sensitivity
                        .iter()
                        .any(|s| events.iter().any(|e| e.sig == *s));
                if triggered {
                    let mut ctx = ProcessCtx {
                        signals: &signals[..],
                        locals,
                        events: &events,
                        writes: &mut writes,
                    };
                    (process.body)(&mut ctx);
                }
            }
        }
        for (sig, value) in writes {
            self.apply(sig, value);
        }
        Some(events)
    }

    fn take_due_timers(&mut self) -> bool {
        match self.timers.remove(&self.time) {
            Some(handles) => {
                for hdl in handles {
                    self.callbacks.remove(hdl as u64);
                }
                true
            }
            None => false,
        }
    }

    fn register(&mut self, cb: SimCallback) -> SimpleResult<usize> {
        let hdl = self.next_cb;
        let kind = match cb {
            SimCallback::Time(steps) => {
                let abs_time = self.time + steps;
                self.timers.entry(abs_time).or_default().push(hdl);
                CbKind::Time(abs_time)
            }
            SimCallback::Edge(sig) => {
                if sig == ROOT || sig >= self.signals.len() {
                    return Err(RstbErr::UnknownObject(format!("<handle {}>", sig)));
                }
                if let Some(old) = self.edges.remove(sig as u64) {
                    self.callbacks.remove(old as u64);
                }
                self.edges.insert(sig as u64, hdl);
                CbKind::Edge(sig)
            }
            SimCallback::ReadWrite => {
                if let Some(old) = self.read_write.replace(hdl) {
                    self.callbacks.remove(old as u64);
                }
                CbKind::ReadWrite
            }
            SimCallback::ReadOnly => {
                if let Some(old) = self.read_only.replace(hdl) {
                    self.callbacks.remove(old as u64);
                }
                CbKind::ReadOnly
            }
        };
        self.next_cb += 1;
        self.callbacks.insert(hdl as u64, kind);
        Ok(hdl)
    }

    fn cancel(&mut self, hdl: usize) -> SimpleResult<()> {
        match self.callbacks.remove(hdl as u64) {
            Some(CbKind::Time(abs_time)) => {
                if let Some(handles) = self.timers.get_mut(&abs_time) {
                    handles.retain(|h| *h != hdl);
                    if handles.is_empty() {
                        self.timers.remove(&abs_time);
                    }
                }
            }
            Some(CbKind::Edge(sig)) => {
                if self.edges.get(sig as u64) == Some(&hdl) {
                    self.edges.remove(sig as u64);
                }
            }
            Some(CbKind::ReadWrite) => {
                if self.read_write == Some(hdl) {
                    self.read_write = None;
                }
            }
            Some(CbKind::ReadOnly) => {
                if self.read_only == Some(hdl) {
                    self.read_only = None;
                }
            }
            None => return Err(RstbErr::UnknownCallback(hdl)),
        }
        Ok(())
    }
}

pub(crate) struct Native;

impl SimIf for Native {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimpleResult<()> {
        with_kernel(|k| {
            let slot = k.slot(obj)?;
            if obj.handle == ROOT || slot.param {
                return Err(RstbErr::Failed(format!("{} is not writable", slot.name)));
            }
            if k.in_read_only {
                return Err(RstbErr::Failed(format!(
                    "{} written in ReadOnly region",
                    slot.name
                )));
            }
            k.apply(obj.handle, value);
            Ok(())
        })?
    }
    fn get_value(&self, obj: &SimObject) -> SimpleResult<u32> {
        with_kernel(|k| {
            if obj.handle == ROOT {
                return Err(RstbErr::Failed("design scope has no value".to_string()));
            }
            Ok(k.slot(obj)?.value)
        })?
    }
    fn get_object_by_name(&self, name: &str) -> SimpleResult<SimObject> {
        with_kernel(|k| match k.names.get(name) {
            Some(&ROOT) => Ok(SimObject {
                handle: ROOT,
                kind: ObjectKind::Hier,
            }),
            Some(&handle) => Ok(SimObject {
                handle,
                kind: ObjectKind::Int(k.signals[handle].width),
            }),
            None => Err(RstbErr::UnknownObject(name.to_string())),
        })?
    }
    fn get_full_name(&self, obj: &SimObject) -> SimpleResult<String> {
        with_kernel(|k| {
            let root = &k.signals[ROOT].name;
            match obj.handle {
                ROOT => Ok(root.clone()),
                _ => Ok(format!("{}.{}", root, k.slot(obj)?.name)),
            }
        })?
    }
    fn get_root_object(&self) -> SimpleResult<SimObject> {
        with_kernel(|_| SimObject {
            handle: ROOT,
            kind: ObjectKind::Hier,
        })
    }
    fn get_sim_time_steps(&self) -> u64 {
        with_kernel(|k| k.time).unwrap_or(0)
    }
    fn get_sim_precision(&self) -> i8 {
        with_kernel(|k| k.precision).unwrap_or(-12)
    }
    fn log_at(&self, level: Level, msg: &str) {
        let ns = self.get_sim_time("ns").unwrap_or(0.0) as u64;
        log::log!(level, "{:>14}ns {}", ns.to_formatted_string(&Locale::en), msg);
    }
    fn register_callback(&self, cb: SimCallback) -> SimpleResult<usize> {
        with_kernel(|k| k.register(cb))?
    }
    fn cancel_callback(&self, cb_hdl: usize) -> SimpleResult<()> {
        with_kernel(|k| k.cancel(cb_hdl))?
    }
}

/// Elaborates `design`, runs `tests` one after another against it and returns their results.
///
/// The run ends when every test finished, when nothing is left to simulate or when
/// `config.max_sim_steps` is reached. Tests still running at that point are reported as
/// timed out.
pub fn run(design: Design, tests: Vec<Test>, config: &TbConfig) -> SimpleResult<SimReport> {
    logging::init(config.log_level);
    let kernel = design.elaborate()?;
    KERNEL.with(|k| *k.borrow_mut() = Some(kernel));

    let result = simulate(tests, config);

    // leave the thread clean for the next run
    trigger::cancel_all_triggers();
    executor::cancel_test_tasks();
    executor::clear_ready_queue();
    KERNEL.with(|k| k.borrow_mut().take());
    result
}

fn simulate(tests: Vec<Test>, config: &TbConfig) -> SimpleResult<SimReport> {
    crate::start_of_simulation(tests)?;

    let mut next_time = Some(0);
    while let Some(time) = next_time {
        if crate::all_tests_done() {
            break;
        }
        if config.max_sim_steps.map_or(false, |max| time > max) {
            SIM_IF.warn(&format!("Step limit reached before step {}", time));
            break;
        }
        with_kernel(|k| k.time = time)?;
        if let Err(e) = run_time_step(config.max_deltas) {
            crate::fail_test_with(e);
        }
        next_time = with_kernel(|k| k.timers.keys().next().copied())?;
    }
    if !crate::all_tests_done() && next_time.is_none() {
        SIM_IF.warn("Nothing left to simulate");
    }
    Ok(crate::end_of_simulation(config))
}

fn run_time_step(max_deltas: u32) -> SimpleResult<()> {
    let time = with_kernel(|k| k.time)?;
    let mut deltas = 0;
    loop {
        if with_kernel(|k| k.take_due_timers())? {
            trigger::react(SimCallback::Time(time), None);
        }
        // delta loop: processes, then value change callbacks, until nothing changes
        while let Some(events) = with_kernel(|k| k.evaluate_processes())? {
            deltas += 1;
            if deltas > max_deltas {
                with_kernel(|k| k.changes.clear())?;
                return Err(RstbErr::DeltaLimit {
                    time,
                    max: max_deltas,
                });
            }
            for change in events {
                let Some(hdl) = change.watch else {
                    continue;
                };
                if with_kernel(|k| k.callbacks.contains_key(hdl as u64))? {
                    trigger::react(SimCallback::Edge(change.sig), Some(change.edge));
                }
            }
        }
        let rw = with_kernel(|k| {
            k.read_write
                .take()
                .and_then(|hdl| k.callbacks.remove(hdl as u64))
        })?;
        if rw.is_some() {
            trigger::react(SimCallback::ReadWrite, None);
            continue;
        }
        // zero delay timers registered during this step
        if with_kernel(|k| k.timers.contains_key(&time))? {
            continue;
        }
        break;
    }

    let ro = with_kernel(|k| {
        k.in_read_only = true;
        k.read_only
            .take()
            .and_then(|hdl| k.callbacks.remove(hdl as u64))
    })?;
    if ro.is_some() {
        trigger::react(SimCallback::ReadOnly, None);
    }
    with_kernel(|k| k.in_read_only = false)
}
