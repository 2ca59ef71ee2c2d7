use crate::signal;
use crate::sim_if::SIM_IF;
use crate::RstbResult;
use futures::future::BoxFuture;
use std::fmt;
use std::time;

pub type TestFn = fn(signal::SimObject) -> BoxFuture<'static, RstbResult>;

pub struct Test {
    pub name: String,
    pub generator: TestFn,
    pub result: Option<RstbResult>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
    started: Option<(time::Instant, f64)>,
}

impl Test {
    pub fn new(name: &str, generator: TestFn) -> Self {
        Self {
            name: name.to_string(),
            generator,
            result: None,
            time_secs: 0.0,
            sim_time_ns: 0.0,
            started: None,
        }
    }
    pub(crate) fn start(&mut self) {
        let sim_time = SIM_IF.get_sim_time("ns").unwrap_or(0.0);
        self.started = Some((time::Instant::now(), sim_time));
    }
    pub(crate) fn finish(&mut self, result: RstbResult) {
        if let Some((wall, sim)) = self.started.take() {
            self.time_secs = wall.elapsed().as_secs_f64();
            self.sim_time_ns = SIM_IF.get_sim_time("ns").unwrap_or(sim) - sim;
        }
        self.result = Some(result);
    }
    pub(crate) fn report(&self) -> TestReport {
        TestReport {
            name: self.name.clone(),
            // finish() has run for every test by the time a report is built
            result: self.result.clone().unwrap_or(Ok(crate::value::Val::None)),
            time_secs: self.time_secs,
            sim_time_ns: self.sim_time_ns,
        }
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("result", &self.result)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub result: RstbResult,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

/// Outcome of one `native::run`.
#[derive(Debug, Clone)]
pub struct SimReport {
    pub tests: Vec<TestReport>,
    pub sim_time_ns: f64,
    pub real_time_secs: f64,
}

impl SimReport {
    pub fn passed(&self) -> bool {
        self.tests.iter().all(|t| t.result.is_ok())
    }
    /// "name: error" for every failed test.
    pub fn failures(&self) -> Vec<String> {
        self.tests
            .iter()
            .filter_map(|t| match &t.result {
                Ok(_) => None,
                Err(e) => Some(format!("{}: {}", t.name, e)),
            })
            .collect()
    }
    pub fn result(&self, name: &str) -> Option<&RstbResult> {
        self.tests.iter().find(|t| t.name == name).map(|t| &t.result)
    }
}
