pub mod bus;
pub mod config;
mod error;
mod executor;
pub mod expected;
mod junit;
pub mod logging;
pub mod native;
pub mod prelude;
mod rstb_obj;
pub mod sampler;
pub mod scoreboard;
mod signal;
pub mod sim_if;
mod test;
pub mod testbench;
mod trigger;
pub mod uart;
pub mod utils;
mod value;

use executor::Task;
use prettytable::{Cell, Row, Table};
use rstb_obj::RstbObjSafe;
use sim_if::SIM_IF;
use std::cell::{Cell as StdCell, RefCell};
use std::sync::Arc;
use std::time;
use value::Val;

pub use config::TbConfig;
pub use error::RstbErr;
pub use test::{SimReport, Test, TestReport};

pub type SimpleResult<T> = Result<T, RstbErr>;
pub type RstbResult = Result<Val, RstbErr>;

// one simulation per thread
thread_local! {
    static SIM_START_TIME: StdCell<Option<time::Instant>> = StdCell::new(None);
    static TESTS: RefCell<Vec<RstbObjSafe<Test>>> = RefCell::new(Vec::new());
    static CURRENT_TEST: RefCell<Option<(Arc<Task>, RstbObjSafe<Test>)>> = RefCell::new(None);
}

/// Passes the running test, unless it already passed or failed.
pub fn pass_test(msg: &str) {
    if let Some((task, test)) = CURRENT_TEST.with(|c| c.borrow_mut().take()) {
        test.with_mut(|t| t.finish(Ok(Val::String(msg.to_string()))));
        tear_down_test(task);
    }
}

/// Fails the running test, unless it already passed or failed.
pub fn fail_test(msg: &str) {
    fail_test_with(RstbErr::Failed(msg.to_string()))
}

/// Fails the running test with `err` and tears it down right away: every task it spawned is
/// cancelled and every pending trigger dropped. The calling task runs on until its next
/// await point and is then discarded.
pub fn fail_test_with(err: RstbErr) {
    if let Some((task, test)) = CURRENT_TEST.with(|c| c.borrow_mut().take()) {
        SIM_IF.error(&format!("{} failed: {}", test.get().name, err));
        test.with_mut(|t| t.finish(Err(err)));
        tear_down_test(task);
    }
}

fn tear_down_test(test: Arc<Task>) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    executor::cancel_test_tasks();
    test.cancel();
}

pub(crate) fn all_tests_done() -> bool {
    TESTS.with(|tests| tests.borrow().iter().all(|t| t.get().result.is_some()))
}

pub(crate) fn start_of_simulation(tests: Vec<Test>) -> SimpleResult<()> {
    SIM_START_TIME.with(|t| t.set(Some(time::Instant::now())));
    let sim_root = signal::SimObject::get_root()?;

    let tests: Vec<_> = tests.into_iter().map(RstbObjSafe::new).collect();
    TESTS.with(|t| *t.borrow_mut() = tests.clone());

    // All tests are scheduled in a chain at simulation start up by awaiting the previous test completion.
    // Wrapping logic handles test results, timers, etc.
    let mut join_handle = None;
    for test in tests {
        let name = test.get().name.clone();
        join_handle = Some(Task::spawn_persistent(
            async move {
                // await previous test, if there is one, and give the host one step to settle
                if let Some(handle) = join_handle {
                    let _ = handle.await;
                    trigger::Trigger::timer_steps(1).await;
                }
                // spawn next test
                let record = test.clone();
                let test_handle = Task::spawn_from_future(
                    async move {
                        let generator = record.get().generator;
                        // await test execution
                        match (generator)(sim_root).await {
                            Ok(val) => pass_test(&val.to_string()),
                            Err(err) => fail_test_with(err),
                        }
                        Ok(Val::None)
                    },
                    &name,
                );
                // set current test handle
                if let Some(test_task) = test_handle.get_task().cloned() {
                    test.with_mut(|t| t.start());
                    SIM_IF.log(&format!("Starting test {}", name));
                    CURRENT_TEST.with(|c| *c.borrow_mut() = Some((test_task, test)));
                }
                // await test execution
                let _ = test_handle.await;
                Ok(Val::None)
            },
            "test chain",
        ));
    }

    // execute first simulation tick
    executor::run_once();
    Ok(())
}

pub(crate) fn end_of_simulation(config: &TbConfig) -> SimReport {
    let real_time_secs = SIM_START_TIME
        .with(|t| t.take())
        .map_or(0.0, |start| start.elapsed().as_secs_f64());
    let sim_time_ns = SIM_IF.get_sim_time("ns").unwrap_or(0.0);
    let steps = SIM_IF.get_sim_time_steps();

    // whatever is still running did not finish in time
    CURRENT_TEST.with(|c| c.borrow_mut().take());
    let tests = TESTS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    for test in tests.iter() {
        test.with_mut(|t| {
            if t.result.is_none() {
                t.finish(Err(RstbErr::Timeout {
                    what: format!("test {} to finish", t.name),
                    steps,
                }));
            }
        });
    }
    let report = SimReport {
        tests: tests.iter().map(|t| t.get().report()).collect(),
        sim_time_ns,
        real_time_secs,
    };

    if config.summary {
        print_summary(&report);
    }
    if let Some(path) = &config.results_xml {
        if let Err(e) = junit::write_junit_xml(&report, &config.suite_name, path) {
            SIM_IF.error(&format!("Can't write {}: {}", path.display(), e));
        }
    }
    report
}

fn print_summary(report: &SimReport) {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("Test"),
        Cell::new("Result"),
        Cell::new("Time (s)"),
        Cell::new("Sim time (ns)"),
        Cell::new("Speed (ns/s)"),
    ]));
    for test in report.tests.iter() {
        let result = match &test.result {
            Ok(_) => "passed".to_string(),
            Err(e) => format!("FAILED: {}", e),
        };
        table.add_row(Row::new(vec![
            Cell::new(&test.name),
            Cell::new(&result),
            Cell::new(&format!("{:.3}", test.time_secs)),
            Cell::new(&format!("{:.0}", test.sim_time_ns)),
            Cell::new(&format!("{:.0}", test.sim_time_ns / test.time_secs.max(1e-9))),
        ]));
    }
    table.printstd();
    SIM_IF.log(&format!(
        "TOTAL: {} passed, {} failed, sim time {:.0} ns, real time {:.3} s",
        report.tests.iter().filter(|t| t.result.is_ok()).count(),
        report.tests.iter().filter(|t| t.result.is_err()).count(),
        report.sim_time_ns,
        report.real_time_secs
    ));
}
