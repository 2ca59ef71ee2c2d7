use crate::expected::Expected;
use crate::prelude::*;
use std::fmt;

/*
 * CHECKER
 */
/// Ordered comparison of one interface: every observed transaction must equal the oldest
/// prediction. Any violation fails the running test at once.
pub struct Checker<T>(RstbObj<CheckerInner<T>>);

struct CheckerInner<T> {
    interface: String,
    expected: Expected<T>,
    received: u32,
    matched: u32,
}

impl<T> Clone for Checker<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: PartialEq + fmt::Debug + Clone> Checker<T> {
    pub fn check(&self, actual: T) -> SimpleResult<()> {
        let result = self.0.with_mut(|c| {
            c.received += 1;
            match c.expected.pop() {
                None => Err(RstbErr::Starvation {
                    interface: c.interface.clone(),
                    actual: format!("{:?}", actual),
                }),
                Some(expected) if expected != actual => Err(RstbErr::Mismatch {
                    interface: c.interface.clone(),
                    expected: format!("{:?}", expected),
                    actual: format!("{:?}", actual),
                }),
                Some(_) => {
                    c.matched += 1;
                    Ok(())
                }
            }
        });
        if let Err(e) = &result {
            fail_test_with(e.clone());
        }
        result
    }
}

trait CheckerStatus {
    fn interface(&self) -> String;
    fn received(&self) -> u32;
    fn matched(&self) -> u32;
    fn outstanding(&self) -> Vec<String>;
}

impl<T: fmt::Debug + Clone> CheckerStatus for Checker<T> {
    fn interface(&self) -> String {
        self.0.get().interface.clone()
    }
    fn received(&self) -> u32 {
        self.0.get().received
    }
    fn matched(&self) -> u32 {
        self.0.get().matched
    }
    fn outstanding(&self) -> Vec<String> {
        self.0
            .get()
            .expected
            .outstanding()
            .iter()
            .map(|t| format!("{:?}", t))
            .collect()
    }
}

/*
 * SCOREBOARD
 */
/// All checkers of a testbench. `finish` is the end-of-test verdict.
#[derive(Clone)]
pub struct Scoreboard(RstbObj<Vec<Box<dyn CheckerStatus>>>);

impl Scoreboard {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(RstbObj::new(Vec::new()))
    }

    pub fn checker<T>(&self, expected: Expected<T>) -> Checker<T>
    where
        T: PartialEq + fmt::Debug + Clone + 'static,
    {
        let checker = Checker(RstbObj::new(CheckerInner {
            interface: expected.interface(),
            expected,
            received: 0,
            matched: 0,
        }));
        self.0.get_mut().push(Box::new(checker.clone()));
        checker
    }

    /// Fails if any interface still expects transactions that were never observed.
    pub fn finish(&self) -> RstbResult {
        for checker in self.0.get().iter() {
            let pending = checker.outstanding();
            if !pending.is_empty() {
                return Err(RstbErr::Leftover {
                    interface: checker.interface(),
                    count: pending.len(),
                    pending: format!("[{}]", pending.join(", ")),
                });
            }
        }
        Ok(Val::String(self.result_str()))
    }

    pub fn result_str(&self) -> String {
        self.0
            .get()
            .iter()
            .map(|c| {
                format!(
                    "{}: received={}, matched={}",
                    c.interface(),
                    c.received(),
                    c.matched()
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}
