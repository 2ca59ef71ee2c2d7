//! Expected-transaction queue shared by one reference model and one checker.
//!
//! The newest prediction stays *tentative* until the model predicts again or the checker pops
//! it. A tentative entry can be amended (reset pre-empting a prediction made one tick early) or,
//! if it was only an idle fill, retracted. Everything behind it is *committed* and is consumed
//! strictly in order.

use crate::rstb_obj::RstbObj;
use std::collections::VecDeque;
use std::fmt;

struct Tentative<T> {
    value: T,
    fill: bool,
}

struct ExpectedInner<T> {
    interface: String,
    committed: VecDeque<T>,
    tentative: Option<Tentative<T>>,
}

impl<T> ExpectedInner<T> {
    fn commit(&mut self) {
        if let Some(t) = self.tentative.take() {
            self.committed.push_back(t.value);
        }
    }
}

/// Creates the queue of `interface`, seeded with `seed` as a tentative fill so the first
/// observation (usually taken in reset) has something to match.
pub fn expected_queue<T>(interface: &str, seed: T) -> (Predictor<T>, Expected<T>) {
    let inner = RstbObj::new(ExpectedInner {
        interface: interface.to_string(),
        committed: VecDeque::new(),
        tentative: Some(Tentative {
            value: seed,
            fill: true,
        }),
    });
    (Predictor(inner.clone()), Expected(inner))
}

/// Producer half, owned by the reference model.
pub struct Predictor<T>(RstbObj<ExpectedInner<T>>);

impl<T> Predictor<T> {
    pub fn interface(&self) -> String {
        self.0.get().interface.clone()
    }
    /// Commits the current tentative entry and makes `value` the new one.
    pub fn predict(&self, value: T) {
        self.set_tentative(value, false)
    }
    /// Like `predict`, for idle/reset values expected while nothing happens.
    pub fn predict_fill(&self, value: T) {
        self.set_tentative(value, true)
    }
    fn set_tentative(&self, value: T, fill: bool) {
        self.0.with_mut(|q| {
            q.commit();
            q.tentative = Some(Tentative { value, fill });
        })
    }
    /// Replaces the value of the tentative entry. False if there is none.
    pub fn amend(&self, value: T) -> bool {
        self.0.with_mut(|q| match q.tentative.as_mut() {
            Some(t) => {
                t.value = value;
                true
            }
            None => false,
        })
    }
    /// Commits the tentative entry, then appends `value` as committed.
    pub fn push(&self, value: T) {
        self.0.with_mut(|q| {
            q.commit();
            q.committed.push_back(value);
        })
    }
    /// Removes the tentative entry if it is a fill.
    pub fn retract_fill(&self) -> Option<T> {
        self.0.with_mut(|q| match q.tentative.take() {
            Some(t) if t.fill => Some(t.value),
            other => {
                q.tentative = other;
                None
            }
        })
    }
    pub fn committed_len(&self) -> usize {
        self.0.get().committed.len()
    }
}

/// Consumer half, owned by the checker.
pub struct Expected<T>(RstbObj<ExpectedInner<T>>);

impl<T> Expected<T> {
    pub fn interface(&self) -> String {
        self.0.get().interface.clone()
    }
    pub fn pop(&self) -> Option<T> {
        self.0.with_mut(|q| {
            q.committed
                .pop_front()
                .or_else(|| q.tentative.take().map(|t| t.value))
        })
    }
    pub fn len(&self) -> usize {
        let q = self.0.get();
        q.committed.len() + q.tentative.is_some() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Expected<T> {
    /// Predictions that must have been observed by the end of a test. A trailing tentative fill
    /// only predicts that the line stays idle and does not count.
    pub fn outstanding(&self) -> Vec<T> {
        let q = self.0.get();
        let mut pending: Vec<T> = q.committed.iter().cloned().collect();
        if let Some(t) = q.tentative.as_ref().filter(|t| !t.fill) {
            pending.push(t.value.clone());
        }
        pending
    }
}

impl<T: fmt::Debug> fmt::Debug for Expected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.0.get();
        f.debug_struct("Expected")
            .field("interface", &q.interface)
            .field("committed", &q.committed)
            .field("tentative", &q.tentative.as_ref().map(|t| &t.value))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seed_is_popped_first() {
        let (_, exp) = expected_queue("o_rx", 0);
        assert_eq!(exp.len(), 1);
        assert_eq!(exp.outstanding(), Vec::<i32>::new());
        assert_eq!(exp.pop(), Some(0));
        assert_eq!(exp.pop(), None);
    }

    #[test]
    fn predictions_commit_in_order() {
        let (pred, exp) = expected_queue("o_tx", 0);
        pred.predict(1);
        pred.predict(2);
        assert_eq!(exp.len(), 3);
        assert_eq!(exp.pop(), Some(0));
        assert_eq!(exp.pop(), Some(1));
        assert_eq!(exp.pop(), Some(2));
        assert!(exp.is_empty());
    }

    #[test]
    fn amend_replaces_only_the_tentative_entry() {
        let (pred, exp) = expected_queue("o_tx", 0);
        pred.predict(5);
        assert!(pred.amend(7));
        assert_eq!(exp.pop(), Some(0));
        assert_eq!(exp.pop(), Some(7));
        assert!(!pred.amend(9));
        pred.push(9);
        assert_eq!(exp.pop(), Some(9));
    }

    #[test]
    fn retract_only_takes_fills() {
        let (pred, exp) = expected_queue("o_rx", 0);
        assert_eq!(pred.retract_fill(), Some(0));
        assert_eq!(pred.retract_fill(), None);
        pred.predict(3);
        assert_eq!(pred.retract_fill(), None);
        assert_eq!(exp.pop(), Some(3));
    }

    #[test]
    fn trailing_fill_is_not_outstanding() {
        let (pred, exp) = expected_queue("o_tx", 0);
        pred.push(1);
        pred.predict_fill(2);
        assert_eq!(exp.outstanding(), vec![0, 1]);
        assert_eq!(pred.committed_len(), 2);
        pred.predict(3);
        assert_eq!(exp.outstanding(), vec![0, 1, 2, 3]);
    }
}
