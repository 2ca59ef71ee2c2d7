use std::{
    cell::{Ref, RefCell, RefMut},
    rc::Rc,
    sync::{Arc, Mutex, MutexGuard},
};

/// Shared handle to a testbench component (expected queue, checker, scoreboard). Every task
/// holding a clone sees the same state.
pub struct RstbObj<T>(Rc<RefCell<T>>);

impl<T> RstbObj<T> {
    pub fn new(data: T) -> RstbObj<T> {
        RstbObj(Rc::new(RefCell::new(data)))
    }
    pub fn get(&self) -> Ref<T> {
        self.0.borrow()
    }
    pub fn get_mut(&self) -> RefMut<T> {
        self.0.borrow_mut()
    }
    /// Runs `f` on the state without handing out a guard that could outlive an await.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl<T> Clone for RstbObj<T> {
    fn clone(&self) -> Self {
        RstbObj(Rc::clone(&self.0))
    }
}

// Tasks are only ever polled on the thread running the simulation, so the Rc is never
// touched from two threads.
unsafe impl<T> Send for RstbObj<T> {}
unsafe impl<T> Sync for RstbObj<T> {}

/// Mutex backed handle for test records, which are read again after the run.
pub struct RstbObjSafe<T>(Arc<Mutex<T>>);

impl<T> RstbObjSafe<T> {
    pub fn new(data: T) -> RstbObjSafe<T> {
        RstbObjSafe(Arc::new(Mutex::new(data)))
    }
    pub fn get(&self) -> MutexGuard<T> {
        // poisoned only if a test panicked while holding the record
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get())
    }
}

impl<T> Clone for RstbObjSafe<T> {
    fn clone(&self) -> Self {
        RstbObjSafe(Arc::clone(&self.0))
    }
}
