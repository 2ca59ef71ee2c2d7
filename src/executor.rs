use futures::future::{BoxFuture, FutureExt};
use futures::task::{waker_ref, ArcWake, Context, Poll};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::{
    cell::RefCell,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use crate::{RstbErr, RstbResult};

// Every simulation owns the thread it runs on, so the ready queue is per thread.
thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
    // tasks owned by the running test, cancelled together at teardown
    static TEST_TASKS: RefCell<Vec<Weak<Task>>> = RefCell::new(Vec::new());
}

pub fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        // unbounded queue, `add` can't fail
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    READY_QUEUE.with(|q| *q.borrow_mut() = Queue::new());
}

pub(crate) fn cancel_test_tasks() {
    let tasks = TEST_TASKS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    for task in tasks.iter().filter_map(Weak::upgrade) {
        task.cancel();
    }
}

/// Polls ready tasks until none is left.
#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if task.is_cancelled() {
        // do not execute if state is cancelled, will be dropped once all references disappear
        return;
    }

    let mut fut_slot = lock(&task.future);
    // woken by a trigger the task no longer waits for, after it already finished
    let Some(mut fut) = fut_slot.take() else {
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            // a task may cancel itself (fail_test) while being polled
            if !task.is_cancelled() {
                *fut_slot = Some(fut);
            }
        }
        Poll::Ready(result) => {
            drop(fut_slot);
            *lock(&task.state) = TaskState::Done;
            if let Some(tx) = lock(&task.join_tx).take() {
                let _ = tx.send(result);
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
enum TaskState {
    Pending,
    Done,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, RstbResult>>>,
    state: Mutex<TaskState>,
    name: String,
    join_tx: Mutex<Option<oneshot::Sender<RstbResult>>>,
}

impl Task {
    pub fn fork(future: impl Future<Output = RstbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future, "forked")
    }
    pub fn spawn_from_future(
        future: impl Future<Output = RstbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        TEST_TASKS.with(|t| {
            let mut t = t.borrow_mut();
            t.retain(|w| w.strong_count() > 0);
            t.push(Arc::downgrade(&task));
        });
        schedule_task(task);
        join_handle
    }
    // Not owned by any test: survives teardown (test chain).
    pub(crate) fn spawn_persistent(
        future: impl Future<Output = RstbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name);
        schedule_task(task);
        join_handle
    }
    fn new(fut: BoxFuture<'static, RstbResult>, name: &str) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<RstbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            awaited_task: Some(task.clone()),
            join_rx: rx,
        };
        (task, join_handle)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_cancelled(&self) -> bool {
        *lock(&self.state) == TaskState::Cancelled
    }
    pub fn is_done(&self) -> bool {
        *lock(&self.state) == TaskState::Done
    }
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.state);
            if *state == TaskState::Done {
                return;
            }
            *state = TaskState::Cancelled;
        }
        // dropping the sender resolves every JoinHandle awaiting this task
        lock(&self.join_tx).take();
        // the future is busy if the task cancels itself, process_task drops it afterwards
        if let Ok(mut slot) = self.future.try_lock() {
            slot.take();
        }
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<RstbResult>,
}

impl JoinHandle {
    pub fn get_task(&self) -> Option<&Arc<Task>> {
        self.awaited_task.as_ref()
    }
    pub fn cancel(mut self) {
        // take awaited_task, cancel it and drop its reference
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }
}

impl Future for JoinHandle {
    type Output = RstbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                let name = self
                    .awaited_task
                    .as_ref()
                    .map_or("<unknown>", |t| t.name())
                    .to_string();
                Poll::Ready(Err(RstbErr::Failed(format!("task {} was cancelled", name))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
