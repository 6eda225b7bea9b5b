use crate::error::ExecutorError;
use crate::executor::policy::{Abort, RejectionPolicy};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, trace};

/// Unit of maintenance work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Produces the thread builder for a worker with the given name.
pub type ThreadFactory = Arc<dyn Fn(&str) -> thread::Builder + Send + Sync>;

/// Idle time after which the worker thread exits.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Provisions a single-worker executor with a bounded queue.
///
/// The worker is started by the first submission, exits after
/// [`DEFAULT_KEEP_ALIVE`] without work and is started again on demand.
pub fn provision(
    queue_capacity: usize,
    thread_name_prefix: &str,
    rejection_policy: impl RejectionPolicy + 'static,
) -> ExecutorHandle {
    ExecutorBuilder::new(thread_name_prefix)
        .queue_capacity(queue_capacity)
        .rejection_policy(rejection_policy)
        .build()
}

pub struct ExecutorBuilder {
    name: String,
    queue_capacity: usize,
    keep_alive: Duration,
    policy: Arc<dyn RejectionPolicy>,
    thread_factory: Option<ThreadFactory>,
}

impl ExecutorBuilder {
    pub fn new(thread_name_prefix: impl Into<String>) -> Self {
        Self {
            name: thread_name_prefix.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            policy: Arc::new(Abort),
            thread_factory: None,
        }
    }

    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn rejection_policy(mut self, policy: impl RejectionPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn thread_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str) -> thread::Builder + Send + Sync + 'static,
    {
        self.thread_factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> ExecutorHandle {
        ExecutorHandle {
            shared: Arc::new(Shared {
                name: self.name,
                capacity: self.queue_capacity,
                keep_alive: self.keep_alive,
                policy: self.policy,
                thread_factory: self.thread_factory,
                state: Mutex::new(State::default()),
                available: Condvar::new(),
                terminated: Condvar::new(),
            }),
        }
    }
}

#[derive(Default)]
struct State {
    queue: VecDeque<Task>,
    worker_alive: bool,
    busy: bool,
    shutdown: bool,
    spawned: u64,
}

struct Shared {
    name: String,
    capacity: usize,
    keep_alive: Duration,
    policy: Arc<dyn RejectionPolicy>,
    thread_factory: Option<ThreadFactory>,
    state: Mutex<State>,
    available: Condvar,
    terminated: Condvar,
}

impl Shared {
    // Tasks run outside the lock and panics are caught, so poisoning is not
    // expected; recover the guard if it happens anyway.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn thread_name(&self, spawned: u64) -> String {
        match spawned {
            0 => self.name.clone(),
            n => format!("{}-{}", self.name, n),
        }
    }

    fn builder(&self, name: &str) -> thread::Builder {
        match &self.thread_factory {
            Some(factory) => factory(name),
            None => thread::Builder::new().name(name.to_string()),
        }
    }

    fn run_task(&self, task: Task) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("{}: maintenance task panicked: {}", self.name, reason);
        }
    }

    /// Blocks until a task is queued. `None` tells the worker to exit, either
    /// on shutdown with an empty queue or after `keep_alive` without work.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.lock();
        state.busy = false;
        let deadline = Instant::now() + self.keep_alive;
        loop {
            if let Some(task) = state.queue.pop_front() {
                state.busy = true;
                return Some(task);
            }
            if state.shutdown {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                trace!("{}: idle for {:?}, reclaiming worker", self.name, self.keep_alive);
                break;
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        state.worker_alive = false;
        if state.shutdown {
            self.terminated.notify_all();
        }
        None
    }
}

fn run_worker(shared: Arc<Shared>, first: Task) {
    let mut next = Some(first);
    while let Some(task) = next.take() {
        shared.run_task(task);
        next = shared.next_task();
    }
}

/// Handle to the bounded maintenance executor. Dropping it shuts the executor
/// down; queued work still drains on the worker thread.
pub struct ExecutorHandle {
    shared: Arc<Shared>,
}

impl ExecutorHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn execute<F>(&self, f: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(f))
    }

    /// Hands `task` to the worker, starting it if needed, or queues it. A full
    /// queue or a shut-down executor defers to the rejection policy.
    pub fn submit(&self, task: Task) -> Result<(), ExecutorError> {
        let mut state = self.shared.lock();
        if state.shutdown {
            drop(state);
            return self.shared.policy.rejected(task, self);
        }

        if !state.worker_alive {
            let name = self.shared.thread_name(state.spawned);
            let shared = self.shared.clone();
            self.shared
                .builder(&name)
                .spawn(move || run_worker(shared, task))?;
            trace!("{}: started worker thread {}", self.shared.name, name);
            state.spawned += 1;
            state.worker_alive = true;
            state.busy = true;
            return Ok(());
        }

        if state.queue.len() < self.shared.capacity {
            state.queue.push_back(task);
            self.shared.available.notify_one();
            return Ok(());
        }

        drop(state);
        self.shared.policy.rejected(task, self)
    }

    /// Removes the oldest queued task.
    pub fn discard_oldest(&self) -> Option<Task> {
        self.shared.lock().queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn has_worker(&self) -> bool {
        self.shared.lock().worker_alive
    }

    pub fn is_busy(&self) -> bool {
        self.shared.lock().busy
    }

    /// Number of worker threads started so far.
    pub fn spawned_workers(&self) -> u64 {
        self.shared.lock().spawned
    }

    /// Stops accepting work. Already queued tasks still run.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if !state.shutdown {
            trace!("{}: shutting down", self.shared.name);
            state.shutdown = true;
        }
        self.shared.available.notify_all();
        if !state.worker_alive {
            self.shared.terminated.notify_all();
        }
    }

    /// Stops accepting work and returns the tasks that never started.
    pub fn shutdown_now(&self) -> Vec<Task> {
        let mut state = self.shared.lock();
        state.shutdown = true;
        let pending: Vec<Task> = state.queue.drain(..).collect();
        self.shared.available.notify_all();
        if !state.worker_alive {
            self.shared.terminated.notify_all();
        }
        pending
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    pub fn is_terminated(&self) -> bool {
        let state = self.shared.lock();
        state.shutdown && !state.worker_alive
    }

    /// Waits up to `timeout` for the worker to finish after shutdown.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while !(state.shutdown && !state.worker_alive) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .shared
                .terminated
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        true
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
