use crate::error::ExecutorError;
use crate::executor::worker::{ExecutorHandle, Task};
use tracing::{debug, trace};

/// Decides what happens to a task the executor cannot accept, either because
/// the queue is full or because the executor is shut down.
pub trait RejectionPolicy: Send + Sync {
    fn rejected(&self, task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError>;
}

impl<F> RejectionPolicy for F
where
    F: Fn(Task, &ExecutorHandle) -> Result<(), ExecutorError> + Send + Sync,
{
    fn rejected(&self, task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError> {
        self(task, executor)
    }
}

/// Fails the submission with [`ExecutorError::Rejected`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Abort;

impl RejectionPolicy for Abort {
    fn rejected(&self, _task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError> {
        if executor.is_shutdown() {
            return Err(ExecutorError::Shutdown(executor.name().to_string()));
        }
        Err(ExecutorError::Rejected(executor.name().to_string()))
    }
}

/// Runs the task on the submitting thread. Dropped after shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerRuns;

impl RejectionPolicy for CallerRuns {
    fn rejected(&self, task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError> {
        if executor.is_shutdown() {
            debug!("{}: discarding task submitted after shutdown", executor.name());
            return Ok(());
        }
        task();
        Ok(())
    }
}

/// Silently drops the task.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl RejectionPolicy for Discard {
    fn rejected(&self, _task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError> {
        trace!("{}: discarding rejected task", executor.name());
        Ok(())
    }
}

/// Drops the oldest queued task and retries the submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardOldest;

impl RejectionPolicy for DiscardOldest {
    fn rejected(&self, task: Task, executor: &ExecutorHandle) -> Result<(), ExecutorError> {
        if executor.is_shutdown() {
            return Ok(());
        }
        match executor.discard_oldest() {
            Some(_) => {
                trace!("{}: discarded oldest queued task", executor.name());
                executor.submit(task)
            }
            // Nothing queued to make room for, e.g. a zero-capacity queue.
            None => Ok(()),
        }
    }
}
