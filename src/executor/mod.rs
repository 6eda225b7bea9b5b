//! Bounded single-thread executor for asynchronous pool maintenance.

pub mod policy;
pub mod worker;

pub use policy::{Abort, CallerRuns, Discard, DiscardOldest, RejectionPolicy};
pub use worker::{
    DEFAULT_KEEP_ALIVE, DEFAULT_QUEUE_CAPACITY, ExecutorBuilder, ExecutorHandle, Task,
    ThreadFactory, provision,
};
