#![deny(missing_docs)]
#![doc = "Task abstraction plus serial, thread and nested-safe process mappers with collect-all semantics."]

pub mod mapper;
pub mod process;
/// Tasks and closure adapters.
pub mod task;
pub mod worker;

pub use mapper::{AnyMapper, Mapper, SerialMapper, Slots, ThreadMapper};
pub use process::{
    is_pool_worker, pool_depth, ProcessPool, TerminationReason, WorkerCommand, POOL_DEPTH_ENV,
};
pub use task::{FnTask, Task};
pub use worker::{run_worker_main, serve, TaskRegistry};
