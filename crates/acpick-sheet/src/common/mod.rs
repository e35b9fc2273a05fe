//! Shared building blocks for the sheet reducer and runtime.

mod task;

pub use task::{TaskCompleted, TaskId, TaskKind, TaskSeq, TaskState, Tasks};
