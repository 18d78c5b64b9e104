//! Task graph: named tasks, lazy dependency resolution, invocation records.

mod registry;
mod result;

pub use registry::{ActionError, Task, TaskAction, TaskError, TaskRegistry, NO_DEPS};
pub use result::{Invocation, TaskOutput, TaskRun};
