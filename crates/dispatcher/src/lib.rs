//! 回收单状态机调度
//!
//! 工作队列、状态处理器、搬迁引擎，以及把它们组合起来的调度器与控制器。

pub mod controller;
pub mod dispatcher;
pub mod handlers;
pub mod task;
pub mod transit;
pub mod work_queue;

pub use controller::OrderController;
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use handlers::{remediation_owner, standard_registry};
pub use task::{HandlerDeps, HandlerRegistry, Requeue, StateHandler, Task, TaskContext};
pub use transit::{default_strategy_table, TransitEngine, TransitStrategy};
pub use work_queue::WorkQueue;
