//! Application loops: connect, publish, consume, shut down.

pub mod connect;
pub mod publisher;
pub mod shutdown;
pub mod worker_loop;

pub use connect::{Backoff, ConnectionManager};
pub use publisher::{MessageSource, PublishLoop, Publisher};
pub use shutdown::{ShutdownController, ShutdownSignal};
pub use worker_loop::{Handler, Worker, WorkerGroup};
