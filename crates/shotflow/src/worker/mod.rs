pub mod pool;

pub use pool::{TaskHandle, WorkerPool};
