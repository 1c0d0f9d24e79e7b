use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::WorkerError;

struct QueuedTask {
    label: String,
    future: BoxFuture<'static, ()>,
    done: oneshot::Sender<()>,
}

/// Completion handle returned by [`WorkerPool::submit`].
#[derive(Debug)]
pub struct TaskHandle {
    label: String,
    done: oneshot::Receiver<()>,
}

impl TaskHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Waits until the task has run to completion.
    ///
    /// Fails with [`WorkerError::TaskAborted`] if the task panicked or was
    /// dropped from the queue without running.
    pub async fn join(self) -> Result<(), WorkerError> {
        self.done
            .await
            .map_err(|_| WorkerError::TaskAborted(self.label))
    }
}

/// Fixed set of tokio workers pulling boxed futures from one unbounded queue.
///
/// A task occupies its worker until it returns, so long polling loops pin
/// workers and queue everything behind them once all workers are busy.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedTask>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    worker_count: usize,
}

impl WorkerPool {
    /// Spawns `worker_count` workers on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0 or if called outside a tokio runtime.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedTask>();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers = (0..worker_count)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, Arc::clone(&receiver))))
            .collect();

        info!("Started {} workers", worker_count);

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            shutdown,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Enqueues `future` and returns immediately.
    pub fn submit<F>(&self, label: impl Into<String>, future: F) -> Result<TaskHandle, WorkerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        let label = label.into();
        let (done_tx, done_rx) = oneshot::channel();
        let task = QueuedTask {
            label: label.clone(),
            future: future.boxed(),
            done: done_tx,
        };

        let sender = lock(&self.sender);
        let sender = sender.as_ref().ok_or(WorkerError::ChannelClosed)?;
        sender.send(task).map_err(|_| WorkerError::ChannelClosed)?;

        debug!("Queued task {}", label);

        Ok(TaskHandle {
            label,
            done: done_rx,
        })
    }

    /// Stops accepting tasks. Tasks already queued still run.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
        lock(&self.sender).take();
    }

    /// Waits for the queue to drain and every worker to exit.
    ///
    /// Only returns after [`WorkerPool::shutdown`] has been called.
    pub async fn wait(&self) {
        let workers: Vec<JoinHandle<()>> = lock(&self.workers).drain(..).collect();

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!("Worker {} terminated abnormally: {}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<QueuedTask>>>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(task) = next else {
            debug!("Worker {} queue closed", worker_id);
            break;
        };

        debug!("Worker {} running task {}", worker_id, task.label);

        match AssertUnwindSafe(task.future).catch_unwind().await {
            Ok(()) => {
                let _ = task.done.send(());
            }
            Err(_) => {
                error!("Worker {} task {} panicked", worker_id, task.label);
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_pool_creation() {
        let pool = WorkerPool::new(2);
        assert!(!pool.is_shutdown());
        assert_eq!(pool.worker_count(), 2);

        pool.shutdown();
        assert!(pool.is_shutdown());

        pool.wait().await;
    }

    #[tokio::test]
    async fn test_submit_runs_task() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let handle = pool
            .submit("increment", async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        handle.join().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_returns_before_task_finishes() {
        let pool = WorkerPool::new(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let handle = pool
            .submit("blocked", async move {
                let _ = release_rx.await;
            })
            .unwrap();

        release_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1);

        let bad = pool.submit("bad", async { panic!("boom") }).unwrap();
        assert!(matches!(bad.join().await, Err(WorkerError::TaskAborted(label)) if label == "bad"));

        let good = pool.submit("good", async {}).unwrap();
        good.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(1);
        pool.shutdown();
        assert!(matches!(
            pool.submit("late", async {}),
            Err(WorkerError::ChannelClosed)
        ));
        pool.wait().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let pool = WorkerPool::new(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let c = Arc::clone(&counter);
            pool.submit("count", async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        pool.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }
}
