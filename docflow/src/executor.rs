//! Concurrent execution of document-level work.
//!
//! Plugins use this to fan out per-document work (per-URL fetches, batch
//! uploads) without owning pool lifecycle themselves. The engine's stage
//! loop never parallelizes; concurrency is opt-in and lives here.

use crate::errors::DocflowError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// How work is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// In-order, in-task execution.
    Sequential,
    /// A bounded pool of concurrent tasks.
    #[default]
    Thread,
    /// Accepted for configuration compatibility; dispatches to the same
    /// bounded task pool (closures cannot be shipped to forked processes).
    Process,
}

/// A handle to one submitted task.
#[derive(Debug)]
pub struct TaskHandle<R> {
    inner: HandleInner<R>,
}

#[derive(Debug)]
enum HandleInner<R> {
    Ready(Result<R, DocflowError>),
    Spawned(JoinHandle<Result<R, DocflowError>>),
}

impl<R> TaskHandle<R> {
    fn ready(result: Result<R, DocflowError>) -> Self {
        Self {
            inner: HandleInner::Ready(result),
        }
    }

    fn spawned(handle: JoinHandle<Result<R, DocflowError>>) -> Self {
        Self {
            inner: HandleInner::Spawned(handle),
        }
    }

    /// Returns true once the task outcome is available.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            HandleInner::Ready(_) => true,
            HandleInner::Spawned(handle) => handle.is_finished(),
        }
    }

    /// Waits for and returns the task outcome.
    pub async fn join(self) -> Result<R, DocflowError> {
        match self.inner {
            HandleInner::Ready(result) => result,
            HandleInner::Spawned(handle) => handle
                .await
                .unwrap_or_else(|error| Err(DocflowError::Executor(format!(
                    "worker task failed: {error}"
                )))),
        }
    }
}

/// Bounded executor for mapping work over items or submitting single
/// tasks.
///
/// The pool is created lazily on first use and must be shut down to
/// reject further work; repeated shutdown is a no-op. `map` always
/// returns results aligned to input order, in every mode.
#[derive(Debug)]
pub struct ConcurrentExecutor {
    mode: ExecutionMode,
    workers: usize,
    pool: OnceLock<Arc<Semaphore>>,
    shut_down: AtomicBool,
}

impl ConcurrentExecutor {
    /// Creates an executor with the given worker count and mode.
    #[must_use]
    pub fn new(workers: usize, mode: ExecutionMode) -> Self {
        Self {
            mode,
            workers: workers.max(1),
            pool: OnceLock::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Creates a sequential executor.
    #[must_use]
    pub fn sequential() -> Self {
        Self::new(1, ExecutionMode::Sequential)
    }

    /// Returns the configured mode.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn is_pooled(&self) -> bool {
        matches!(self.mode, ExecutionMode::Thread | ExecutionMode::Process)
    }

    fn pool(&self) -> Arc<Semaphore> {
        self.pool
            .get_or_init(|| {
                if self.mode == ExecutionMode::Process {
                    tracing::warn!(
                        workers = self.workers,
                        "Process execution is not available, using the task pool"
                    );
                }
                Arc::new(Semaphore::new(self.workers))
            })
            .clone()
    }

    /// Applies `func` to each item, returning results in input order.
    ///
    /// Sequential mode applies items one after another in the calling
    /// task; pooled modes run up to `workers` items concurrently and
    /// block until all complete. Each output slot carries that item's
    /// outcome.
    pub async fn map<T, R, F, Fut>(&self, func: F, items: Vec<T>) -> Vec<Result<R, DocflowError>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DocflowError>> + Send + 'static,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            return items
                .into_iter()
                .map(|_| Err(DocflowError::Executor("executor is shut down".to_string())))
                .collect();
        }

        if !self.is_pooled() {
            let mut results = Vec::with_capacity(items.len());
            for item in items {
                results.push(func(item).await);
            }
            return results;
        }

        let pool = self.pool();
        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let pool = pool.clone();
                let func = func.clone();
                tokio::spawn(async move {
                    let _permit = pool.acquire_owned().await.map_err(|_| {
                        DocflowError::Executor("executor is shut down".to_string())
                    })?;
                    func(item).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(error) => Err(DocflowError::Executor(format!(
                    "worker task failed: {error}"
                ))),
            });
        }
        results
    }

    /// Schedules one task.
    ///
    /// Sequential mode executes eagerly and returns a resolved handle;
    /// pooled modes return a handle resolved when the pool runs the task.
    pub async fn submit<R, Fut>(&self, task: Fut) -> TaskHandle<R>
    where
        R: Send + 'static,
        Fut: Future<Output = Result<R, DocflowError>> + Send + 'static,
    {
        if self.shut_down.load(Ordering::SeqCst) {
            return TaskHandle::ready(Err(DocflowError::Executor(
                "executor is shut down".to_string(),
            )));
        }

        if !self.is_pooled() {
            return TaskHandle::ready(task.await);
        }

        let pool = self.pool();
        TaskHandle::spawned(tokio::spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|_| DocflowError::Executor("executor is shut down".to_string()))?;
            task.await
        }))
    }

    /// Shuts the executor down, rejecting further work.
    ///
    /// With `wait`, in-flight tasks are drained first. Repeated shutdown
    /// is a no-op.
    pub async fn shutdown(&self, wait: bool) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.is_pooled() {
            return;
        }

        let pool = self.pool();
        if wait {
            let permits = u32::try_from(self.workers).unwrap_or(u32::MAX);
            // Holding every permit means no task is still running.
            let drained = pool.acquire_many(permits).await;
            pool.close();
            drop(drained);
        } else {
            pool.close();
        }
    }

    /// Returns true once the executor has been shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    async fn double(n: usize) -> Result<usize, DocflowError> {
        // Later items finish first, exercising the ordering guarantee.
        tokio::time::sleep(Duration::from_millis((20 - n as u64) % 20)).await;
        Ok(n * 2)
    }

    #[tokio::test]
    async fn test_sequential_map_preserves_order() {
        let executor = ConcurrentExecutor::sequential();
        let results = executor.map(double, (0..5).collect()).await;

        let values: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn test_pooled_map_preserves_order() {
        let executor = ConcurrentExecutor::new(2, ExecutionMode::Thread);
        let results = executor.map(double, (0..8).collect()).await;

        let values: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[tokio::test]
    async fn test_process_mode_falls_back_to_pool() {
        let executor = ConcurrentExecutor::new(4, ExecutionMode::Process);
        let results = executor.map(double, (0..4).collect()).await;
        assert!(results.into_iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_map_carries_per_item_errors() {
        let executor = ConcurrentExecutor::new(2, ExecutionMode::Thread);
        let results = executor
            .map(
                |n: usize| async move {
                    if n == 2 {
                        Err(DocflowError::Internal("bad item".to_string()))
                    } else {
                        Ok(n)
                    }
                },
                (0..4).collect(),
            )
            .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
        assert!(results[3].is_ok());
    }

    #[tokio::test]
    async fn test_sequential_submit_is_eager() {
        let executor = ConcurrentExecutor::sequential();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();

        let handle = executor
            .submit(async move {
                ran_clone.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await;

        // Resolved before join in sequential mode.
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
        assert_eq!(handle.join().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_pooled_submit_resolves_on_join() {
        let executor = ConcurrentExecutor::new(2, ExecutionMode::Thread);
        let handle = executor.submit(async { Ok("done") }).await;
        assert_eq!(handle.join().await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_submit_error_outcome() {
        let executor = ConcurrentExecutor::sequential();
        let handle: TaskHandle<()> = executor
            .submit(async { Err(DocflowError::Internal("boom".to_string())) })
            .await;
        assert!(handle.join().await.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let executor = ConcurrentExecutor::new(2, ExecutionMode::Thread);
        executor.shutdown(true).await;
        assert!(executor.is_shut_down());

        let results = executor.map(double, (0..3).collect()).await;
        assert!(results.iter().all(Result::is_err));

        let handle: TaskHandle<usize> = executor.submit(async { Ok(1) }).await;
        assert!(handle.join().await.is_err());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_is_noop() {
        let executor = ConcurrentExecutor::new(2, ExecutionMode::Thread);
        executor.shutdown(true).await;
        executor.shutdown(false).await;
        executor.shutdown(true).await;
        assert!(executor.is_shut_down());
    }

    #[tokio::test]
    async fn test_sequential_shutdown_is_noop() {
        let executor = ConcurrentExecutor::sequential();
        executor.shutdown(true).await;
        assert!(executor.is_shut_down());
    }
}
