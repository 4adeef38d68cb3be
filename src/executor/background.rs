//! # Background Executor
//!
//! Fire-and-forget work off the request path. Submitted futures run on the
//! tokio runtime, at most `max_concurrent_tasks` at a time. Errors and panics
//! are logged and never reach the submitter.

use crate::config::ExecutorConfig;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct ExecutorCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Counters exposed for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExecutorStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub pending: usize,
}

#[derive(Debug)]
pub struct BackgroundExecutor {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    counters: Arc<ExecutorCounters>,
    shutting_down: AtomicBool,
    shutdown_timeout: Duration,
}

impl BackgroundExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        let permits = config.max_concurrent_tasks.max(1);
        debug!(max_concurrent_tasks = permits, "Background executor created");

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            tasks: Mutex::new(JoinSet::new()),
            counters: Arc::new(ExecutorCounters::default()),
            shutting_down: AtomicBool::new(false),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }

    /// Queue `work` for execution. Returns `false` once shutdown has begun.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F, E>(&self, task_name: &'static str, work: F) -> bool
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if self.shutting_down.load(Ordering::Acquire) {
            warn!(task = task_name, "Background executor shutting down, task rejected");
            return false;
        }

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let semaphore = Arc::clone(&self.semaphore);
        let counters = Arc::clone(&self.counters);

        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow with history
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                error!(task = task_name, "Executor semaphore closed, task dropped");
                counters.failed.fetch_add(1, Ordering::Relaxed);
                return;
            };

            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(())) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(task = task_name, "Background task completed");
                }
                Ok(Err(e)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(task = task_name, error = %e, "Background task failed");
                }
                Err(panic_error) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_error.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!(task = task_name, panic = %panic_msg, "Background task panicked");
                }
            }
        });

        true
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            pending: self.tasks.lock().len(),
        }
    }

    /// Stop accepting work and wait for queued tasks, aborting whatever is
    /// left after the configured timeout. Returns `true` if everything drained.
    pub async fn shutdown(&self) -> bool {
        self.shutting_down.store(true, Ordering::Release);
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let pending = tasks.len();

        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if drained {
            info!(pending = pending, "Background executor drained");
        } else {
            warn!(
                remaining = tasks.len(),
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Background executor shutdown timed out, aborting remaining tasks"
            );
            tasks.abort_all();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn executor(max_concurrent_tasks: usize) -> BackgroundExecutor {
        BackgroundExecutor::new(&ExecutorConfig {
            max_concurrent_tasks,
            shutdown_timeout_ms: 1000,
        })
    }

    #[tokio::test]
    async fn test_failures_are_contained() {
        let executor = executor(4);
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        executor.submit("ok", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });
        executor.submit("err", async { Err::<(), _>("boom") });
        executor.submit("panic", async {
            if true {
                panic!("task panicked");
            }
            Ok::<_, String>(())
        });

        assert!(executor.shutdown().await);
        let stats = executor.stats();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let executor = executor(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            executor.submit("bounded", async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(())
            });
        }

        assert!(executor.shutdown().await);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_rejected() {
        let executor = executor(1);
        executor.shutdown().await;
        assert!(!executor.submit("late", async { Ok::<_, String>(()) }));
    }

    #[tokio::test]
    async fn test_shutdown_timeout_aborts() {
        let executor = BackgroundExecutor::new(&ExecutorConfig {
            max_concurrent_tasks: 1,
            shutdown_timeout_ms: 20,
        });
        executor.submit("slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(())
        });

        assert!(!executor.shutdown().await);
    }
}
