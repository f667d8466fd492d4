//! Registry of long-running commands so they can be listed and cancelled.

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;
use tracing::{debug, info};

/// A command currently running under the registry.
#[derive(Debug, Clone)]
pub struct RunningTask {
    pub index: u64,
    pub name: String,
    pub started_at: DateTime<Utc>,
    handle: AbortHandle,
}

impl RunningTask {
    /// One-line description used by listings.
    #[must_use]
    pub fn describe(&self) -> String {
        format!(
            "{}: `{}`, invoked at {} UTC.",
            self.index,
            self.name,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[derive(Debug, Default)]
struct Registry {
    next_index: u64,
    tasks: Vec<RunningTask>,
}

/// Keeps a task listed while its [`TaskRegistry::run`] call is alive.
///
/// Dropping it unlists the task and aborts it if it is still running.
struct Registration {
    registry: TaskRegistry,
    index: u64,
    handle: AbortHandle,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.handle.abort();
        self.registry.registry().tasks.retain(|task| task.index != self.index);
    }
}

/// Tracks command tasks by index.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Runs `future` as a registered task until it finishes or is cancelled.
    ///
    /// Returns [`Error::Cancelled`] if the task was aborted.
    pub async fn run<F, T>(&self, name: &str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(future);
        let index = {
            let mut registry = self.registry();
            registry.next_index += 1;
            let index = registry.next_index;
            registry.tasks.push(RunningTask {
                index,
                name: name.to_string(),
                started_at: Utc::now(),
                handle: task.abort_handle(),
            });
            index
        };
        debug!("Registered task {index} for `{name}`");
        let registration = Registration {
            registry: self.clone(),
            index,
            handle: task.abort_handle(),
        };

        let outcome = task.await;
        drop(registration);

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::Command(format!("task `{name}` failed: {e}"))),
        }
    }

    /// Tasks still running, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<RunningTask> {
        self.registry().tasks.clone()
    }

    /// Aborts the task with `index`, or the newest task when `index` is -1.
    pub fn cancel(&self, index: i64) -> Option<RunningTask> {
        let task = {
            let mut registry = self.registry();
            let position = if index == -1 {
                registry.tasks.len().checked_sub(1)
            } else {
                registry
                    .tasks
                    .iter()
                    .position(|task| i64::try_from(task.index).is_ok_and(|i| i == index))
            }?;
            registry.tasks.remove(position)
        };

        task.handle.abort();
        info!("Cancelled task {}: `{}`", task.index, task.name);
        Some(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_tasks(registry: &TaskRegistry, count: usize) {
        while registry.list().len() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_finished_tasks_leave_the_registry() -> Result<()> {
        let registry = TaskRegistry::new();
        let value = registry.run("ping", async { Ok(5) }).await?;
        assert_eq!(value, 5);
        assert!(registry.list().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_by_index_and_last() {
        let registry = TaskRegistry::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        };

        let first = tokio::spawn({
            let registry = registry.clone();
            async move { registry.run("shell", slow()).await }
        });
        wait_for_tasks(&registry, 1).await;
        let second = tokio::spawn({
            let registry = registry.clone();
            async move { registry.run("repl", slow()).await }
        });
        wait_for_tasks(&registry, 2).await;

        let listed = registry.list();
        assert_eq!(listed[0].index, 1);
        assert!(listed[1].describe().starts_with("2: `repl`, invoked at "));

        assert_eq!(registry.cancel(-1).map(|task| task.name), Some("repl".to_string()));
        assert_eq!(registry.cancel(1).map(|task| task.name), Some("shell".to_string()));
        assert!(registry.cancel(7).is_none());

        assert!(matches!(second.await.expect("join"), Err(Error::Cancelled)));
        assert!(matches!(first.await.expect("join"), Err(Error::Cancelled)));
        assert!(registry.cancel(-1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_run_unlists_and_stops_its_task() {
        let registry = TaskRegistry::new();
        let (finished_tx, mut finished_rx) = tokio::sync::oneshot::channel::<()>();
        let waiting = tokio::spawn({
            let registry = registry.clone();
            async move {
                registry
                    .run("shell", async move {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        let _ = finished_tx.send(());
                        Ok(())
                    })
                    .await
            }
        });
        wait_for_tasks(&registry, 1).await;

        waiting.abort();
        assert!(waiting.await.expect_err("aborted").is_cancelled());
        assert!(registry.list().is_empty());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(finished_rx.try_recv().is_err());
    }
}
