use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::generator::AnalysisGenerator;
use super::store::TaskStore;
use super::task::{AnalysisTask, QueueStats, TaskStatus};
use crate::config::AnalysisConfig;
use crate::error::QueueError;

/// Clears the in-flight flag however processing ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Post-interview report queue with a single background worker.
///
/// One task is in flight at a time. The worker wakes on every enqueue and on
/// a fixed safety-net interval; ticks that land while a task is running are skipped.
#[derive(Clone)]
pub struct AnalysisQueue {
    store: Arc<dyn TaskStore>,
    generator: Arc<dyn AnalysisGenerator>,
    config: AnalysisConfig,
    processing: Arc<AtomicBool>,
    wake: Arc<Notify>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AnalysisQueue {
    pub fn new(
        store: Arc<dyn TaskStore>,
        generator: Arc<dyn AnalysisGenerator>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            processing: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a report for a session. Repeated calls create separate tasks.
    pub async fn enqueue(
        &self,
        session_id: &str,
        priority: Option<i32>,
    ) -> Result<AnalysisTask, QueueError> {
        let priority = priority.unwrap_or(self.config.default_priority);
        let task = AnalysisTask::new(session_id, priority, self.config.max_retries);

        self.store.insert(task.clone()).await?;
        info!(
            "Queued analysis task {} for session {} (priority={})",
            task.id, session_id, priority
        );

        self.wake.notify_one();
        Ok(task)
    }

    /// Run one worker tick: take the best PENDING task, if any, and process it.
    ///
    /// Returns the processed task, or None when idle or another tick is in flight.
    pub async fn process_pending(&self) -> Result<Option<AnalysisTask>, QueueError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Analysis worker busy, skipping tick");
            return Ok(None);
        }
        let _guard = ProcessingGuard(&self.processing);

        let Some(task) = self.store.next_pending().await? else {
            return Ok(None);
        };

        self.process_task(task).await.map(Some)
    }

    async fn process_task(&self, mut task: AnalysisTask) -> Result<AnalysisTask, QueueError> {
        task.status = TaskStatus::Processing;
        task.started_at = Some(Utc::now());
        self.store.update(&task).await?;

        info!(
            "Processing analysis task {} for session {} (attempt {})",
            task.id,
            task.session_id,
            task.retry_count + 1
        );

        match self.generator.analyze(&task.session_id).await {
            Ok(report_ref) => {
                task.status = TaskStatus::Completed;
                task.report_ref = Some(report_ref);
                task.error_message = None;
                task.completed_at = Some(Utc::now());
                info!("Analysis task {} completed", task.id);
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if task.retry_count < task.max_retries {
                    task.retry_count += 1;
                    task.status = TaskStatus::Pending;
                    warn!(
                        "Analysis task {} failed, will retry ({}/{}): {}",
                        task.id, task.retry_count, task.max_retries, message
                    );
                } else {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(Utc::now());
                    error!(
                        "Analysis task {} failed permanently after {} retries: {}",
                        task.id, task.retry_count, message
                    );
                }
                task.error_message = Some(message);
            }
        }

        self.store.update(&task).await?;
        Ok(task)
    }

    /// Reset the session's most recent FAILED task so the worker picks it up again
    pub async fn retry_failed_task(&self, session_id: &str) -> Result<AnalysisTask, QueueError> {
        let Some(mut task) = self.store.latest_failed(session_id).await? else {
            return Err(QueueError::NotFound(session_id.to_string()));
        };

        task.status = TaskStatus::Pending;
        task.retry_count = 0;
        task.error_message = None;
        task.started_at = None;
        task.completed_at = None;
        self.store.update(&task).await?;

        info!(
            "Analysis task {} for session {} reset for retry",
            task.id, session_id
        );
        self.wake.notify_one();
        Ok(task)
    }

    pub async fn get(&self, task_id: Uuid) -> Result<Option<AnalysisTask>, QueueError> {
        Ok(self.store.get(task_id).await?)
    }

    pub async fn latest_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<AnalysisTask>, QueueError> {
        Ok(self.store.latest_for_session(session_id).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            counts: self.store.count_by_status().await?,
            processing: self.is_processing(),
        })
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Spawn the background worker. Calling it again while running is a no-op.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let queue = self.clone();
        let interval = self.config.poll_interval();
        info!("Starting analysis worker (poll interval {:?})", interval);

        *worker = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = queue.wake.notified() => {}
                }

                // Drain ready tasks; a task sent back for retry waits for a later tick.
                loop {
                    match queue.process_pending().await {
                        Ok(Some(task)) if task.status != TaskStatus::Pending => continue,
                        Ok(_) => break,
                        Err(e) => {
                            error!("Analysis worker tick failed: {}", e);
                            break;
                        }
                    }
                }
            }
        }));
    }

    pub async fn stop(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.abort();
            info!("Analysis worker stopped");
        }
    }
}
