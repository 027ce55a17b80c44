use anyhow::Result;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::task::{AnalysisTask, TaskStatus};

/// Storage for analysis tasks.
///
/// The queue is the only writer. Durable engines plug in behind this trait;
/// the in-memory store keeps insertion order as the age tiebreak.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: AnalysisTask) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisTask>>;

    /// Highest priority, then oldest, PENDING task
    async fn next_pending(&self) -> Result<Option<AnalysisTask>>;

    async fn update(&self, task: &AnalysisTask) -> Result<()>;

    /// Most recently created task for a session, any status
    async fn latest_for_session(&self, session_id: &str) -> Result<Option<AnalysisTask>>;

    /// Most recently created FAILED task for a session
    async fn latest_failed(&self, session_id: &str) -> Result<Option<AnalysisTask>>;

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>>;
}

#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<Vec<AnalysisTask>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn latest_matching<F>(&self, predicate: F) -> Option<AnalysisTask>
    where
        F: Fn(&AnalysisTask) -> bool,
    {
        let tasks = self.tasks.read().await;
        tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| predicate(*task))
            .max_by_key(|(index, task)| (task.created_at, *index))
            .map(|(_, task)| task.clone())
    }
}

#[async_trait::async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: AnalysisTask) -> Result<()> {
        self.tasks.write().await.push(task);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisTask>> {
        let tasks = self.tasks.read().await;
        Ok(tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn next_pending(&self) -> Result<Option<AnalysisTask>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.status == TaskStatus::Pending)
            .max_by_key(|(index, task)| (task.priority, Reverse(task.created_at), Reverse(*index)))
            .map(|(_, task)| task.clone()))
    }

    async fn update(&self, task: &AnalysisTask) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) else {
            anyhow::bail!("analysis task {} does not exist", task.id);
        };
        *slot = task.clone();
        Ok(())
    }

    async fn latest_for_session(&self, session_id: &str) -> Result<Option<AnalysisTask>> {
        Ok(self
            .latest_matching(|task| task.session_id == session_id)
            .await)
    }

    async fn latest_failed(&self, session_id: &str) -> Result<Option<AnalysisTask>> {
        Ok(self
            .latest_matching(|task| {
                task.session_id == session_id && task.status == TaskStatus::Failed
            })
            .await)
    }

    async fn count_by_status(&self) -> Result<HashMap<TaskStatus, usize>> {
        let tasks = self.tasks.read().await;
        let mut counts = HashMap::new();
        for task in tasks.iter() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
