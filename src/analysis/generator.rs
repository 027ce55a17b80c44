use anyhow::Result;

/// External scorer that turns a finished interview into a competency report
#[async_trait::async_trait]
pub trait AnalysisGenerator: Send + Sync {
    /// Generate the report for a session and return a reference to it
    async fn analyze(&self, session_id: &str) -> Result<String>;
}
