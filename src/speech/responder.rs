use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::session::{Session, Utterance};

/// What the responder gets to see besides the candidate's latest utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderContext {
    pub user_id: Option<String>,
    pub job_position: Option<String>,
    pub background: Option<String>,

    /// Transcript so far, oldest first
    pub transcript: Vec<Utterance>,
}

impl ResponderContext {
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.meta.user_id.clone(),
            job_position: session.meta.job_position.clone(),
            background: session.meta.background.clone(),
            transcript: session.transcript.clone(),
        }
    }
}

/// Language-model port producing the interviewer's next line
#[async_trait::async_trait]
pub trait ConversationalResponder: Send + Sync {
    async fn respond(
        &self,
        session_id: &str,
        text: &str,
        context: &ResponderContext,
    ) -> Result<String>;
}
