use serde::{Deserialize, Serialize};

/// Participant and job metadata supplied when a client joins a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Candidate identifier, if the client knows it
    pub user_id: Option<String>,

    /// Position being interviewed for (used in the opening line and as responder context)
    pub job_position: Option<String>,

    /// Free-form candidate background
    pub background: Option<String>,
}

impl SessionMeta {
    /// Overlay the fields a later join supplies.
    ///
    /// Absent fields keep their value, so a reconnect without metadata does not
    /// erase what the first join supplied.
    pub fn merge(&mut self, other: SessionMeta) {
        if other.user_id.is_some() {
            self.user_id = other.user_id;
        }
        if other.job_position.is_some() {
            self.job_position = other.job_position;
        }
        if other.background.is_some() {
            self.background = other.background;
        }
    }
}
