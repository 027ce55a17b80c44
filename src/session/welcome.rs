use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Last opening utterance sent for a session
#[derive(Debug, Clone)]
struct WelcomeRecord {
    hash: String,
    expires_at: Instant,
}

/// Hash + TTL record of recently sent opening utterances.
///
/// Lives beside the registry map rather than inside a session entry, so a
/// session that is purged and recreated inside the cooldown still sees it.
/// Best-effort at-most-once: a race that outlasts the cooldown can send twice.
#[derive(Clone)]
pub struct WelcomeDedup {
    records: Arc<Mutex<HashMap<String, WelcomeRecord>>>,
    cooldown: Duration,
}

impl WelcomeDedup {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
        }
    }

    pub fn hash_text(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Whether an unexpired record with this hash exists. Expired records are dropped.
    pub async fn is_recent(&self, session_id: &str, hash: &str) -> bool {
        let mut records = self.records.lock().await;

        match records.get(session_id) {
            None => false,
            Some(record) if record.expires_at <= Instant::now() => {
                records.remove(session_id);
                false
            }
            Some(record) => record.hash == hash,
        }
    }

    pub async fn record(&self, session_id: &str, hash: String) {
        let mut records = self.records.lock().await;
        records.insert(
            session_id.to_string(),
            WelcomeRecord {
                hash,
                expires_at: Instant::now() + self.cooldown,
            },
        );
    }
}
