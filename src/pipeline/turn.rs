use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Turn engine state for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnState {
    /// No client has joined yet
    #[default]
    Idle,
    /// Waiting for the candidate
    Listening,
    /// Responder call in flight
    Thinking,
    /// Assistant reply being synthesized or played
    Speaking,
}

/// Per-session turn bookkeeping.
///
/// `generation` changes whenever a turn starts or is interrupted. A port result
/// is applied only if the generation it was started under is still current.
#[derive(Debug, Default)]
pub struct TurnTracker {
    pub state: TurnState,
    pub generation: u64,

    /// Latest interim transcript since the last final
    pub pending_partial: Option<String>,

    /// Returns the session to listening when playback should be over
    playback: Option<JoinHandle<()>>,
}

impl TurnTracker {
    /// Whether a final transcript may start a new turn now
    pub fn accepts_final(&self) -> bool {
        matches!(self.state, TurnState::Idle | TurnState::Listening)
    }

    /// Enter THINKING for a new turn and return its generation
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.state = TurnState::Thinking;
        self.pending_partial = None;
        self.cancel_playback();
        self.generation
    }

    pub fn is_current(&self, generation: u64, state: TurnState) -> bool {
        self.generation == generation && self.state == state
    }

    /// Leave SPEAKING early. Bumps the generation so in-flight synthesis is discarded.
    pub fn interrupt(&mut self) -> bool {
        if self.state != TurnState::Speaking {
            return false;
        }
        self.generation += 1;
        self.state = TurnState::Listening;
        self.cancel_playback();
        true
    }

    /// True once a reply has been delivered and is playing
    pub fn playback_armed(&self) -> bool {
        self.playback.is_some()
    }

    pub fn set_playback(&mut self, timer: JoinHandle<()>) {
        self.cancel_playback();
        self.playback = Some(timer);
    }

    /// Forget the playback timer without aborting it (used from inside the timer)
    pub fn clear_playback(&mut self) {
        self.playback = None;
    }

    pub fn cancel_playback(&mut self) {
        if let Some(timer) = self.playback.take() {
            timer.abort();
        }
    }
}
