// Voice activity detection
//
// `VadState` is the per-session view kept by the registry and driven by
// recognizer VAD events. `EnergyVad` is a local fallback detector for
// recognizers that do not report voice activity: it classifies 16-bit PCM
// frames by RMS level and turns runs of speech / silence into begin / end
// events. All durations are measured from the audio itself (sample count and
// rate), so the detector behaves the same regardless of delivery jitter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::recognizer::RecognizerEvent;

/// Voice activity as last reported for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VadState {
    #[default]
    Idle,
    Speaking,
    Silence,
}

/// Floor for RMS so log10 stays finite
const MIN_RMS: f32 = 1e-10;

/// Configuration for the energy detector
#[derive(Debug, Clone)]
pub struct EnergyVadConfig {
    /// Frames louder than this count as speech
    pub threshold_db: f32,
    /// Speech must last this long before it is reported (filters clicks)
    pub min_speech: Duration,
    /// Trailing silence that ends an utterance
    pub silence: Duration,
    /// Utterances are cut off after this long
    pub max_speech: Duration,
    pub sample_rate: u32,
}

impl Default for EnergyVadConfig {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            min_speech: Duration::from_millis(500),
            silence: Duration::from_millis(2000),
            max_speech: Duration::from_secs(60),
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Loud frames seen, not yet long enough to count
    Onset,
    Speech,
}

/// RMS energy voice activity detector
#[derive(Debug)]
pub struct EnergyVad {
    config: EnergyVadConfig,
    phase: Phase,
    /// Audio time consumed so far
    position_ms: u64,
    speech_start_ms: u64,
    silence_start_ms: Option<u64>,
}

impl EnergyVad {
    pub fn new(config: EnergyVadConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            position_ms: 0,
            speech_start_ms: 0,
            silence_start_ms: None,
        }
    }

    /// Analyze one PCM frame, returning `VadBegin` / `VadEnd` on a transition
    pub fn analyze(&mut self, pcm: &[u8]) -> Option<RecognizerEvent> {
        let sample_count = (pcm.len() / 2) as u64;
        if sample_count == 0 || self.config.sample_rate == 0 {
            return None;
        }

        let start = self.position_ms;
        let end = start + sample_count * 1000 / u64::from(self.config.sample_rate);
        self.position_ms = end;

        let is_speech = level_db(pcm) > self.config.threshold_db;
        let min_speech = self.config.min_speech.as_millis() as u64;

        match self.phase {
            Phase::Idle => {
                if is_speech {
                    self.speech_start_ms = start;
                    self.silence_start_ms = None;
                    self.phase = Phase::Onset;
                    if end - start >= min_speech {
                        self.phase = Phase::Speech;
                        return Some(RecognizerEvent::VadBegin);
                    }
                }
                None
            }

            Phase::Onset => {
                if !is_speech {
                    debug!("VAD false trigger at {}ms", start);
                    self.phase = Phase::Idle;
                    return None;
                }
                if end - self.speech_start_ms >= min_speech {
                    self.phase = Phase::Speech;
                    return Some(RecognizerEvent::VadBegin);
                }
                None
            }

            Phase::Speech => {
                if is_speech {
                    self.silence_start_ms = None;
                    if end - self.speech_start_ms >= self.config.max_speech.as_millis() as u64 {
                        debug!("VAD max utterance length reached at {}ms", end);
                        self.phase = Phase::Idle;
                        return Some(RecognizerEvent::VadEnd);
                    }
                    return None;
                }

                let silence_start = *self.silence_start_ms.get_or_insert(start);
                if end - silence_start >= self.config.silence.as_millis() as u64 {
                    self.phase = Phase::Idle;
                    self.silence_start_ms = None;
                    return Some(RecognizerEvent::VadEnd);
                }
                None
            }
        }
    }
}

/// Level of a 16-bit little-endian PCM frame in dBFS
pub fn level_db(pcm: &[u8]) -> f32 {
    let samples = pcm.len() / 2;
    if samples == 0 {
        return 20.0 * MIN_RMS.log10();
    }

    let sum: f64 = pcm
        .chunks_exact(2)
        .map(|pair| {
            let normalized = f64::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0;
            normalized * normalized
        })
        .sum();

    let rms = ((sum / samples as f64).sqrt() as f32).max(MIN_RMS);
    20.0 * rms.log10()
}
