use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retention below this is clamped up; short windows purge sessions during ordinary reconnects.
const MIN_SESSION_RETENTION_SECS: u64 = 30;
const MIN_WELCOME_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub realtime: RealtimeConfig,
    pub analysis: AnalysisConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "aimian-realtime".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// Where assistant speech is synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsMode {
    /// Server calls the synthesizer and ships an audio reference
    Server,
    /// Client speaks the text itself
    #[default]
    Client,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// How long a session with no connections is kept before purging
    pub session_retention_secs: u64,

    /// Window in which an identical opening utterance is suppressed
    pub welcome_cooldown_secs: u64,

    /// Promote the latest partial to a final transcript on VAD end
    pub infer_final_on_vad_end: bool,

    /// Run the energy VAD on inbound PCM instead of relying on the recognizer
    pub local_vad: bool,

    pub tts_mode: TtsMode,

    /// Playback estimate for client-side speech (per character of text)
    pub client_speech_ms_per_char: u64,

    /// PCM sample rate the clients stream at
    pub sample_rate: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            session_retention_secs: 120,
            welcome_cooldown_secs: 300,
            infer_final_on_vad_end: true,
            local_vad: false,
            tts_mode: TtsMode::Client,
            client_speech_ms_per_char: 180,
            sample_rate: 16000,
        }
    }
}

impl RealtimeConfig {
    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs.max(MIN_SESSION_RETENTION_SECS))
    }

    pub fn welcome_cooldown(&self) -> Duration {
        Duration::from_secs(self.welcome_cooldown_secs.max(MIN_WELCOME_COOLDOWN_SECS))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub default_priority: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_retries: 3,
            default_priority: 0,
        }
    }
}

impl AnalysisConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub request_timeout_secs: u64,
    pub responder_subject: String,
    pub synthesizer_subject: String,
    pub analysis_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            request_timeout_secs: 30,
            responder_subject: "llm.respond".to_string(),
            synthesizer_subject: "tts.synthesize".to_string(),
            analysis_subject: "analysis.generate".to_string(),
        }
    }
}

impl NatsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Config {
    /// Load from a TOML file (extension optional), then overlay `AIMIAN__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("AIMIAN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
