use aimian_realtime::{
    create_router, AnalysisQueue, AppState, AudioIngest, ClientSideSynthesizer, Config,
    InMemoryTaskStore, IngestConfig, NatsAnalysisGenerator, NatsClient, NatsRecognizer,
    NatsResponder, NatsSynthesizer, Outbox, RealtimeGateway, SessionRegistry, SpeechSynthesizer,
    TtsMode, VoicePipeline,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "aimian-realtime", about = "Realtime voice interview service")]
struct Args {
    /// Config file path (extension optional)
    #[arg(short, long, default_value = "config/aimian-realtime")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    info!("Aimian Realtime v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = NatsClient::connect(&cfg.nats.url, cfg.nats.request_timeout()).await?;

    let synthesizer: Arc<dyn SpeechSynthesizer> = match cfg.realtime.tts_mode {
        TtsMode::Server => Arc::new(NatsSynthesizer::new(
            nats.clone(),
            &cfg.nats.synthesizer_subject,
        )),
        TtsMode::Client => Arc::new(ClientSideSynthesizer::new(Duration::from_millis(
            cfg.realtime.client_speech_ms_per_char,
        ))),
    };
    info!("TTS mode: {:?}", cfg.realtime.tts_mode);

    let registry = SessionRegistry::new(
        cfg.realtime.session_retention(),
        cfg.realtime.welcome_cooldown(),
    );
    let outbox = Outbox::new();
    let pipeline = VoicePipeline::new(
        registry.clone(),
        outbox.clone(),
        Arc::new(NatsResponder::new(nats.clone(), &cfg.nats.responder_subject)),
        synthesizer,
        &cfg.realtime,
    );
    let ingest = AudioIngest::new(
        Arc::new(NatsRecognizer::new(nats.clone())),
        pipeline.clone(),
        IngestConfig {
            sample_rate: cfg.realtime.sample_rate,
            local_vad: cfg.realtime.local_vad,
        },
    );
    let queue = AnalysisQueue::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(NatsAnalysisGenerator::new(
            nats.clone(),
            &cfg.nats.analysis_subject,
        )),
        cfg.analysis.clone(),
    );
    queue.start().await;

    let gateway = RealtimeGateway::new(registry, outbox, pipeline, ingest, queue.clone());
    let app = create_router(AppState::new(gateway));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    queue.stop().await;
    nats.close().await?;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
