use clap::Parser;
use intervox::config::Config;
use intervox::interview::InterviewEngine;
use intervox::provider::llm::anthropic::AnthropicProvider;
use intervox::provider::llm::openai::OpenAiCompatible;
use intervox::provider::llm::LlmProvider;
use intervox::provider::registry::Registry;
use intervox::provider::stt::whisper::WhisperProvider;
use intervox::provider::stt::SttProvider;
use intervox::provider::tts::edgetts::EdgeTtsProvider;
use intervox::provider::tts::elevenlabs::ElevenLabsProvider;
use intervox::provider::tts::openai::OpenAiSpeech;
use intervox::provider::tts::TtsProvider;
use intervox::server::AppState;
use intervox::store::memory::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "intervox", version, about = "AI interviewer dialogue server")]
struct Cli {
    /// Configuration file (defaults to ~/.config/intervox/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address override
    #[arg(long)]
    host: Option<String>,

    /// Port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "intervox=info",
        1 => "intervox=debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_default(&config_path)?.with_env_overrides();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let client = intervox::provider::http_client(&config.limits)?;
    let request_timeout = Duration::from_secs(config.limits.request_timeout_secs);

    let mut llm: Registry<dyn LlmProvider> = Registry::new("llm");
    llm.register(Arc::new(OpenAiCompatible::openai(client.clone())));
    llm.register(Arc::new(OpenAiCompatible::deepseek(client.clone())));
    llm.register(Arc::new(OpenAiCompatible::gemini(client.clone())));
    llm.register(Arc::new(AnthropicProvider::new(client.clone())));

    let mut tts: Registry<dyn TtsProvider> = Registry::new("tts");
    tts.register(Arc::new(OpenAiSpeech::openai(client.clone())));
    tts.register(Arc::new(OpenAiSpeech::fishaudio(client.clone())));
    tts.register(Arc::new(ElevenLabsProvider::new(client.clone())));
    tts.register(Arc::new(EdgeTtsProvider::new()));

    let mut stt: Registry<dyn SttProvider> = Registry::new("stt");
    stt.register(Arc::new(WhisperProvider::new(client, request_timeout)));

    let engine = Arc::new(
        InterviewEngine::new(Arc::new(MemoryStore::new()), llm, tts, stt)
            .with_synthesis_concurrency(config.limits.synthesis_concurrency),
    );

    info!(version = %intervox::version_string(), "starting intervox");
    let state = AppState::new(engine, config.providers.clone());
    intervox::server::serve(&config.server, state, shutdown_signal()).await?;
    Ok(())
}
