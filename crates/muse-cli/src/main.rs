mod session;
mod session_file;

use anyhow::Result;
use clap::Parser;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use muse::conversation::Conversation;
use muse::detector::services::{
    AlphaVantageClient, ExchangeRateClient, NewsApiClient, OpenWeatherMapClient,
    DEFAULT_ALPHAVANTAGE_HOST, DEFAULT_EXCHANGERATE_HOST, DEFAULT_NEWSAPI_HOST,
    DEFAULT_OPENWEATHERMAP_HOST,
};
use muse::detector::{DetectorConfig, KeywordIntentDetector};
use muse::engine::Engine;
use muse::memory::{Embedder, InMemoryStore, MemoryService, MemoryStore, NoopEmbedder, SupabaseMemoryStore};
use muse::orchestrator::ModelOrchestrator;
use muse::providers::anthropic::AnthropicProvider;
use muse::providers::base::Provider;
use muse::providers::configs::{AnthropicProviderConfig, OpenAiCompatibleConfig};
use muse::providers::gemini::GeminiClient;
use muse::providers::openai::OpenAiCompatibleProvider;
use muse::tools::image::PollinationsGenerator;
use muse::tools::search::TavilyClient;
use muse::tools::Dispatcher;

use session::Session;
use session_file::{load_messages, session_path};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Session name; history is persisted under ~/.config/muse/sessions
    #[arg(short, long, default_value = "default")]
    session: String,

    /// Disable the pre-model intent detector
    #[arg(long)]
    no_detector: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = build_engine(cli.no_detector)?;

    let session_file = session_path(&cli.session)?;
    let conversation = Conversation::from_messages(load_messages(&session_file)?);

    Session::new(engine, conversation, session_file)
        .run()
        .await
}

fn build_engine(no_detector: bool) -> Result<Engine> {
    let primary = GeminiClient::from_env().ok().map(Arc::new);

    // Alternate order is quality/latency priority and must stay fixed.
    let mut alternates: Vec<Box<dyn Provider>> = Vec::new();
    if let Ok(key) = env::var("GROQ_API_KEY") {
        alternates.push(Box::new(OpenAiCompatibleProvider::new(
            OpenAiCompatibleConfig::groq(key),
        )?));
    }
    if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
        alternates.push(Box::new(AnthropicProvider::new(
            AnthropicProviderConfig::new(key),
        )?));
    }
    if let Ok(key) = env::var("OPENAI_API_KEY") {
        alternates.push(Box::new(OpenAiCompatibleProvider::new(
            OpenAiCompatibleConfig::openai(key),
        )?));
    }
    if let Ok(key) = env::var("DEEPSEEK_API_KEY") {
        alternates.push(Box::new(OpenAiCompatibleProvider::new(
            OpenAiCompatibleConfig::deepseek(key),
        )?));
    }
    let orchestrator = ModelOrchestrator::new(primary.clone(), alternates);

    let embedder: Arc<dyn Embedder> = match &primary {
        Some(client) => client.clone(),
        None => Arc::new(NoopEmbedder),
    };
    let store: Arc<dyn MemoryStore> = match SupabaseMemoryStore::from_env() {
        Ok(store) => Arc::new(store),
        Err(_) => Arc::new(InMemoryStore::new()),
    };
    let memory = Arc::new(MemoryService::new(embedder, store, whoami()));

    let search = TavilyClient::from_env().ok().map(Arc::new);
    let helper: Option<Arc<dyn Provider>> = env::var("GROQ_API_KEY")
        .ok()
        .and_then(|key| OpenAiCompatibleProvider::new(OpenAiCompatibleConfig::groq(key)).ok())
        .map(|p| Arc::new(p) as Arc<dyn Provider>);

    let mut dispatcher = Dispatcher::new();
    if let Some(search) = &search {
        dispatcher = dispatcher.with_search(search.clone());
    }
    if let Some(helper) = &helper {
        dispatcher = dispatcher.with_critic(helper.clone());
    }

    let mut engine = Engine::new(orchestrator, dispatcher, memory);

    if !no_detector {
        let mut detector = KeywordIntentDetector::new(
            DetectorConfig::default(),
            Arc::new(PollinationsGenerator::default()),
        );
        if let Some(search) = &search {
            detector = detector.with_search(search.clone());
        }
        if let Some(helper) = &helper {
            detector = detector.with_synthesizer(helper.clone());
        }
        if let Ok(key) = env::var("OPENWEATHER_API_KEY") {
            detector = detector.with_weather(Arc::new(OpenWeatherMapClient::new(
                DEFAULT_OPENWEATHERMAP_HOST.to_string(),
                key,
            )?));
        }
        if let Ok(key) = env::var("EXCHANGERATE_API_KEY") {
            detector = detector.with_currency(Arc::new(ExchangeRateClient::new(
                DEFAULT_EXCHANGERATE_HOST.to_string(),
                key,
            )?));
        }
        if let Ok(key) = env::var("NEWSAPI_API_KEY") {
            detector = detector.with_news(Arc::new(NewsApiClient::new(
                DEFAULT_NEWSAPI_HOST.to_string(),
                key,
            )?));
        }
        if let Ok(key) = env::var("ALPHAVANTAGE_API_KEY") {
            detector = detector.with_stocks(Arc::new(AlphaVantageClient::new(
                DEFAULT_ALPHAVANTAGE_HOST.to_string(),
                key,
            )?));
        }
        engine = engine.with_detector(Arc::new(detector));
    }

    Ok(engine)
}

fn whoami() -> String {
    env::var("USER").unwrap_or_else(|_| "local".to_string())
}
