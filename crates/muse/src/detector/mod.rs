//! Deterministic pre-model intent gate.
//!
//! Before any model call, a turn is offered to the detector. If a cheap
//! keyword heuristic plus a live-data service can fully answer it (weather,
//! currency, stocks, news, image requests, plain lookups), the model is
//! skipped for that turn entirely. Anything uncertain falls through by
//! returning `None`; the detector never degrades a turn, it only
//! short-circuits the easy ones.

pub mod cache;
pub mod extract;
pub mod services;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::providers::base::{CompletionRequest, Provider};
use crate::tools::image::ImageGenerator;
use crate::tools::payload::{with_payload, ResultPayload, SearchResult};
use crate::tools::search::SearchClient;
use crate::tools::SEARCH_RESULT_LIMIT;

use self::cache::{CacheKind, SearchCache};
use self::extract::{
    clean_search_query, extract_city, extract_currency_conversion, extract_news_query,
    extract_stock_symbol,
};
use self::services::{CurrencyService, NewsService, StockService, WeatherService};

lazy_static! {
    static ref IMAGE_PROMPT_RE: Regex = Regex::new(
        r"(?i)^(?:please\s+)?(?:generate|create|make|draw|genera|crea|dibuja)(?:me)?\s+(?:an?\s+|una?\s+)?(?:image|picture|drawing|imagen|dibujo|foto)\s*(?:of|de)?\s*(.*)$"
    )
    .unwrap();
}

const STOCK_KEYWORDS: &[&str] = &[
    "stock",
    "share price",
    "ticker",
    "quote for",
    "acciones",
    "cotización",
    "cotizacion",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "busca",
    "buscar",
    "search",
    "what is",
    "what's",
    "cuál es",
    "cual es",
    "how much",
    "the price of",
    "el precio de",
    "who is",
    "quién es",
    "quien es",
    "latest",
];

/// Contract consumed by the pipeline: a non-`None` return fully satisfies
/// the turn.
#[async_trait]
pub trait IntentDetector: Send + Sync {
    async fn try_handle(&self, text: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub auto_search_enabled: bool,
    pub cache_enabled: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            auto_search_enabled: true,
            cache_enabled: true,
        }
    }
}

/// Keyword-driven detector. Intents are checked in a fixed priority order:
/// currency, image, weather, stock, news, then general search.
pub struct KeywordIntentDetector {
    config: DetectorConfig,
    cache: Mutex<SearchCache>,
    images: Arc<dyn ImageGenerator>,
    search: Option<Arc<dyn SearchClient>>,
    synthesizer: Option<Arc<dyn Provider>>,
    weather: Option<Arc<dyn WeatherService>>,
    currency: Option<Arc<dyn CurrencyService>>,
    news: Option<Arc<dyn NewsService>>,
    stocks: Option<Arc<dyn StockService>>,
}

impl KeywordIntentDetector {
    pub fn new(config: DetectorConfig, images: Arc<dyn ImageGenerator>) -> Self {
        KeywordIntentDetector {
            config,
            cache: Mutex::new(SearchCache::default()),
            images,
            search: None,
            synthesizer: None,
            weather: None,
            currency: None,
            news: None,
            stocks: None,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    /// Provider used to phrase raw search results conversationally.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Provider>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherService>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn with_currency(mut self, currency: Arc<dyn CurrencyService>) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_news(mut self, news: Arc<dyn NewsService>) -> Self {
        self.news = Some(news);
        self
    }

    pub fn with_stocks(mut self, stocks: Arc<dyn StockService>) -> Self {
        self.stocks = Some(stocks);
        self
    }

    fn cached(&self, kind: CacheKind, query: &str) -> Option<String> {
        if !self.config.cache_enabled {
            return None;
        }
        self.cache.lock().ok()?.get(kind, query)
    }

    fn store(&self, kind: CacheKind, query: &str, value: &str) {
        if !self.config.cache_enabled {
            return;
        }
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(kind, query, value.to_string());
        }
    }

    async fn handle_currency(&self, amount: f64, from: &str, to: &str) -> Option<String> {
        let service = self.currency.as_ref()?;
        let key = format!("{} {} {}", amount, from, to);
        if let Some(hit) = self.cached(CacheKind::Currency, &key) {
            return Some(hit);
        }

        let conversion = match service.convert(amount, from, to).await {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "currency conversion failed, deferring to model");
                return None;
            }
        };

        let text = format!(
            "{} {} = {:.2} {} (rate {:.4})",
            conversion.amount, conversion.from, conversion.result, conversion.to, conversion.rate
        );
        let result = with_payload(&text, &ResultPayload::Currency { conversion });
        self.store(CacheKind::Currency, &key, &result);
        Some(result)
    }

    fn handle_image(&self, prompt: &str) -> Option<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        let url = self.images.image_url(prompt, "1:1");
        let text = format!(
            "Here is the image you requested.\n\n![Generated image]({})",
            url
        );
        Some(with_payload(
            &text,
            &ResultPayload::Image {
                url: url.clone(),
                prompt: prompt.to_string(),
                aspect_ratio: "1:1".to_string(),
                review: None,
            },
        ))
    }

    async fn handle_weather(&self, city: &str) -> Option<String> {
        let service = self.weather.as_ref()?;
        if let Some(hit) = self.cached(CacheKind::Weather, city) {
            return Some(hit);
        }

        let data = match service.current(city).await {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, city, "weather lookup failed, deferring to model");
                return None;
            }
        };

        let text = format!(
            "Weather in {}: {}, {:.1}°C (feels like {:.1}°C), humidity {}%, wind {} m/s {}.",
            data.city,
            data.description,
            data.temperature,
            data.feels_like,
            data.humidity,
            data.wind_speed,
            data.wind_direction
        );
        let result = with_payload(&text, &ResultPayload::Weather { data });
        self.store(CacheKind::Weather, city, &result);
        Some(result)
    }

    async fn handle_stock(&self, symbol: &str) -> Option<String> {
        let service = self.stocks.as_ref()?;
        if let Some(hit) = self.cached(CacheKind::Stock, symbol) {
            return Some(hit);
        }

        let stock = match service.quote(symbol).await {
            Ok(q) => q,
            Err(e) => {
                debug!(error = %e, symbol, "stock lookup failed, deferring to model");
                return None;
            }
        };

        let text = format!(
            "{}: {:.2} ({:+.2}, {})",
            stock.symbol, stock.price, stock.change, stock.change_percent
        );
        let result = with_payload(&text, &ResultPayload::Stock { stock });
        self.store(CacheKind::Stock, symbol, &result);
        Some(result)
    }

    async fn handle_news(&self, topic: &str, language: &str) -> Option<String> {
        let service = self.news.as_ref()?;
        if let Some(hit) = self.cached(CacheKind::News, topic) {
            return Some(hit);
        }

        let articles = match service.latest(topic, language).await {
            Ok(a) if !a.is_empty() => a,
            Ok(_) => return None,
            Err(e) => {
                debug!(error = %e, topic, "news lookup failed, deferring to model");
                return None;
            }
        };

        let headlines: Vec<String> = articles
            .iter()
            .map(|a| format!("- {} ({})", a.title, a.source))
            .collect();
        let text = format!("Latest on {}:\n{}", topic, headlines.join("\n"));
        let result = with_payload(
            &text,
            &ResultPayload::News {
                articles,
                query: topic.to_string(),
            },
        );
        self.store(CacheKind::News, topic, &result);
        Some(result)
    }

    async fn handle_search(&self, raw_query: &str) -> Option<String> {
        let client = self.search.as_ref()?;
        let query = clean_search_query(raw_query);
        if query.is_empty() {
            return None;
        }
        if let Some(hit) = self.cached(CacheKind::Search, &query) {
            return Some(hit);
        }

        let results = match client.search(&query, SEARCH_RESULT_LIMIT).await {
            Ok(r) if !r.is_empty() => r,
            Ok(_) => return None,
            Err(e) => {
                debug!(error = %e, query, "auto search failed, deferring to model");
                return None;
            }
        };

        let text = self
            .synthesize(&query, &results)
            .await
            .unwrap_or_else(|| results[0].content.clone());
        let result = with_payload(
            &text,
            &ResultPayload::SearchResults {
                query: query.clone(),
                results,
                is_cached: false,
            },
        );
        self.store(CacheKind::Search, &query, &result);
        Some(result)
    }

    async fn synthesize(&self, query: &str, results: &[SearchResult]) -> Option<String> {
        let synthesizer = self.synthesizer.as_ref()?;
        let sources: Vec<String> = results
            .iter()
            .map(|r| format!("{}: {}", r.title, r.content))
            .collect();
        let request = CompletionRequest::prompt_only(
            "Answer the question conversationally using only the provided search results. \
             Be concise.",
            format!("Question: {}\n\nSearch results:\n{}", query, sources.join("\n")),
            0.7,
        );
        match synthesizer.complete(&request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "search synthesis failed, using raw result");
                None
            }
        }
    }
}

#[async_trait]
impl IntentDetector for KeywordIntentDetector {
    async fn try_handle(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();

        if let Some((amount, from, to)) = extract_currency_conversion(text) {
            return self.handle_currency(amount, &from, &to).await;
        }

        if let Some(caps) = IMAGE_PROMPT_RE.captures(text) {
            return self.handle_image(&caps[1]);
        }

        if let Some(city) = extract_city(text) {
            return self.handle_weather(&city).await;
        }

        if STOCK_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            if let Some(symbol) = extract_stock_symbol(text) {
                return self.handle_stock(&symbol).await;
            }
        }

        if let Some((topic, language)) = extract_news_query(text) {
            return self.handle_news(&topic, &language).await;
        }

        if self.config.auto_search_enabled && SEARCH_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return self.handle_search(text).await;
        }

        None
    }
}
