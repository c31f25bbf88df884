//! Live-data collaborators backing the intent detector.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::tools::payload::{CurrencyConversion, NewsArticle, StockQuote, WeatherData};

pub const DEFAULT_OPENWEATHERMAP_HOST: &str = "https://api.openweathermap.org";
pub const DEFAULT_EXCHANGERATE_HOST: &str = "https://v6.exchangerate-api.com";
pub const DEFAULT_NEWSAPI_HOST: &str = "https://newsapi.org";
pub const DEFAULT_ALPHAVANTAGE_HOST: &str = "https://www.alphavantage.co";

fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(Duration::from_secs(15)).build()?)
}

async fn get_json(client: &Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await?;
    match response.status() {
        StatusCode::OK => Ok(response.json().await?),
        status => Err(anyhow!("Request failed: {}", status)),
    }
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn current(&self, city: &str) -> Result<WeatherData>;
}

pub struct OpenWeatherMapClient {
    client: Client,
    host: String,
    api_key: String,
}

impl OpenWeatherMapClient {
    pub fn new(host: String, api_key: String) -> Result<Self> {
        Ok(OpenWeatherMapClient {
            client: http_client()?,
            host,
            api_key,
        })
    }
}

/// Compass direction from degrees, in 45° buckets.
pub fn wind_direction(degrees: f64) -> &'static str {
    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let normalized = degrees.rem_euclid(360.0);
    let bucket = ((normalized + 22.5) / 45.0) as usize % 8;
    DIRECTIONS[bucket]
}

#[async_trait]
impl WeatherService for OpenWeatherMapClient {
    async fn current(&self, city: &str) -> Result<WeatherData> {
        let url = format!(
            "{}/data/2.5/weather?q={}&units=metric&appid={}",
            self.host.trim_end_matches('/'),
            urlencoding::encode(city),
            self.api_key
        );
        let data = get_json(&self.client, &url).await?;

        let main = data
            .get("main")
            .ok_or_else(|| anyhow!("No main block in weather response"))?;
        Ok(WeatherData {
            city: data["name"].as_str().unwrap_or(city).to_string(),
            description: data["weather"][0]["description"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            temperature: main["temp"].as_f64().unwrap_or_default(),
            feels_like: main["feels_like"].as_f64().unwrap_or_default(),
            humidity: main["humidity"].as_u64().unwrap_or_default() as u32,
            wind_speed: data["wind"]["speed"].as_f64().unwrap_or_default(),
            wind_direction: wind_direction(data["wind"]["deg"].as_f64().unwrap_or_default())
                .to_string(),
        })
    }
}

#[async_trait]
pub trait CurrencyService: Send + Sync {
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<CurrencyConversion>;
}

pub struct ExchangeRateClient {
    client: Client,
    host: String,
    api_key: String,
}

impl ExchangeRateClient {
    pub fn new(host: String, api_key: String) -> Result<Self> {
        Ok(ExchangeRateClient {
            client: http_client()?,
            host,
            api_key,
        })
    }
}

#[async_trait]
impl CurrencyService for ExchangeRateClient {
    async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<CurrencyConversion> {
        let url = format!(
            "{}/v6/{}/pair/{}/{}/{}",
            self.host.trim_end_matches('/'),
            self.api_key,
            from,
            to,
            amount
        );
        let data = get_json(&self.client, &url).await?;

        if data["result"].as_str() != Some("success") {
            return Err(anyhow!(
                "Conversion failed: {}",
                data["error-type"].as_str().unwrap_or("unknown error")
            ));
        }

        Ok(CurrencyConversion {
            amount,
            from: from.to_string(),
            to: to.to_string(),
            result: data["conversion_result"].as_f64().unwrap_or_default(),
            rate: data["conversion_rate"].as_f64().unwrap_or_default(),
        })
    }
}

#[async_trait]
pub trait NewsService: Send + Sync {
    async fn latest(&self, query: &str, language: &str) -> Result<Vec<NewsArticle>>;
}

pub struct NewsApiClient {
    client: Client,
    host: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(host: String, api_key: String) -> Result<Self> {
        Ok(NewsApiClient {
            client: http_client()?,
            host,
            api_key,
        })
    }
}

#[async_trait]
impl NewsService for NewsApiClient {
    async fn latest(&self, query: &str, language: &str) -> Result<Vec<NewsArticle>> {
        let url = format!(
            "{}/v2/everything?q={}&language={}&sortBy=publishedAt&pageSize=5&apiKey={}",
            self.host.trim_end_matches('/'),
            urlencoding::encode(query),
            language,
            self.api_key
        );
        let data = get_json(&self.client, &url).await?;

        let articles = data["articles"]
            .as_array()
            .ok_or_else(|| anyhow!("No articles in news response"))?;
        Ok(articles
            .iter()
            .map(|a| NewsArticle {
                title: a["title"].as_str().unwrap_or("Untitled").to_string(),
                description: a["description"].as_str().unwrap_or_default().to_string(),
                url: a["url"].as_str().unwrap_or_default().to_string(),
                source: a["source"]["name"].as_str().unwrap_or_default().to_string(),
                published_at: a["publishedAt"].as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }
}

#[async_trait]
pub trait StockService: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<StockQuote>;
}

pub struct AlphaVantageClient {
    client: Client,
    host: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(host: String, api_key: String) -> Result<Self> {
        Ok(AlphaVantageClient {
            client: http_client()?,
            host,
            api_key,
        })
    }
}

#[async_trait]
impl StockService for AlphaVantageClient {
    async fn quote(&self, symbol: &str) -> Result<StockQuote> {
        let url = format!(
            "{}/query?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.host.trim_end_matches('/'),
            urlencoding::encode(symbol),
            self.api_key
        );
        let data = get_json(&self.client, &url).await?;

        // Alpha Vantage reports problems in-band with a 200 status.
        if let Some(message) = data.get("Error Message").and_then(Value::as_str) {
            return Err(anyhow!("Stock lookup failed: {}", message));
        }
        if let Some(note) = data.get("Note").and_then(Value::as_str) {
            return Err(anyhow!("Stock API limit: {}", note));
        }

        let quote = data
            .get("Global Quote")
            .filter(|q| q.as_object().map(|o| !o.is_empty()).unwrap_or(false))
            .ok_or_else(|| anyhow!("No quote for symbol {}", symbol))?;

        let parse_f64 = |key: &str| {
            quote[key]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or_default()
        };

        Ok(StockQuote {
            symbol: quote["01. symbol"].as_str().unwrap_or(symbol).to_string(),
            price: parse_f64("05. price"),
            change: parse_f64("09. change"),
            change_percent: quote["10. change percent"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            volume: quote["06. volume"]
                .as_str()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or_default(),
        })
    }
}
