//! Typed `json_data:` payloads appended to tool results.
//!
//! A completed tool result may carry, after its human-readable portion, a
//! `json_data: ` suffix holding one JSON object discriminated by a `type`
//! field. Renderers select a presentation purely by that discriminant and
//! fall back to plain text for anything they do not recognize.

use serde::{Deserialize, Serialize};

use crate::protocol::JSON_DATA_MARKER;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub content: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub city: String,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u32,
    pub wind_speed: f64,
    pub wind_direction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub result: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: String,
    pub volume: u64,
}

/// Structured critique of a generated image, produced by a second,
/// best-effort model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReview {
    pub title: String,
    pub description: String,
    pub style: String,
    pub lighting: String,
    pub composition: String,
    pub mood: String,
    #[serde(default)]
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResultPayload {
    #[serde(rename = "search_results")]
    SearchResults {
        query: String,
        results: Vec<SearchResult>,
        #[serde(rename = "isCached")]
        is_cached: bool,
    },
    #[serde(rename = "weather_result")]
    Weather { data: WeatherData },
    #[serde(rename = "currency_result")]
    Currency { conversion: CurrencyConversion },
    #[serde(rename = "news_results")]
    News {
        articles: Vec<NewsArticle>,
        query: String,
    },
    #[serde(rename = "stock_result")]
    Stock { stock: StockQuote },
    #[serde(rename = "image_result")]
    Image {
        url: String,
        prompt: String,
        aspect_ratio: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        review: Option<ImageReview>,
    },
}

/// Append a payload to the human-readable portion of a tool result.
pub fn with_payload(text: &str, payload: &ResultPayload) -> String {
    // Serialization of these shapes cannot fail; fall back to text alone.
    match serde_json::to_string(payload) {
        Ok(json) => format!("{}\n\n{}{}", text.trim_end(), JSON_DATA_MARKER, json),
        Err(_) => text.to_string(),
    }
}

/// Extract the payload from a result string, if one is present and decodes.
pub fn extract_payload(content: &str) -> Option<ResultPayload> {
    let pos = content.rfind(JSON_DATA_MARKER)?;
    let json = content[pos + JSON_DATA_MARKER.len()..].trim();
    serde_json::from_str(json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trips_through_suffix() {
        let payload = ResultPayload::SearchResults {
            query: "rust async".to_string(),
            results: vec![SearchResult {
                title: "Async Book".to_string(),
                content: "Asynchronous programming in Rust".to_string(),
                url: "https://rust-lang.github.io/async-book/".to_string(),
            }],
            is_cached: false,
        };
        let text = with_payload("Found 1 result for \"rust async\".", &payload);
        assert!(text.starts_with("Found 1 result"));
        assert_eq!(extract_payload(&text), Some(payload));
    }

    #[test]
    fn test_discriminant_is_type_field() {
        let payload = ResultPayload::Image {
            url: "https://img/x.png".to_string(),
            prompt: "a fox".to_string(),
            aspect_ratio: "16:9".to_string(),
            review: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "image_result");
        assert!(json.get("review").is_none());
    }

    #[test]
    fn test_unknown_discriminant_yields_none() {
        let content = "text\n\njson_data: {\"type\": \"hologram_result\", \"x\": 1}";
        assert_eq!(extract_payload(content), None);
    }

    #[test]
    fn test_missing_marker_yields_none() {
        assert_eq!(extract_payload("no payload here"), None);
    }
}
