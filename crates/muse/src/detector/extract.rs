//! Pure query extractors for the keyword intent detector. Bilingual
//! (English/Spanish) to match the user base the heuristics grew up with.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CURRENCY_PATTERNS: Vec<Regex> = vec![
        // "100 USD to EUR"
        Regex::new(r"(?i)(\d+\.?\d*)\s*([a-z]{3})\s+to\s+([a-z]{3})").unwrap(),
        // "convert 100 dollars to euros"
        Regex::new(r"(?i)convert\s+(\d+\.?\d*)\s+(\w+)\s+to\s+(\w+)").unwrap(),
        // "convertir 50 euros a pesos"
        Regex::new(r"(?i)convertir\s+(\d+\.?\d*)\s+(\w+)\s+a\s+(\w+)").unwrap(),
        // "100 dólares a euros"
        Regex::new(r"(?i)(\d+\.?\d*)\s+(\w+)\s+a\s+(\w+)").unwrap(),
    ];
    static ref CITY_RE: Regex = Regex::new(
        r"(?i)(?:weather|clima|temperature|temperatura|forecast|pronóstico)\s+(?:in|en|de)\s+([a-záéíóúñ\s]+)"
    )
    .unwrap();
    static ref TICKER_RE: Regex = Regex::new(r"\b([A-Z]{2,5})\b").unwrap();
    static ref NEWS_TOPIC_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)(?:latest|últimas?)\s+(.+?)\s+(?:news|noticias)").unwrap(),
        Regex::new(r"(?i)(?:news|noticias)\s+(?:about|sobre)\s+(.+)").unwrap(),
        Regex::new(r"(?i)(.+?)\s+(?:news|noticias)").unwrap(),
        Regex::new(r"(?i)(?:news|noticias)\s+(.+)").unwrap(),
    ];
    static ref SEARCH_LEADIN_RE: Regex = Regex::new(
        r"(?i)^(?:busca|buscar|search(?:\s+for)?|cuál es|cual es|what is|what's|how much is|el precio de|the price of|dame|dime|tell me)\s+"
    )
    .unwrap();
}

/// Parse "convert 100 dollars to euros" style requests into
/// (amount, from ISO code, to ISO code).
pub fn extract_currency_conversion(query: &str) -> Option<(f64, String, String)> {
    for pattern in CURRENCY_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(query) {
            let amount: f64 = match caps[1].parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let from = map_currency_name(&caps[2]);
            let to = map_currency_name(&caps[3]);
            if let (Some(from), Some(to)) = (from, to) {
                return Some((amount, from, to));
            }
        }
    }
    None
}

fn map_currency_name(name: &str) -> Option<String> {
    let code = match name.to_lowercase().as_str() {
        "dollar" | "dollars" | "dólar" | "dólares" | "dolares" | "usd" => "USD",
        "euro" | "euros" | "eur" => "EUR",
        "pound" | "pounds" | "libra" | "libras" | "gbp" => "GBP",
        "yen" | "yenes" | "jpy" => "JPY",
        "peso" | "pesos" | "mxn" => "MXN",
        "real" | "reales" | "brl" => "BRL",
        "franc" | "francs" | "franco" | "francos" | "chf" => "CHF",
        other if other.len() == 3 && other.chars().all(|c| c.is_ascii_alphabetic()) => {
            return Some(other.to_uppercase())
        }
        _ => return None,
    };
    Some(code.to_string())
}

pub fn extract_city(query: &str) -> Option<String> {
    CITY_RE
        .captures(query)
        .map(|caps| caps[1].trim().trim_end_matches(['?', '.', '!']).trim().to_string())
        .filter(|city| !city.is_empty())
}

/// Find a plausible stock symbol: an explicit 2-5 letter ticker, or a known
/// company name.
pub fn extract_stock_symbol(query: &str) -> Option<String> {
    const COMPANIES: &[(&str, &str)] = &[
        ("apple", "AAPL"),
        ("microsoft", "MSFT"),
        ("google", "GOOGL"),
        ("amazon", "AMZN"),
        ("tesla", "TSLA"),
        ("meta", "META"),
        ("facebook", "META"),
        ("nvidia", "NVDA"),
        ("netflix", "NFLX"),
        ("disney", "DIS"),
    ];

    if let Some(caps) = TICKER_RE.captures(query) {
        return Some(caps[1].to_string());
    }

    let lower = query.to_lowercase();
    COMPANIES
        .iter()
        .find(|(company, _)| lower.contains(company))
        .map(|(_, ticker)| ticker.to_string())
}

/// Detect a news request and pull out (topic, language).
pub fn extract_news_query(query: &str) -> Option<(String, String)> {
    let lower = query.to_lowercase();
    let news_keywords = [
        "news",
        "noticias",
        "headlines",
        "breaking",
        "última hora",
        "actualidad",
    ];
    if !news_keywords.iter().any(|kw| lower.contains(kw)) {
        return None;
    }

    let spanish_keywords = ["noticias", "última hora", "actualidad"];
    let language = if spanish_keywords.iter().any(|kw| lower.contains(kw)) {
        "es"
    } else {
        "en"
    };

    let mut topic = query.to_string();
    for pattern in NEWS_TOPIC_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(query) {
            let candidate = caps[1].trim();
            if !candidate.is_empty() {
                topic = candidate.to_string();
                break;
            }
        }
    }

    Some((topic, language.to_string()))
}

/// Strip conversational lead-ins so "what is the price of gold" becomes a
/// clean search query.
pub fn clean_search_query(query: &str) -> String {
    SEARCH_LEADIN_RE
        .replace(query.trim(), "")
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- currency ----

    #[test]
    fn test_iso_pair_form() {
        assert_eq!(
            extract_currency_conversion("100 USD to EUR"),
            Some((100.0, "USD".to_string(), "EUR".to_string()))
        );
    }

    #[test]
    fn test_english_names_form() {
        assert_eq!(
            extract_currency_conversion("convert 50.5 dollars to euros"),
            Some((50.5, "USD".to_string(), "EUR".to_string()))
        );
    }

    #[test]
    fn test_spanish_names_form() {
        assert_eq!(
            extract_currency_conversion("convertir 50 euros a pesos"),
            Some((50.0, "EUR".to_string(), "MXN".to_string()))
        );
    }

    #[test]
    fn test_unknown_currency_is_none() {
        assert_eq!(extract_currency_conversion("convert 3 apples to oranges"), None);
    }

    #[test]
    fn test_plain_text_is_not_a_conversion() {
        assert_eq!(extract_currency_conversion("tell me about rust"), None);
    }

    // ---- weather ----

    #[test]
    fn test_city_after_weather_in() {
        assert_eq!(
            extract_city("what's the weather in San Francisco?"),
            Some("San Francisco".to_string())
        );
    }

    #[test]
    fn test_city_spanish() {
        assert_eq!(
            extract_city("clima en ciudad de méxico"),
            Some("ciudad de méxico".to_string())
        );
    }

    #[test]
    fn test_no_city_without_weather_keyword() {
        assert_eq!(extract_city("I live in Paris"), None);
    }

    // ---- stock ----

    #[test]
    fn test_explicit_ticker() {
        assert_eq!(
            extract_stock_symbol("AAPL stock price"),
            Some("AAPL".to_string())
        );
    }

    #[test]
    fn test_company_name_maps_to_ticker() {
        assert_eq!(
            extract_stock_symbol("how is tesla doing today"),
            Some("TSLA".to_string())
        );
    }

    #[test]
    fn test_no_symbol_in_plain_question() {
        assert_eq!(extract_stock_symbol("how are you today"), None);
    }

    // ---- news ----

    #[test]
    fn test_news_topic_and_language() {
        assert_eq!(
            extract_news_query("latest climate news"),
            Some(("climate".to_string(), "en".to_string()))
        );
    }

    #[test]
    fn test_spanish_news_detected() {
        let (topic, language) = extract_news_query("noticias sobre la economía").unwrap();
        assert_eq!(topic, "la economía");
        assert_eq!(language, "es");
    }

    #[test]
    fn test_non_news_is_none() {
        assert_eq!(extract_news_query("what's new in rust 1.80"), None);
    }

    // ---- search cleaning ----

    #[test]
    fn test_leadin_is_stripped() {
        assert_eq!(
            clean_search_query("what is the capital of France?"),
            "the capital of France"
        );
        assert_eq!(clean_search_query("busca recetas de paella"), "recetas de paella");
    }

    #[test]
    fn test_plain_query_unchanged() {
        assert_eq!(clean_search_query("rust borrow checker"), "rust borrow checker");
    }
}
