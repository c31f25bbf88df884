/// Aspect-ratio presets for generated images. Unknown ratios fall back to
/// square.
pub fn aspect_dimensions(ratio: &str) -> (u32, u32) {
    match ratio {
        "16:9" => (1280, 720),
        "9:16" => (720, 1280),
        _ => (1024, 1024),
    }
}

/// External image-generation collaborator. Pollinations-style services are
/// URL-addressed, so generation itself needs no network round trip here.
pub trait ImageGenerator: Send + Sync {
    fn image_url(&self, prompt: &str, aspect_ratio: &str) -> String;
}

pub const DEFAULT_POLLINATIONS_HOST: &str = "https://image.pollinations.ai";

pub struct PollinationsGenerator {
    host: String,
}

impl PollinationsGenerator {
    pub fn new(host: String) -> Self {
        PollinationsGenerator { host }
    }
}

impl Default for PollinationsGenerator {
    fn default() -> Self {
        PollinationsGenerator::new(DEFAULT_POLLINATIONS_HOST.to_string())
    }
}

impl ImageGenerator for PollinationsGenerator {
    fn image_url(&self, prompt: &str, aspect_ratio: &str) -> String {
        let sanitized: String = prompt
            .replace(['\n', '\r'], " ")
            .trim()
            .chars()
            .take(1000)
            .collect();
        let encoded = urlencoding::encode(&sanitized);
        let (width, height) = aspect_dimensions(aspect_ratio);
        format!(
            "{}/prompt/{}?width={}&height={}&nologo=true&enhance=false&safe=true",
            self.host.trim_end_matches('/'),
            encoded,
            width,
            height
        )
    }
}
