pub mod anthropic;
pub mod base;
pub mod configs;
pub mod gemini;
pub mod mock;
pub mod openai;
