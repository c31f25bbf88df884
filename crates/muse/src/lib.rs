pub mod conversation;
pub mod detector;
pub mod engine;
pub mod errors;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod protocol;
pub mod providers;
pub mod tools;
