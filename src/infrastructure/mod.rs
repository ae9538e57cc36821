pub mod config;
pub mod error;
pub mod gemini_client;
pub mod logging;
pub mod page_fetcher;
pub mod preference_store;
pub mod rule_engine;
pub mod runtime;
