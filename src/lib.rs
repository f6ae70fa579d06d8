pub mod cli;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod matching;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod util;
