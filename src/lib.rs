pub mod catalog;
pub mod chat;
pub mod chunk_store;
pub mod config;
pub mod embedder;
pub mod executor;
pub mod gemini;
pub mod guard;
pub mod history;
pub mod model;
pub mod models;
pub mod quiz;
pub mod quota;
pub mod retrieval;
pub mod server;

pub use config::AppConfig;
pub use server::run_server;
