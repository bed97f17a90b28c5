pub mod agent;
pub mod cli;
pub mod config;
pub mod documents;
pub mod error;
pub mod history;
pub mod lead;
pub mod llm;
pub mod models;
pub mod notify;
pub mod relay;
pub mod server;
pub mod validate;
pub mod widget;

pub use server::{ build_router, run, AppState };
