use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod chat;
mod config;
mod db;
mod llm;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_format);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize LLM manager
    info!(
        "Initializing LLM manager with backend: {} (default model {})",
        config.llm.backend, config.llm.model
    );
    let llm_manager = LlmManager::new(&config.llm)?;

    let app_state = Arc::new(AppState::new(config.clone(), llm_manager)?);

    // Start the web server
    info!(
        "Starting SQL Chat on {}:{} with {} routing",
        config.web.host, config.web.port, config.chat.routing
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
