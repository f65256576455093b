pub mod agent;
pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("History Mode: {}", args.history_mode);
    if args.history_mode.eq_ignore_ascii_case("recent") {
        info!("History Recent Limit: {}", args.history_recent_limit);
    }
    info!("On Model Error: {}", args.on_model_error);
    info!("Max Concurrent Calls: {}", args.max_concurrent_calls);
    info!("Reasoning Timeout: {}s", args.reasoning_timeout_secs);
    info!("-------------------------");

    // Client initialization validates the credential; a missing API key
    // aborts here, before the listener is bound.
    let agent = Arc::new(ChatAgent::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent);
    server.run().await?;

    Ok(())
}
