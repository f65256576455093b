use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for the reasoning call (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the LLM provider. Required for OpenAI; startup fails without it.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    /// Model name for the reasoning call (e.g., gpt-4o-mini, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    // --- Conversation History Args ---
    /// How much of the transcript feeds the reasoning call (full, recent)
    #[arg(long, env = "HISTORY_MODE", default_value = "full")]
    pub history_mode: String,

    /// Number of newest messages included in the context under recent mode.
    #[arg(long, env = "HISTORY_RECENT_LIMIT", default_value = "5")]
    pub history_recent_limit: usize,

    // --- Turn Handling Args ---
    /// What a failed reasoning call turns into (apologize, propagate)
    #[arg(long, env = "ON_MODEL_ERROR", default_value = "apologize")]
    pub on_model_error: String,

    /// Maximum number of reasoning calls in flight at once.
    #[arg(long, env = "MAX_CONCURRENT_CALLS", default_value = "4")]
    pub max_concurrent_calls: usize,

    /// Timeout in seconds for a single reasoning call; expiry counts as a model error.
    #[arg(long, env = "REASONING_TIMEOUT_SECS", default_value = "60")]
    pub reasoning_timeout_secs: u64,

    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:8000")]
    pub server_addr: String,
}
