use crate::agent::{ ChatAgent, TurnResult };
use crate::error::AgentError;
use crate::models::chat::ChatMessage;

use axum::{
    routing::{ get, post },
    Router,
    extract::{ Path, State },
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use log::{ error, info, warn };
use serde::{ Deserialize, Serialize };
use serde_json::json;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };

#[derive(Deserialize)]
pub struct ChatRequest {
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    status: String,
    conversation_id: String,
    response: String,
    history: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ConversationResponse {
    conversation_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Clone)]
struct AppState {
    agent: Arc<ChatAgent>,
}

pub fn router(agent: Arc<ChatAgent>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route(
            "/conversation/{conversation_id}",
            get(get_conversation_handler).delete(delete_conversation_handler)
        )
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: &str,
    agent: Arc<ChatAgent>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(agent);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn error_response(status: StatusCode, detail: String) -> axum::response::Response {
    (status, Json(ErrorResponse { detail })).into_response()
}

fn map_agent_error(e: AgentError) -> axum::response::Response {
    match e {
        AgentError::ConversationNotFound(id) => {
            warn!("Conversation not found: {}", id);
            error_response(StatusCode::NOT_FOUND, "Conversation not found".to_string())
        }
        AgentError::Model(detail) => {
            error!("Reasoning failure surfaced to caller: {}", detail);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Reasoning call failed: {}", detail)
            )
        }
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "status": "active",
        "message": "Conversational agent API is running"
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "storage": "operational",
        "reasoning": "operational"
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>
) -> impl IntoResponse {
    info!(
        "Received chat request: conversation_id={:?}, message_len={}",
        req.conversation_id,
        req.message.len()
    );

    if req.message.trim().is_empty() {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "message must not be empty".to_string()
        );
    }

    match state.agent.handle_turn(req.conversation_id.as_deref(), &req.message).await {
        Ok(TurnResult { conversation_id, response, history, model_failed }) => {
            if model_failed {
                warn!("Turn for conversation {} degraded to an apology reply", conversation_id);
            }
            Json(ChatResponse {
                status: "success".to_string(),
                conversation_id,
                response,
                history,
            }).into_response()
        }
        Err(e) => map_agent_error(e),
    }
}

async fn get_conversation_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>
) -> impl IntoResponse {
    info!("Retrieving conversation: {}", conversation_id);

    match state.agent.get_conversation(&conversation_id).await {
        Ok(conversation) =>
            Json(ConversationResponse {
                conversation_id: conversation.id,
                messages: conversation.messages,
            }).into_response(),
        Err(e) => map_agent_error(e),
    }
}

async fn delete_conversation_handler(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>
) -> impl IntoResponse {
    info!("Deleting conversation: {}", conversation_id);

    match state.agent.delete_conversation(&conversation_id).await {
        Ok(()) =>
            Json(
                json!({
                "status": "success",
                "message": "Conversation deleted successfully"
            })
            ).into_response(),
        Err(e) => map_agent_error(e),
    }
}
