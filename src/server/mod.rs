//! HTTP server
//! Thin axum surface over the turn orchestrator

pub mod api;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tracing::info;

use crate::config::AppConfig;
use crate::server::api::{chat_get, chat_post};
use crate::server::state::AppContext;

pub struct ChatServer {
    config: AppConfig,
    context: Arc<AppContext>,
}

impl ChatServer {
    pub fn new(config: AppConfig, context: AppContext) -> Self {
        Self {
            config,
            context: Arc::new(context),
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

        let app = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind: {}", e))?;

        info!("kizuna server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }

    fn build_router(&self) -> Router {
        let cors = if self.config.enable_cors {
            tower_http::cors::CorsLayer::permissive()
        } else {
            tower_http::cors::CorsLayer::new()
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/chat", get(chat_get))
            .route("/chat", post(chat_post))
            .with_state(Arc::clone(&self.context))
            .layer(cors)
    }
}

/// Health check handler with process counters
async fn health_handler() -> impl axum::response::IntoResponse {
    axum::Json(health_body())
}

fn health_body() -> serde_json::Value {
    let metrics = crate::observability::snapshot();
    serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": metrics.uptime_secs(),
        "turns_total": metrics.turns_total,
        "turns_failed": metrics.turns_failed,
        "llm_calls": metrics.llm_calls,
        "game_turns": metrics.game_turns,
        "memory_writes": metrics.memory_writes,
        "memory_write_failures": metrics.memory_write_failures,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_body_reports_all_counters() {
        let body = health_body();
        assert_eq!(body["status"], "healthy");
        for key in [
            "uptime_secs",
            "turns_total",
            "turns_failed",
            "llm_calls",
            "game_turns",
            "memory_writes",
            "memory_write_failures",
        ] {
            assert!(body[key].is_u64(), "missing counter {}", key);
        }
    }
}
