//! HTTP transport for remote AI agents.
//!
//! This module provides an HTTP server that exposes the MCP protocol via
//! rmcp's StreamableHttpService, enabling remote AI agents to execute
//! Python through pybox.
//!
//! ## Endpoints
//!
//! - `POST /mcp` - JSON-RPC requests
//! - `GET /mcp` - SSE stream for server-initiated messages
//! - `GET /health` - Health check with engine counters
//! - `GET /` - Server info

use crate::server::PyboxServer;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use pybox_engine::Gateway;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the HTTP router for the MCP server.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(server: PyboxServer) -> Router {
    tracing::debug!("Building HTTP router");

    let gateway = server.gateway_arc();

    // Create session manager for handling MCP sessions
    let session_manager = Arc::new(LocalSessionManager::default());

    // Create the StreamableHttpService from rmcp
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        session_manager,
        StreamableHttpServerConfig::default(),
    );

    // Build the router
    let router = Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Server info at root
        .route("/", get(root_handler))
        .with_state(gateway)
        // MCP endpoint as a fallback/nested service
        .fallback_service(mcp_service)
        // Add middleware
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::debug!("HTTP router built with routes: /, /health, /mcp");
    router
}

/// Health check endpoint with engine counters.
async fn health_handler(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "pybox-mcp",
        "stats": gateway.stats().snapshot(),
    }))
}

/// Root endpoint with server info.
async fn root_handler() -> impl IntoResponse {
    tracing::trace!("Root page request");
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Pybox MCP Server</title>
    <style>
        body { font-family: system-ui; max-width: 800px; margin: 50px auto; padding: 20px; }
        code { background: #f4f4f4; padding: 2px 6px; border-radius: 3px; }
        pre { background: #f4f4f4; padding: 16px; border-radius: 6px; overflow-x: auto; }
    </style>
</head>
<body>
    <h1>Pybox MCP Server</h1>
    <p>Model Context Protocol server for isolated Python execution.</p>

    <h2>Endpoints</h2>
    <ul>
        <li><code>POST /mcp</code> - MCP JSON-RPC requests</li>
        <li><code>GET /mcp</code> - SSE stream for server messages</li>
        <li><code>GET /health</code> - Health check with engine counters</li>
    </ul>

    <h2>Example</h2>
    <pre>curl -X POST http://localhost:8080/mcp \
  -H "Content-Type: application/json" \
  -d '{"jsonrpc":"2.0","id":1,"method":"tools/list"}'</pre>

    <h2>Available Tools</h2>
    <ul>
        <li><code>execute_python</code> - Execute Python code in an isolated runtime</li>
    </ul>
</body>
</html>"#,
    )
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    server: PyboxServer,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(server);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
