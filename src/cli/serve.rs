use std::sync::Arc;
use tracing::info;
use crate::api;
use crate::cli::commands::ServeArgs;
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::errors::EngineError;

pub async fn handle_serve(engine_config: EngineConfig, args: ServeArgs) -> Result<(), EngineError> {
    info!(host = %args.host, port = args.port, "Starting API server");

    let engine = Arc::new(Engine::new(engine_config)?);
    let app = api::build_router(api::AppState::new(engine.clone()));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .map_err(|e| EngineError::Internal(format!("Server error: {}", e)))?;

    engine.controller.stop_all();
    Ok(())
}
