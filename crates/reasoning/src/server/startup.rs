//! REST server startup and configuration

use anyhow::{Context, Result};
use axum::serve;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::server::routing::create_router;
use crate::server::AppState;
use crate::store::{open_store, VectorStore};

/// Open the store, build the pipeline and serve until interrupted.
pub async fn start_server(addr: SocketAddr, config: Config) -> Result<()> {
  let store: Arc<dyn VectorStore> = Arc::from(open_store(&config, false).await?);
  let records = store.len().await?;
  if records == 0 {
    bentley::warn!("vector store at {} is empty; run `reasoning index` first", config.store_path.display());
  } else {
    bentley::info!("serving {records} reference records");
  }

  let pipeline = Pipeline::from_config(&config, store.clone())?;
  let state =
    Arc::new(AppState { pipeline, store, embedding_model: config.embedding_model.clone() });

  let app = create_router(state).layer(
    ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()),
  );

  let listener =
    TcpListener::bind(addr).await.with_context(|| format!("failed to bind {addr}"))?;
  bentley::info!("server listening on {addr}");

  serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("server error")?;

  bentley::info!("server shut down gracefully");
  Ok(())
}

#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    bentley::error!("failed to listen for shutdown signal: {e}");
    std::future::pending::<()>().await;
  }
}
