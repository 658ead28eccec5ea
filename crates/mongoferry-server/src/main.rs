#![allow(clippy::doc_markdown)]
//! mongoferry Server - REST API for MongoDB migrations.

use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mongoferry_server::{api_router, ApiDoc, AppState};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// mongoferry Server - run MongoDB migrations over HTTP
#[derive(Parser, Debug)]
#[command(name = "mongoferry-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "MONGOFERRY_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "3001", env = "MONGOFERRY_PORT")]
    port: u16,

    /// JSON file holding the saved migration configuration
    #[arg(short, long, default_value = "config.json", env = "MONGOFERRY_CONFIG_FILE")]
    config_file: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting mongoferry server...");
    tracing::info!("Configuration file: {}", args.config_file);

    let state = Arc::new(AppState::with_mongo(&args.config_file));

    // Swagger UI (stateless router)
    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let app = api_router(state)
        .merge(Router::<()>::new().merge(swagger_ui))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("mongoferry server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
