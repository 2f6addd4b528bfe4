use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod clock;
mod config;
mod feeds;
mod geometry;
mod regions;
mod render;
mod routes;
mod service;
mod utils;

use clock::SystemClock;
use config::Config;
use feeds::HttpFeedClient;
use routes::{create_router, AppState};
use service::{FeedUrls, WildfireService};

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors_allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = config
        .cors_allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| anyhow::anyhow!("invalid CORS origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wildfire_feed_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let excluded = config.excluded_regions()?;
    tracing::info!(
        "Cache TTL {}s, upstream timeout {}s, excluded fire regions: {:?}",
        config.cache_ttl_secs,
        config.upstream_timeout_secs,
        excluded.names()
    );

    let fetcher = Arc::new(HttpFeedClient::from_config(&config)?);
    let service = Arc::new(WildfireService::new(
        fetcher,
        FeedUrls::from_config(&config),
        Arc::new(SystemClock),
        config.cache_ttl(),
        excluded,
    ));

    let state = AppState { service };

    let app = create_router(state)
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
