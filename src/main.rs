use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;

use config::Config;
use services::{init, metadata::MetadataService};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub metadata: MetadataService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "towatchlist=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting ToWatchList Service");

    // Initialize database
    let pool = init::init_db(&config).await?;

    // Metadata proxy client (fixed request timeout, server-held API key)
    let metadata = MetadataService::new(&config.metadata)?;
    if config.metadata.api_key.is_none() {
        tracing::warn!("KINOPOISK_API_KEY not set; metadata endpoints will answer 503");
    }

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        metadata,
    });

    // Rate limiter for public auth endpoints. The error handler returns a
    // proper 429 with Retry-After, in the same error shape as AppError.
    let mut auth_builder = GovernorConfigBuilder::default();
    auth_builder.per_second(config.rate_limit.auth_per_second.into());
    auth_builder.burst_size(config.rate_limit.auth_burst);
    auth_builder.key_extractor(SmartIpKeyExtractor);
    auth_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                let body = serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                        "details": { "retry_after_seconds": wait_time }
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                if let Ok(retry) = http::HeaderValue::from_str(&wait_time.to_string()) {
                    resp.headers_mut().insert(http::header::RETRY_AFTER, retry);
                }
                resp
            }
            GovernorError::UnableToExtractKey => {
                let body = serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                resp
            }
            GovernorError::Other { code, msg, headers } => {
                let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let auth_gov_conf = Arc::new(
        auth_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
    );

    // Periodic cleanup of per-IP limiter storage; told to stop at shutdown.
    let (cleanup_tx, mut cleanup_rx) = tokio::sync::watch::channel(false);
    let auth_cleaner = {
        let limiter = auth_gov_conf.limiter().clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tracing::debug!("auth rate limiter size: {}", limiter.len());
                        limiter.retain_recent();
                    }
                    _ = cleanup_rx.changed() => {
                        tracing::info!("Auth rate limiter cleanup task exiting");
                        return;
                    }
                }
            }
        })
    };

    let auth_rate_layer = GovernorLayer {
        config: auth_gov_conf,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/auth", routes::auth::router().layer(auth_rate_layer))
        .nest("/api/users", routes::users::router())
        .nest("/api/lists", routes::lists::router())
        .nest("/api/items", routes::items::router())
        .nest("/api/metadata", routes::metadata::router())
        .nest("/api/logs", routes::logs::router())
        .with_state(app_state.clone())
        .layer(axum::middleware::from_fn(
            middleware::headers::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(
                    config
                        .server
                        .frontend_url
                        .parse::<HeaderValue>()
                        .expect("Invalid FRONTEND_URL for CORS"),
                )
                .allow_methods([
                    http::Method::GET,
                    http::Method::POST,
                    http::Method::PUT,
                    http::Method::DELETE,
                    http::Method::OPTIONS,
                    http::Method::PATCH,
                ])
                .allow_headers([
                    http::header::CONTENT_TYPE,
                    http::header::AUTHORIZATION,
                    http::header::ACCEPT,
                ])
                .allow_credentials(true),
        );

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let _ = cleanup_tx.send(true);
    let _ = auth_cleaner.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to bind SIGTERM");
        tokio::select! {
            _ = ctrl_c => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("Failed to bind Ctrl+C");
    }

    tracing::info!("Shutdown signal received");
}
