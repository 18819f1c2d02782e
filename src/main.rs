use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use storefront_api as api;
use storefront_api::handlers::StorageBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(&cfg.log_level, cfg.log_json);

    // Init DB and probe it; the probe decides which storage backend the
    // catalog, discount and earnings stores use for this process. When the
    // configured database is unreachable, carts and sales fall back to a
    // local SQLite file so the process can keep serving.
    let (db_arc, backend) = match connect_and_probe(&cfg).await {
        Ok(pool) => {
            let pool = Arc::new(pool);
            if cfg.auto_migrate {
                api::db::run_migrations(&pool).await.map_err(|e| {
                    error!("Failed running migrations: {}", e);
                    e
                })?;
            }
            (pool, StorageBackend::Database)
        }
        Err(e) => {
            warn!("Database probe failed ({}); falling back to local files", e);
            tokio::fs::create_dir_all(&cfg.data_dir).await?;
            let fallback_url = format!("sqlite://{}/storefront.db?mode=rwc", cfg.data_dir);
            let pool = Arc::new(api::db::establish_connection(&fallback_url).await?);
            api::db::run_migrations(&pool).await?;
            (pool, StorageBackend::LocalFile)
        }
    };

    // Init events
    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // Payment provider client
    let provider: Arc<dyn api::services::PaymentProvider> = Arc::new(
        api::services::payment_provider::HttpPaymentProvider::from_config(&cfg),
    );

    // Build services and compose shared app state
    let services = api::handlers::AppServices::build(
        db_arc.clone(),
        Arc::new(event_sender.clone()),
        provider,
        &cfg,
        backend,
    )
    .await?;

    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!("Using permissive CORS (no explicit origins configured)");
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        return Err("Missing CORS configuration".into());
    };

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "storefront-api up" }))
        .nest("/api/v1", api::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn connect_and_probe(
    cfg: &api::config::AppConfig,
) -> Result<api::db::DbPool, api::errors::ServiceError> {
    let pool = api::db::establish_connection_from_app_config(cfg).await?;
    api::db::check_connection(&pool).await?;
    Ok(pool)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
