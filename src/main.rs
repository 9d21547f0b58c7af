use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use jobboard_backend::{
    config::{get_config, init_config},
    database::pool::{create_pool, run_migrations},
    middleware::{cors::cors_layer, rate_limit},
    models::job::JobSnapshot,
    routes,
    services::job_directory::InMemoryJobDirectory,
    telemetry, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

/// Multipart framing and the text fields on top of the resume itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config();
    telemetry::init(&config.log_format)?;

    let app_state = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = create_pool(database_url).await?;
            run_migrations(&pool).await?;
            info!("Connected to Postgres, migrations applied");
            AppState::with_postgres(config, pool)
        }
        None => {
            warn!("DATABASE_URL is not set; using in-memory stores with a demo job");
            AppState::in_memory(
                config,
                InMemoryJobDirectory::with_jobs([JobSnapshot {
                    id: "demo".to_string(),
                    title: "Demo Position".to_string(),
                    company_name: "Demo Company".to_string(),
                    recruiter_email: None,
                }]),
            )
        }
    };

    match app_state.mail_service.transport_kind().await {
        Ok(kind) => info!(transport = ?kind, "Mail transport ready"),
        Err(e) => warn!(error = %e, "Mail transport unavailable; confirmations will fail"),
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let public_api = Router::new()
        .route(
            "/jobs/:id/quick-apply",
            post(routes::quick_apply::quick_apply).layer(DefaultBodyLimit::max(
                config.max_resume_bytes + FORM_OVERHEAD_BYTES,
            )),
        )
        .route(
            "/applications/track",
            get(routes::tracking::track_application),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(config.public_rps),
            rate_limit::rps_middleware,
        ));

    info!("Serving uploads from: {}", config.uploads_dir.display());

    let app = base_routes
        .merge(public_api)
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .with_state(app_state)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
