use anyhow::Context;
use axum::{extract::State, http::HeaderValue, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use scoped_crud_api::config::{self, AppConfig};
use scoped_crud_api::database::{DatabaseManager, PgStore};
use scoped_crud_api::handlers::resource_routes;
use scoped_crud_api::middleware::AuthPolicy;
use scoped_crud_api::resource::{Resource, ResourceController};
use scoped_crud_api::resources::{Account, Transaction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config();
    tracing::info!("Starting scoped CRUD API in {:?} mode", config.environment);

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set");
    }

    let db = DatabaseManager::connect(&config.database).context("failed to configure database pool")?;
    let app = app(config, &db)?;

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.context("server error")?;
    db.close().await;
    Ok(())
}

fn app(config: &AppConfig, db: &DatabaseManager) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(db.clone())
        .merge(mount::<Account>(config, db)?)
        .merge(mount::<Transaction>(config, db)?);

    Ok(router.layer(cors(config)).layer(TraceLayer::new_for_http()))
}

/// Register a resource against Postgres and build its routes
fn mount<R: Resource>(config: &AppConfig, db: &DatabaseManager) -> anyhow::Result<Router> {
    let descriptor = R::descriptor()?;
    let store = PgStore::<R>::new(db.pool().clone(), &descriptor);
    let policy = AuthPolicy::new(config.security.jwt_secret.clone(), &descriptor);
    tracing::info!("Mounted /api/{}", descriptor.name());
    Ok(resource_routes(ResourceController::new(descriptor, store), policy))
}

fn cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Scoped CRUD API",
            "version": version,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "accounts": "/api/accounts[/:id] (bearer token)",
                "transactions": "/api/transactions[/:id] (bearer token)",
            }
        }
    }))
}

async fn health(State(db): State<DatabaseManager>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match db.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                axum::response::Json(json!({
                    "error": true,
                    "message": "Database temporarily unavailable",
                    "code": "SERVICE_UNAVAILABLE"
                })),
            )
        }
    }
}
