// Delivery Fee API v0.1
use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod routes;
mod services;

use config::AppConfig;
use routes::delivery_fee::AppState;
use services::store::PgFeeStore;

/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// Delivery Fee API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Delivery Fee API",
        version = "0.1.0",
        description = "Calculates food delivery fees from a regional base fee and \
            weather-dependent surcharges. Weather is taken from the latest \
            observation of the station covering the city; some vehicle types \
            are forbidden under severe conditions.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Delivery fee", description = "Fee calculation"),
    ),
    paths(
        routes::health::health_check,
        routes::delivery_fee::get_delivery_fee,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::delivery_fee::DeliveryFeeResponse,
            services::weather_code::WeatherCode,
            services::fee::FeeWarning,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "delivery_fee_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(DB_POOL_MIN_CONNECTIONS.min(config.db_max_connections))
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations (schema + reference data)
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    let app_state = AppState {
        store: PgFeeStore::new(pool.clone()),
    };

    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let fee_routes = Router::new()
        .route(
            "/api/v1/delivery-fee",
            get(routes::delivery_fee::get_delivery_fee),
        )
        .with_state(app_state);

    // Health check uses PgPool to verify DB connectivity
    let health_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(pool);

    let app = Router::new()
        .merge(health_routes)
        .merge(fee_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
