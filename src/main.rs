mod database;
mod error;
mod handlers;
mod ledger;
mod middleware;
mod models;
mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::env;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use dotenvy::dotenv;

use database::{Database, create_database_pool};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    // Initialize database
    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set");

    let db = create_database_pool(&database_url).await
        .expect("Failed to connect to database");

    // Build the application router
    let app = create_router(db);

    // Get port from environment or use default
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);

    log::info!("stockroom server starting on http://{}", addr);

    // Start the server
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn create_router(db: Database) -> Router {
    Router::new()
        // Authentication routes
        .route("/api/register", post(handlers::auth::register))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/logout", post(handlers::auth::logout))
        .route("/api/check-auth", get(handlers::auth::check_auth))

        // Profile routes
        .route("/api/profile", get(handlers::profile::get_profile))
        .route("/api/profile/update", post(handlers::profile::update_profile))
        .route("/api/profile/change-password", post(handlers::profile::change_password))

        // Product routes
        .route("/api/products", get(handlers::products::list_products))
        .route("/api/products", post(handlers::products::create_product))
        .route("/api/products/:id/quantity", put(handlers::products::update_quantity))

        // Category routes
        .route("/api/categories", get(handlers::categories::list_categories))
        .route("/api/categories", post(handlers::categories::create_category))

        // Dashboard and report routes
        .route("/api/dashboard-stats", get(handlers::dashboard::dashboard_stats))
        .route("/api/reports/product-movement", get(handlers::reports::product_movement))
        .route("/api/reports/inventory-on-hand", get(handlers::reports::inventory_on_hand))

        // Admin routes
        .route("/api/enterprise/invitation-tokens", post(handlers::admin::generate_invitation_token))
        .route("/api/enterprise/users", get(handlers::admin::list_enterprise_users))
        .route("/api/users/:id/admin-status", put(handlers::admin::set_admin_status))
        .route("/api/users/:id", delete(handlers::admin::delete_user))

        // Static files
        .nest_service("/static", ServeDir::new("static"))

        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CookieManagerLayer::new())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        )
        .with_state(db)
}
