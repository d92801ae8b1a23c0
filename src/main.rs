pub mod cache;
pub mod cart;
pub mod catalog;
pub mod context;
pub mod coupons;
pub mod db;
pub mod error;
pub mod integrations;
pub mod orders;
pub mod pricing;
pub mod validation;

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{delete, get, patch, post},
    BoxError, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cache::{MemoryCache, RedisCache, SharedCache};
use cart::{CartService, CartStore};
use catalog::{CatalogService, PgCatalog};
use coupons::{CouponService, PgCouponStore};
use integrations::{HttpPaymentGateway, LiveFeed, PaymentGateway, PgAuditSink};
use orders::{OrderAnalytics, OrderService, PgOrderStore};

/// Every request is bounded; a handler that hangs on a collaborator still
/// returns to the client.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        cart::handlers::get_cart_handler,
        cart::handlers::add_item_handler,
        cart::handlers::update_quantity_handler,
        cart::handlers::calculate_total_handler,
    ),
    components(schemas(
        cart::CartResponse,
        cart::CartLine,
        cart::SelectedModifier,
        cart::SelectedModifierInput,
        cart::AddItemRequest,
        cart::UpdateQuantityRequest,
        cart::CalculatedTotalResponse,
        cart::AppliedCoupon,
        pricing::CartTotal,
        pricing::TaxBreakdown,
    )),
    tags(
        (name = "cart", description = "Cart and pricing endpoints")
    ),
    info(
        title = "Platter API",
        version = "1.0.0",
        description = "Order lifecycle and cart-pricing engine for the Platter food-ordering platform"
    )
)]
struct ApiDoc;

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    catalog_service: CatalogService,
    cart_service: CartService,
    coupon_service: CouponService,
    order_service: OrderService,
    analytics: OrderAnalytics,
}

/// Wire the services together over their injected collaborators.
fn build_state(db: PgPool, cache: SharedCache, gateway: Arc<dyn PaymentGateway>) -> AppState {
    let catalog = Arc::new(PgCatalog::new(db.clone()));
    let order_store = Arc::new(PgOrderStore::new(db.clone()));
    let coupon_store = Arc::new(PgCouponStore::new(db.clone()));

    let coupon_service = CouponService::new(coupon_store, order_store.clone(), cache.clone());
    let cart_store = CartStore::new(cache.clone());
    let cart_service = CartService::new(
        cart_store.clone(),
        catalog.clone(),
        catalog.clone(),
        coupon_service.clone(),
        cache.clone(),
    );
    let order_service = OrderService::new(
        order_store,
        cart_store,
        catalog.clone(),
        catalog.clone(),
        coupon_service.clone(),
        gateway,
        Arc::new(LiveFeed::new()),
        Arc::new(PgAuditSink::new(db.clone())),
    );

    AppState {
        catalog_service: CatalogService::new(catalog, cache),
        cart_service,
        coupon_service,
        order_service,
        analytics: OrderAnalytics::new(db),
    }
}

async fn handle_middleware_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long to process".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    }
}

/// Creates and configures the application router
fn create_router(state: AppState) -> Router {
    use tower_http::cors::{Any, CorsLayer};

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Menu read model
        .route("/api/menu", get(catalog::handlers::get_menu_handler))
        .route(
            "/api/menu/items/:item_id",
            patch(catalog::handlers::update_menu_item_handler),
        )
        // Cart
        .route("/api/cart", get(cart::handlers::get_cart_handler))
        .route("/api/cart", delete(cart::handlers::clear_cart_handler))
        .route("/api/cart/items", post(cart::handlers::add_item_handler))
        .route(
            "/api/cart/items/:line_id",
            patch(cart::handlers::update_quantity_handler),
        )
        .route(
            "/api/cart/items/:line_id",
            delete(cart::handlers::remove_item_handler),
        )
        .route("/api/cart/total", get(cart::handlers::calculate_total_handler))
        // Coupons
        .route("/api/coupons", post(coupons::handlers::create_coupon_handler))
        .route("/api/coupons", get(coupons::handlers::list_coupons_handler))
        .route(
            "/api/coupons/validate",
            post(coupons::handlers::validate_coupon_handler),
        )
        // Orders
        .route("/api/orders", post(orders::handlers::create_order_handler))
        .route("/api/orders", get(orders::handlers::list_orders_handler))
        .route("/api/orders/bulk", post(orders::handlers::bulk_operate_handler))
        .route("/api/orders/:order_id", get(orders::handlers::get_order_handler))
        .route(
            "/api/orders/:order_id/status",
            patch(orders::handlers::update_status_handler),
        )
        .route(
            "/api/orders/:order_id/delivery",
            patch(orders::handlers::update_delivery_handler),
        )
        .route(
            "/api/orders/:order_id/cancel",
            post(orders::handlers::cancel_order_handler),
        )
        .route(
            "/api/orders/:order_id/cancellation-eligibility",
            get(orders::handlers::cancellation_eligibility_handler),
        )
        // Analytics
        .route(
            "/api/analytics/orders/hourly",
            get(orders::handlers::hourly_breakdown_handler),
        )
        .route(
            "/api/analytics/orders/top-items",
            get(orders::handlers::top_items_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT)),
        )
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Platter API - Starting...");

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());

    tracing::info!("Connecting to database...");
    let db_pool = db::create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations completed successfully");

    let cache: SharedCache = match std::env::var("REDIS_URL") {
        Ok(url) => Arc::new(
            RedisCache::connect(&url)
                .await
                .expect("Failed to connect to Redis"),
        ),
        Err(_) => {
            tracing::warn!("REDIS_URL not set; using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let gateway_url = std::env::var("PAYMENT_GATEWAY_URL")
        .unwrap_or_else(|_| "http://localhost:9090".to_string());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        HttpPaymentGateway::new(gateway_url).expect("Failed to build payment gateway client"),
    );

    let app = create_router(build_state(db_pool, cache, gateway));

    let addr = format!("{}:{}", host, port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Platter API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app).await.expect("Server error");
}

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;
