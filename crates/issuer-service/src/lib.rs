//! PassMint issuer REST API
//!
//! Issues wallet passes for end users from organization-owned designs and
//! tracks every platform variant of each issuance.
//!
//! ## Architecture
//!
//! - [`issuer::Issuer`] orchestrates one issuance across all configured
//!   platform generators and tolerates partial platform failure
//! - [`store`] defines the design and pass record contracts, backed by
//!   [`storage::RedisStorage`] or [`memory::MemoryStorage`]
//! - [`blob`] hosts pass artifacts and design previews
//! - [`auth`] validates bearer tokens at the HTTP boundary
//!
//! ## Endpoints
//!
//! - `POST /api/designs` - Create a design from JSON (org)
//! - `POST /api/designs/upload` - Create a design with a preview image (org)
//! - `GET /api/designs/{design_id}` - Get a design (org)
//! - `POST /api/passes` - Issue a pass (user)
//! - `GET /api/passes/{pass_id}` - Get a pass (user)
//! - `POST /api/passes/{pass_id}/update` - Update a pass (org)
//! - `GET /api/stats/org/{org_id}` - Pass statistics (org)
//! - `GET /health` - Health check

pub mod auth;
pub mod blob;
pub mod config;
pub mod handlers;
pub mod issuer;
pub mod memory;
pub mod models;
pub mod storage;
pub mod store;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use handlers::AppState;
pub use issuer::{Issuer, PlatformOutcome};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let files_dir = state.files_dir.clone();
    let state = Arc::new(state);

    let mut router = Router::new()
        // Health check
        .route("/health", get(handlers::health_handler))
        .route("/", get(handlers::root_handler))
        // Designs
        .route("/api/designs", post(handlers::create_design_handler))
        .route("/api/designs/upload", post(handlers::upload_design_handler))
        .route("/api/designs/{design_id}", get(handlers::get_design_handler))
        // Passes
        .route("/api/passes", post(handlers::create_pass_handler))
        .route("/api/passes/{pass_id}", get(handlers::get_pass_handler))
        .route(
            "/api/passes/{pass_id}/update",
            post(handlers::update_pass_handler),
        )
        // Reporting
        .route("/api/stats/org/{org_id}", get(handlers::org_stats_handler));

    if let Some(dir) = files_dir {
        router = router.nest_service("/files", ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
