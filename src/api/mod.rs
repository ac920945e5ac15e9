//! REST surface: system endpoints and router composition.
//!
//! The hub's HTTP surface is intentionally thin — entity CRUD and
//! session issuance live in external services; only operational
//! endpoints are served here.

pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Builds the REST router.
pub fn build_router() -> Router<AppState> {
    system::routes()
}
