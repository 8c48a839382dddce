use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod doc;
pub mod health;
pub mod params;
pub mod payments;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .merge(catalog::router())
        .nest("/bookings", bookings::router())
        .nest("/payment", payments::router())
        .nest("/admin", admin::router())
}
