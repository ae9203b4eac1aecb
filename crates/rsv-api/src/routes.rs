//! Route definitions
//!
//! Defines all HTTP API endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    activate_series, check_availability, commit, create_reservation, deactivate_series, get_series, health,
    preview, scenario_availability, scenario_series, series_reservations, set_reservation_status,
};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Availability
        .route("/api/availability", post(check_availability))
        .route("/api/scenarios/{scenario_id}/availability", get(scenario_availability))
        // Recurrences
        .route("/api/recurrences/preview", post(preview))
        .route("/api/recurrences/commit", post(commit))
        // Series management
        .route("/api/scenarios/{scenario_id}/series", get(scenario_series))
        .route("/api/series/{series_id}", get(get_series))
        .route("/api/series/{series_id}/reservations", get(series_reservations))
        .route("/api/series/{series_id}/activate", post(activate_series))
        .route("/api/series/{series_id}/deactivate", post(deactivate_series))
        // One-off reservations
        .route("/api/reservations", post(create_reservation))
        .route("/api/reservations/{reservation_id}/status", post(set_reservation_status))
}
