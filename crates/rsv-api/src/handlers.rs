//! HTTP API handlers
//!
//! Request handlers for availability, recurrence preview/commit and series
//! management.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveDateTime};
use rsv_core::{
    AvailabilityBackend, FieldError, NewReservation, RecurrenceSpec, Reservation, ReservationInsert, ReservationStatus,
    SeriesView, TimeInterval,
};
use rsv_engine::{Availability, AvailabilityReport, AvailabilitySource, CommitResult, PreviewResult};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::server::AppState;

// ============================================================================
// Request types
// ============================================================================

/// Single availability check payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub scenario_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// Query string of the backend-compatible availability endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// Commit payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// Request as currently shown to the user; defaults to the preview's echo
    #[serde(default)]
    pub spec: Option<RecurrenceSpec>,
    pub preview: PreviewResult,
    /// Series of an earlier, partial commit
    #[serde(default)]
    pub series_id: Option<i64>,
}

/// One-off reservation payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub scenario_id: i64,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    #[serde(default)]
    pub status: ReservationStatus,
}

/// Status change payload
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ReservationStatus,
}

/// Scenario-local date. Dates and times are calendar-naive, so the server's
/// local calendar stands in for the scenario's; only `generatedAt` is UTC.
fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn interval(start_at: NaiveDateTime, end_at: NaiveDateTime) -> Result<TimeInterval> {
    if end_at <= start_at {
        return Err(rsv_core::Error::Validation(vec![FieldError::new("endAt", "must be after startAt")]).into());
    }
    Ok(TimeInterval::new(start_at, end_at))
}

// ============================================================================
// Handler functions
// ============================================================================

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Check one interval against the configured availability source
pub async fn check_availability(
    State(state): State<AppState>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<Availability>> {
    debug!("Availability request: {:?}", req);
    let interval = interval(req.start_at, req.end_at)?;
    let availability = state.checker.check(req.scenario_id, interval).await?;
    Ok(Json(availability))
}

/// Availability from the local store, in the wire shape the HTTP
/// availability source expects
pub async fn scenario_availability(
    State(state): State<AppState>,
    Path(scenario_id): Path<i64>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityReport>> {
    let interval = interval(query.start_at, query.end_at)?;
    let report = state.store.check_availability(scenario_id, &interval).await?;
    Ok(Json(report))
}

/// Dry-run a recurring reservation request
pub async fn preview(State(state): State<AppState>, Json(spec): Json<RecurrenceSpec>) -> Result<Json<PreviewResult>> {
    debug!("Preview request: {:?}", spec);
    let result = state.assembler.preview(&spec, today()).await?;
    Ok(Json(result))
}

/// Persist an approved preview
pub async fn commit(State(state): State<AppState>, Json(req): Json<CommitRequest>) -> Result<Json<CommitResult>> {
    let spec = req.spec.unwrap_or_else(|| req.preview.spec.clone());
    info!(preview_id = %req.preview.preview_id, series_id = ?req.series_id, "Commit request");

    let result = state
        .executor
        .commit(&spec, &req.preview, req.series_id, today())
        .await?;
    Ok(Json(result))
}

/// List the series of a scenario
pub async fn scenario_series(
    State(state): State<AppState>,
    Path(scenario_id): Path<i64>,
) -> Result<Json<Vec<SeriesView>>> {
    Ok(Json(state.series.list_for_scenario(scenario_id, today()).await?))
}

pub async fn get_series(State(state): State<AppState>, Path(series_id): Path<i64>) -> Result<Json<SeriesView>> {
    Ok(Json(state.series.get(series_id, today()).await?))
}

/// Reservations generated by a series
pub async fn series_reservations(
    State(state): State<AppState>,
    Path(series_id): Path<i64>,
) -> Result<Json<Vec<Reservation>>> {
    Ok(Json(state.series.occurrences(series_id).await?))
}

pub async fn activate_series(State(state): State<AppState>, Path(series_id): Path<i64>) -> Result<Json<SeriesView>> {
    Ok(Json(state.series.activate(series_id, today()).await?))
}

pub async fn deactivate_series(
    State(state): State<AppState>,
    Path(series_id): Path<i64>,
) -> Result<Json<SeriesView>> {
    Ok(Json(state.series.deactivate(series_id, today()).await?))
}

/// Create a single reservation.
///
/// Blocking statuses are refused when the interval is already taken. The
/// local overlap check and the insert run in one store transaction; with an
/// HTTP availability backend the remote bookings are checked first.
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>)> {
    let interval = interval(req.start_at, req.end_at)?;

    if req.status.is_blocking() && state.config.availability.backend == AvailabilityBackend::Http {
        let availability = state.checker.check(req.scenario_id, interval).await?;
        if !availability.available {
            return Err(ApiError::Conflict(
                availability
                    .conflict_detail
                    .unwrap_or_else(|| "interval is not available".to_string()),
            ));
        }
    }

    let store = state.store.lock().await;
    let id = match store.insert_reservation_if_free(&NewReservation::new(req.scenario_id, interval, req.status))? {
        ReservationInsert::Created(id) => id,
        ReservationInsert::Conflict(conflicts) => {
            let detail = conflicts
                .iter()
                .map(|r| format!("overlaps reservation #{} ({}, {})", r.id, r.status, r.interval()))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ApiError::Conflict(detail));
        }
    };
    let reservation = store
        .get_reservation(id)?
        .ok_or_else(|| rsv_core::Error::Other(format!("reservation {} vanished after insert", id)))?;
    info!(reservation_id = id, scenario_id = req.scenario_id, "Reservation created");

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Change the status of a reservation (approve, reject, cancel).
///
/// Rejected and cancelled reservations stop blocking their interval.
pub async fn set_reservation_status(
    State(state): State<AppState>,
    Path(reservation_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Reservation>> {
    let store = state.store.lock().await;
    if !store.set_reservation_status(reservation_id, req.status)? {
        return Err(ApiError::NotFound(format!("reservation {}", reservation_id)));
    }
    let reservation = store
        .get_reservation(reservation_id)?
        .ok_or_else(|| ApiError::NotFound(format!("reservation {}", reservation_id)))?;
    info!(reservation_id, status = %req.status, "Reservation status changed");

    Ok(Json(reservation))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use axum::Router;
    use chrono::{Datelike, Duration};
    use rsv_core::Config;
    use rsv_engine::{AvailabilityChecker, SharedStore};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::server::{app, AppState};

    fn test_app() -> (Router, SharedStore) {
        let mut config = Config::default();
        config.preview.window_pause_ms = 0;
        let store = SharedStore::in_memory().unwrap();
        let checker = AvailabilityChecker::new(Arc::new(store.clone()));
        (app(AppState::new(config, store.clone(), checker)), store)
    }

    /// First Monday at least a week ahead, so requests are never in the past
    fn next_monday() -> chrono::NaiveDate {
        let mut day = chrono::Local::now().date_naive() + Duration::days(7);
        while day.weekday() != chrono::Weekday::Mon {
            day += Duration::days(1);
        }
        day
    }

    fn weekly_spec() -> Value {
        let monday = next_monday();
        json!({
            "scenarioId": 4,
            "pattern": "WEEKLY",
            "startDate": monday.to_string(),
            "endDate": (monday + Duration::days(14)).to_string(),
            "startTime": "08:00:00",
            "endTime": "10:00:00",
            "daysOfWeek": [1, 3, 5]
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response<Body> {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app();
        let response = send(&app, "GET", "/health", None).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_preview_then_commit() {
        let (app, _) = test_app();
        let monday = next_monday();

        // Wednesday of the first week is taken
        let taken = json!({
            "scenarioId": 4,
            "startAt": format!("{}T09:00:00", monday + Duration::days(2)),
            "endAt": format!("{}T11:00:00", monday + Duration::days(2)),
            "status": "approved"
        });
        let response = send(&app, "POST", "/api/reservations", Some(taken)).await;
        assert_eq!(response.status(), 201);

        let response = send(&app, "POST", "/api/recurrences/preview", Some(weekly_spec())).await;
        assert_eq!(response.status(), 200);
        let preview = json_body(response).await;
        assert_eq!(preview["occurrences"].as_array().unwrap().len(), 7);
        assert_eq!(preview["totalToGenerate"], 6);
        assert_eq!(preview["conflicts"].as_array().unwrap().len(), 1);

        let response = send(&app, "POST", "/api/recurrences/commit", Some(json!({ "preview": preview.clone() }))).await;
        assert_eq!(response.status(), 200);
        let result = json_body(response).await;
        assert_eq!(result["occurrencesCreated"], 6);
        assert_eq!(result["skippedConflicts"], 1);
        let series_id = result["seriesId"].as_i64().unwrap();

        // committing again is a no-op
        let response = send(&app, "POST", "/api/recurrences/commit", Some(json!({ "preview": preview }))).await;
        assert_eq!(json_body(response).await["occurrencesCreated"], 0);

        let response = send(&app, "GET", &format!("/api/series/{}/reservations", series_id), None).await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 6);

        let response = send(&app, "GET", "/api/scenarios/4/series", None).await;
        let listed = json_body(response).await;
        assert_eq!(listed[0]["id"], series_id);
        assert_eq!(listed[0]["state"], "ACTIVE");
    }

    #[tokio::test]
    async fn test_preview_validation_errors() {
        let (app, _) = test_app();
        let mut spec = weekly_spec();
        spec["daysOfWeek"] = json!([]);
        spec["endTime"] = json!("07:00:00");

        let response = send(&app, "POST", "/api/recurrences/preview", Some(spec)).await;
        assert_eq!(response.status(), 422);
        let body = json_body(response).await;
        let fields: Vec<&str> = body["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"daysOfWeek"));
        assert!(fields.contains(&"endTime"));
    }

    #[tokio::test]
    async fn test_commit_with_edited_spec_is_conflict() {
        let (app, _) = test_app();
        let response = send(&app, "POST", "/api/recurrences/preview", Some(weekly_spec())).await;
        let preview = json_body(response).await;

        let mut edited = weekly_spec();
        edited["daysOfWeek"] = json!([2]);
        let response = send(
            &app,
            "POST",
            "/api/recurrences/commit",
            Some(json!({ "spec": edited, "preview": preview })),
        )
        .await;
        assert_eq!(response.status(), 409);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("Stale preview"));
    }

    #[tokio::test]
    async fn test_series_lifecycle() {
        let (app, _) = test_app();
        let response = send(&app, "POST", "/api/recurrences/preview", Some(weekly_spec())).await;
        let preview = json_body(response).await;
        let response = send(&app, "POST", "/api/recurrences/commit", Some(json!({ "preview": preview.clone() }))).await;
        let series_id = json_body(response).await["seriesId"].as_i64().unwrap();

        let response = send(&app, "POST", &format!("/api/series/{}/deactivate", series_id), None).await;
        assert_eq!(json_body(response).await["state"], "INACTIVE");

        let response = send(&app, "POST", "/api/recurrences/commit", Some(json!({ "preview": preview }))).await;
        assert_eq!(response.status(), 409);

        let response = send(&app, "POST", &format!("/api/series/{}/activate", series_id), None).await;
        let view = json_body(response).await;
        assert_eq!(view["state"], "ACTIVE");
        assert_eq!(view["canGenerateMore"], true);

        let response = send(&app, "GET", "/api/series/999", None).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_availability_endpoints() {
        let (app, _) = test_app();
        let day = next_monday();
        let booking = json!({
            "scenarioId": 9,
            "startAt": format!("{}T13:00:00", day),
            "endAt": format!("{}T14:00:00", day),
        });
        assert_eq!(send(&app, "POST", "/api/reservations", Some(booking.clone())).await.status(), 201);

        // pending reservations block too
        assert_eq!(send(&app, "POST", "/api/reservations", Some(booking)).await.status(), 409);

        let check = json!({
            "scenarioId": 9,
            "startAt": format!("{}T13:30:00", day),
            "endAt": format!("{}T15:00:00", day),
        });
        let body = json_body(send(&app, "POST", "/api/availability", Some(check)).await).await;
        assert_eq!(body["available"], false);
        assert_eq!(body["conflicts"].as_array().unwrap().len(), 1);

        // touching intervals do not overlap
        let uri = format!("/api/scenarios/9/availability?startAt={d}T14:00:00&endAt={d}T15:00:00", d = day);
        let body = json_body(send(&app, "GET", &uri, None).await).await;
        assert_eq!(body["available"], true);
        assert!(body["conflictingReservations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_reservation_frees_the_slot() {
        let (app, _) = test_app();
        let day = next_monday();
        let booking = json!({
            "scenarioId": 5,
            "startAt": format!("{}T08:00:00", day),
            "endAt": format!("{}T09:00:00", day),
            "status": "approved"
        });
        let created = json_body(send(&app, "POST", "/api/reservations", Some(booking.clone())).await).await;
        let id = created["id"].as_i64().unwrap();
        assert_eq!(send(&app, "POST", "/api/reservations", Some(booking.clone())).await.status(), 409);

        let uri = format!("/api/reservations/{}/status", id);
        let updated = json_body(send(&app, "POST", &uri, Some(json!({ "status": "cancelled" }))).await).await;
        assert_eq!(updated["status"], "cancelled");
        assert_eq!(send(&app, "POST", "/api/reservations", Some(booking)).await.status(), 201);

        let response = send(&app, "POST", "/api/reservations/999/status", Some(json!({ "status": "approved" }))).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_concurrent_overlapping_bookings_keep_one() {
        let (app, store) = test_app();
        let day = next_monday();
        let booking = |from: u32, to: u32| {
            json!({
                "scenarioId": 12,
                "startAt": format!("{}T{:02}:00:00", day, from),
                "endAt": format!("{}T{:02}:00:00", day, to),
                "status": "approved"
            })
        };

        let (a, b) = tokio::join!(
            send(&app, "POST", "/api/reservations", Some(booking(9, 11))),
            send(&app, "POST", "/api/reservations", Some(booking(10, 12))),
        );
        let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
        statuses.sort_unstable();
        assert_eq!(statuses, vec![201, 409]);

        let start = day.and_hms_opt(0, 0, 0).unwrap();
        let end = day.and_hms_opt(23, 0, 0).unwrap();
        let stored = store
            .lock()
            .await
            .find_overlapping(12, &rsv_core::TimeInterval::new(start, end))
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_reversed_interval_is_rejected() {
        let (app, _) = test_app();
        let day = next_monday();
        let check = json!({
            "scenarioId": 1,
            "startAt": format!("{}T15:00:00", day),
            "endAt": format!("{}T14:00:00", day),
        });
        let response = send(&app, "POST", "/api/availability", Some(check)).await;
        assert_eq!(response.status(), 422);
    }
}
