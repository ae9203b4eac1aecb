//! Availability over the booking backend's REST API

use async_trait::async_trait;
use reqwest::Client;
use rsv_core::{AvailabilityConfig, TimeInterval};
use tracing::{debug, error};

use super::{AvailabilityReport, AvailabilitySource};
use crate::{EngineError, Result};

const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Calls `GET {base_url}/scenarios/{id}/availability?startAt=..&endAt=..`
pub struct HttpAvailabilitySource {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpAvailabilitySource {
    pub fn new(base_url: impl Into<String>, api_token: Option<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    pub fn from_config(config: &AvailabilityConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or_else(|| EngineError::Backend("availability.base_url is not configured".to_string()))?;
        Self::new(base_url, config.api_token.clone())
    }

    fn availability_url(&self, scenario_id: i64) -> String {
        format!("{}/scenarios/{}/availability", self.base_url, scenario_id)
    }
}

#[async_trait]
impl AvailabilitySource for HttpAvailabilitySource {
    fn name(&self) -> &str {
        "http"
    }

    async fn check_availability(&self, scenario_id: i64, interval: &TimeInterval) -> Result<AvailabilityReport> {
        let url = self.availability_url(scenario_id);
        debug!("Checking availability at: {}", url);

        let mut request = self.client.get(&url).query(&[
            ("startAt", interval.start.format(QUERY_DATETIME_FORMAT).to_string()),
            ("endAt", interval.end.format(QUERY_DATETIME_FORMAT).to_string()),
        ]);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Availability request failed: {} - {}", status, error_text);
            return Err(EngineError::Backend(format!("{} - {}", status, error_text)));
        }

        let report: AvailabilityReport = response.json().await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    fn interval() -> TimeInterval {
        let day = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        TimeInterval::new(day.and_hms_opt(8, 0, 0).unwrap(), day.and_hms_opt(10, 0, 0).unwrap())
    }

    #[test]
    fn test_url_building_trims_slash() {
        let source = HttpAvailabilitySource::new("http://backend/api/", None).unwrap();
        assert_eq!(source.availability_url(4), "http://backend/api/scenarios/4/availability");
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(HttpAvailabilitySource::from_config(&AvailabilityConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_decodes_backend_report() {
        let router = Router::new().route(
            "/api/scenarios/{id}/availability",
            get(
                |Path(id): Path<i64>, Query(q): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    assert_eq!(id, 9);
                    assert_eq!(q.get("startAt").map(String::as_str), Some("2024-01-08T08:00:00"));
                    assert_eq!(q.get("endAt").map(String::as_str), Some("2024-01-08T10:00:00"));
                    let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).unwrap_or("");
                    assert_eq!(auth, "Bearer secret");
                    Json(serde_json::json!({
                        "available": false,
                        "conflictingReservations": [{
                            "id": 31,
                            "startAt": "2024-01-08T09:00:00",
                            "endAt": "2024-01-08T11:00:00",
                            "status": "approved"
                        }]
                    }))
                },
            ),
        );
        let base = serve(router).await;

        let source = HttpAvailabilitySource::new(base, Some("secret".to_string())).unwrap();
        let report = source.check_availability(9, &interval()).await.unwrap();
        assert!(!report.available);
        assert_eq!(report.conflicting_reservations.len(), 1);
        assert_eq!(report.conflicting_reservations[0].id, 31);
    }

    #[tokio::test]
    async fn test_backend_error_status() {
        let router = Router::new().route(
            "/api/scenarios/{id}/availability",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
        let base = serve(router).await;

        let source = HttpAvailabilitySource::new(base, None).unwrap();
        let err = source.check_availability(1, &interval()).await.unwrap_err();
        assert!(matches!(err, EngineError::Backend(ref msg) if msg.contains("maintenance")));
    }
}
