//! HTTP client for the HRIS backend and the absences API.
//!
//! Every call is a single request with no retry: failures are mapped to
//! a `FetchCause` and handed back to the caller untouched.

use crate::backend::AggregateSource;
use crate::error::{EngineError, FetchCause};
use crate::models::{
    Anchor, BalanceSimulation, LeaveRegistry, LeaveRegistryId, MomentOfDay, PaidHolidayRequest,
    Period, SimulationRequest, SubjectAggregate, SubmittedLeave, TeamMemberDay, DATE_FORMAT,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the aggregate backend.
    pub base_url: String,
    /// Base URL of the absences API (simulation and submission).
    pub absences_url: String,
    /// Country code sent with leave types and records.
    pub country: String,
    pub timeout_seconds: u64,
    pub authorization_token: Option<String>,
    pub edge_token: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            absences_url: "https://api.dev.payfit.tech/time-absences-api/api/v2".to_string(),
            country: "FR".to_string(),
            timeout_seconds: 30,
            authorization_token: None,
            edge_token: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarRequest<'a> {
    jl_contract_id: &'a str,
    period: Period,
}

#[derive(Debug, Serialize)]
struct TeamRequest {
    date: String,
}

#[derive(Debug, Serialize)]
struct LeaveTypeBody<'a> {
    name: String,
    country: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationBody<'a> {
    contract_id: &'a str,
    leave_type: LeaveTypeBody<'a>,
    months: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRecordBody<'a> {
    country: &'a str,
    #[serde(rename = "type")]
    leave_type: &'static str,
    begin_date: String,
    begin_moment: MomentOfDay,
    end_date: String,
    end_moment: MomentOfDay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionBody<'a> {
    leave_registry_id: &'a str,
    leave_record: LeaveRecordBody<'a>,
}

/// Client for every backend call the assistant makes.
pub struct BackendClient {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl BackendClient {
    /// Create a client with the configured timeout.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn backend_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn absences_url(&self, path: &str) -> String {
        format!("{}{}", self.config.absences_url.trim_end_matches('/'), path)
    }

    /// Attach absences API credentials when configured.
    fn with_credentials(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request;
        if let Some(ref token) = self.config.authorization_token {
            request = request.bearer_auth(token);
        }
        if let Some(ref edge) = self.config.edge_token {
            request = request.header(
                reqwest::header::COOKIE,
                format!("authatedge_dev_token={}", edge),
            );
        }
        request
    }

    /// Send a request and decode a JSON body from a success response.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, FetchCause> {
        let response = request.send().await.map_err(FetchCause::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchCause::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await.map_err(FetchCause::from)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchCause::Decode(e.to_string()))
    }

    /// Current leave registry aggregate of a subject.
    pub async fn leave_registry(&self, subject_id: &str) -> std::result::Result<LeaveRegistry, EngineError> {
        let url = self.backend_url(&format!("/api/leave-registry/{}", subject_id));
        debug!("GET {}", url);

        self.send(self.http_client.get(&url))
            .await
            .map_err(|cause| EngineError::Request {
                operation: "leave registry",
                cause,
            })
    }

    /// Leave registry identifier of a subject.
    pub async fn leave_registry_id(
        &self,
        subject_id: &str,
    ) -> std::result::Result<LeaveRegistryId, EngineError> {
        let url = self.backend_url(&format!("/api/leave-registry/id/{}", subject_id));
        debug!("GET {}", url);

        self.send(self.http_client.get(&url))
            .await
            .map_err(|cause| EngineError::Request {
                operation: "leave registry id",
                cause,
            })
    }

    /// Every team member's day for one date.
    pub async fn team_calendar(
        &self,
        date: NaiveDate,
    ) -> std::result::Result<Vec<TeamMemberDay>, EngineError> {
        let url = self.backend_url("/api/workschedule/team/");
        let body = TeamRequest {
            date: date.format(DATE_FORMAT).to_string(),
        };
        debug!("POST {} for {}", url, body.date);

        self.send(self.http_client.post(&url).json(&body))
            .await
            .map_err(|cause| EngineError::Request {
                operation: "team calendar",
                cause,
            })
    }

    /// Monthly leave balance projections.
    pub async fn balance_simulation(
        &self,
        request: &SimulationRequest,
    ) -> std::result::Result<BalanceSimulation, EngineError> {
        request.validate()?;

        let url = self.absences_url("/absences/leave-type-balance-simulation");
        let body = SimulationBody {
            contract_id: &request.contract_id,
            leave_type: LeaveTypeBody {
                name: request.leave_type.to_string(),
                country: &self.config.country,
            },
            months: &request.months,
        };
        debug!("POST {} for {} month(s)", url, request.months.len());

        self.send(self.with_credentials(self.http_client.post(&url).json(&body)))
            .await
            .map_err(|cause| EngineError::Request {
                operation: "balance simulation",
                cause,
            })
    }

    /// Submit a paid holiday for pre-approval.
    pub async fn submit_paid_holiday(
        &self,
        request: &PaidHolidayRequest,
    ) -> std::result::Result<SubmittedLeave, EngineError> {
        request.validate()?;

        let url = self.absences_url("/absences/preapprove-creation");
        let body = SubmissionBody {
            leave_registry_id: &request.leave_registry_id,
            leave_record: LeaveRecordBody {
                country: &self.config.country,
                leave_type: "fr_conges_payes",
                begin_date: request.begin_date.format(DATE_FORMAT).to_string(),
                begin_moment: request.begin_moment,
                end_date: request.end_date.format(DATE_FORMAT).to_string(),
                end_moment: request.end_moment,
            },
        };
        debug!(
            "POST {} for {}..{}",
            url, body.leave_record.begin_date, body.leave_record.end_date
        );

        self.send(self.with_credentials(self.http_client.post(&url).json(&body)))
            .await
            .map_err(|cause| EngineError::Request {
                operation: "paid holiday submission",
                cause,
            })
    }
}

#[async_trait]
impl AggregateSource for BackendClient {
    async fn fetch_aggregate(
        &self,
        subject_id: &str,
        anchor: &Anchor,
    ) -> std::result::Result<SubjectAggregate, EngineError> {
        let url = self.backend_url(&format!("/api/calendar/{}", subject_id));
        let body = CalendarRequest {
            jl_contract_id: subject_id,
            period: anchor.window(),
        };
        debug!("Fetching {} for anchor {}", subject_id, anchor);

        let result = self.send(self.http_client.post(&url).json(&body)).await;

        match result {
            Ok(aggregate) => Ok(aggregate),
            Err(cause) => {
                warn!("Fetch for {} at {} failed: {}", subject_id, anchor, cause);
                Err(EngineError::FetchFailed {
                    anchor: *anchor,
                    cause,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Granularity, LeaveType};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        BackendClient::new(BackendConfig {
            base_url: server.uri(),
            absences_url: format!("{}/v2", server.uri()),
            timeout_seconds: 5,
            authorization_token: Some("tok".to_string()),
            edge_token: Some("edge".to_string()),
            ..BackendConfig::default()
        })
        .unwrap()
    }

    fn monday() -> Anchor {
        Anchor::new(NaiveDate::from_ymd_opt(2023, 6, 5).unwrap(), Granularity::Week)
    }

    #[tokio::test]
    async fn test_fetch_aggregate_posts_week_window() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/calendar/EMP12345"))
            .and(body_partial_json(json!({
                "jlContractId": "EMP12345",
                "period": {"begin": "2023-06-05", "end": "2023-06-11"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(include_str!("../../fixtures/week_2023-06-05.json")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let aggregate = client.fetch_aggregate("EMP12345", &monday()).await.unwrap();

        assert_eq!(aggregate.history.len(), 3);
        assert_eq!(aggregate.history[0].event_type, "WorkScheduleAssigned");
        assert_eq!(aggregate.data_store["weekStart"], "2023-06-05");
    }

    #[tokio::test]
    async fn test_fetch_aggregate_maps_status_to_fetch_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/calendar/EMP1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_aggregate("EMP1", &monday()).await.unwrap_err();

        assert_eq!(
            err,
            EngineError::FetchFailed {
                anchor: monday(),
                cause: FetchCause::Status {
                    status: 503,
                    body: "maintenance".to_string()
                },
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_aggregate_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_aggregate("EMP1", &monday()).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::FetchFailed {
                cause: FetchCause::Decode(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = BackendClient::new(BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 2,
            ..BackendConfig::default()
        })
        .unwrap();

        let err = client.fetch_aggregate("EMP1", &monday()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::FetchFailed {
                cause: FetchCause::Transport(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_leave_registry_and_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/leave-registry/EMP1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "leaveRegistry": {
                    "getDataStore": {"leaves": []},
                    "getHistory": [
                        {"eventTime": 10, "eventType": "LeaveRegistryCreated", "subjectId": "EMP1", "payload": {}}
                    ]
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/leave-registry/id/EMP1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "leaveRegistryId": "0b8f3f9e-8a59-4c1e-9a43-3d1cbe4a2f10"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let registry = client.leave_registry("EMP1").await.unwrap();
        assert_eq!(registry.leave_registry.history.len(), 1);

        let id = client.leave_registry_id("EMP1").await.unwrap();
        assert_eq!(id.leave_registry_id, "0b8f3f9e-8a59-4c1e-9a43-3d1cbe4a2f10");
    }

    #[tokio::test]
    async fn test_team_calendar() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/workschedule/team/"))
            .and(body_partial_json(json!({"date": "2023-06-07"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"contractId": "EMP1", "name": "Ada", "day": {"slots": []}, "leaves": []},
                {"contractId": "EMP2", "name": "Linus", "day": null, "leaves": [{"type": "fr_rtt"}]}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let team = client
            .team_calendar(NaiveDate::from_ymd_opt(2023, 6, 7).unwrap())
            .await
            .unwrap();

        assert_eq!(team.len(), 2);
        assert_eq!(team[1].name, "Linus");
    }

    #[tokio::test]
    async fn test_balance_simulation_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/absences/leave-type-balance-simulation"))
            .and(header("authorization", "Bearer tok"))
            .and(header("cookie", "authatedge_dev_token=edge"))
            .and(body_partial_json(json!({
                "contractId": "EMP1",
                "leaveType": {"name": "fr_rtt", "country": "FR"},
                "months": ["2024-01"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "monthlySimulations": [
                    {"month": "2024-01", "balanceEstimation": 12.5, "balanceLostEstimation": 0.0}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let simulation = client
            .balance_simulation(&SimulationRequest {
                contract_id: "EMP1".to_string(),
                leave_type: LeaveType::FrRtt,
                months: vec!["2024-01".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(simulation.monthly_simulations[0].balance_estimation, 12.5);
    }

    #[tokio::test]
    async fn test_invalid_simulation_never_hits_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .balance_simulation(&SimulationRequest {
                contract_id: "EMP1".to_string(),
                leave_type: LeaveType::FrCongesPayes,
                months: vec!["January".to_string()],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_submit_paid_holiday() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/absences/preapprove-creation"))
            .and(body_partial_json(json!({
                "leaveRegistryId": "0b8f3f9e-8a59-4c1e-9a43-3d1cbe4a2f10",
                "leaveRecord": {
                    "country": "FR",
                    "type": "fr_conges_payes",
                    "beginDate": "2024-07-01",
                    "beginMoment": "beginning-of-day",
                    "endDate": "2024-07-05",
                    "endMoment": "middle-of-day"
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "leaveRegistryId": "0b8f3f9e-8a59-4c1e-9a43-3d1cbe4a2f10",
                "leaveRecordId": "6f1d2c7e-2b1a-4a39-8d2c-0c2f8f7b9e11"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let submitted = client
            .submit_paid_holiday(&PaidHolidayRequest {
                leave_registry_id: "0b8f3f9e-8a59-4c1e-9a43-3d1cbe4a2f10".to_string(),
                begin_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                begin_moment: MomentOfDay::BeginningOfDay,
                end_date: NaiveDate::from_ymd_opt(2024, 7, 5).unwrap(),
                end_moment: MomentOfDay::MiddleOfDay,
            })
            .await
            .unwrap();

        assert_eq!(submitted.leave_record_id, "6f1d2c7e-2b1a-4a39-8d2c-0c2f8f7b9e11");
    }
}
