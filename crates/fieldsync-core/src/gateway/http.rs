//! HTTP implementation of the remote gateways.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{CalendarGateway, NotificationGateway};
use crate::config::ClientConfig;
use crate::error::{Error, GatewayError, GatewayResult, Result, ServiceError};
use crate::models::{
    CalendarData, CalendarEvent, EventDraft, EventFilters, EventPatch, EventStatus, ExportFormat,
    Notification, NotificationDraft, NotificationFilters, NotificationPatch,
    NotificationPreferences, NotificationSummary, TimeRange,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// JSON-over-HTTP gateway for both entity families.
///
/// The request timeout applies to every call; a timeout surfaces as a
/// transport error.
#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Config(format!("failed to construct HTTP client: {error}")))?;
        Ok(Self {
            base_url,
            token: normalize_text_option(token),
            client,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config
            .api_base_url()
            .ok_or_else(|| Error::Config("api_base_url is not configured".to_string()))?;
        Self::new(base_url, config.api_token.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One-shot reachability check against `GET /v1/health`.
    ///
    /// Any HTTP answer counts as reachable; only transport faults do not.
    pub async fn probe(&self) -> bool {
        let result = self
            .request(Method::GET, "/v1/health")
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(response) => {
                tracing::debug!("Health probe answered with HTTP {}", response.status());
                true
            }
            Err(error) => {
                tracing::debug!("Health probe failed: {error}");
                false
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(request: RequestBuilder) -> GatewayResult<reqwest::Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Service(parse_api_error(status, &body)))
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> GatewayResult<T> {
        let response = Self::send(request).await?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|error| {
            GatewayError::Service(
                ServiceError::new(format!("invalid response payload: {error}"))
                    .with_code("invalid_payload")
                    .with_status(status.as_u16()),
            )
        })
    }

    async fn send_empty(request: RequestBuilder) -> GatewayResult<()> {
        Self::send(request).await.map(|_| ())
    }
}

fn entity_path(collection: &str, id: &str) -> String {
    format!("/v1/{collection}/{}", urlencoding::encode(id))
}

fn range_query(range: &TimeRange) -> [(&'static str, String); 2] {
    [
        ("start", range.start.to_rfc3339()),
        ("end", range.end.to_rfc3339()),
    ]
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

impl NotificationGateway for HttpGateway {
    async fn list_notifications(
        &self,
        filters: &NotificationFilters,
    ) -> GatewayResult<Vec<Notification>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = filters.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(kind) = filters.notification_type {
            query.push(("type", kind.as_str().to_string()));
        }
        if let Some(priority) = filters.priority {
            query.push(("priority", priority.as_str().to_string()));
        }
        if filters.unread_only {
            query.push(("unread_only", "true".to_string()));
        }
        if let Some(limit) = filters.limit {
            query.push(("limit", limit.to_string()));
        }
        Self::send_json(self.request(Method::GET, "/v1/notifications").query(&query)).await
    }

    async fn get_notification(&self, id: &str) -> GatewayResult<Notification> {
        Self::send_json(self.request(Method::GET, &entity_path("notifications", id))).await
    }

    async fn create_notification(
        &self,
        draft: &NotificationDraft,
        idempotency_key: &str,
    ) -> GatewayResult<Notification> {
        Self::send_json(
            self.request(Method::POST, "/v1/notifications")
                .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
                .json(draft),
        )
        .await
    }

    async fn update_notification(
        &self,
        id: &str,
        patch: &NotificationPatch,
    ) -> GatewayResult<Notification> {
        Self::send_json(
            self.request(Method::PATCH, &entity_path("notifications", id))
                .json(patch),
        )
        .await
    }

    async fn delete_notification(&self, id: &str) -> GatewayResult<()> {
        Self::send_empty(self.request(Method::DELETE, &entity_path("notifications", id))).await
    }

    async fn mark_as_read(&self, id: &str) -> GatewayResult<Notification> {
        let path = format!("{}/read", entity_path("notifications", id));
        Self::send_json(self.request(Method::POST, &path)).await
    }

    async fn mark_as_dismissed(&self, id: &str) -> GatewayResult<Notification> {
        let path = format!("{}/dismiss", entity_path("notifications", id));
        Self::send_json(self.request(Method::POST, &path)).await
    }

    async fn mark_all_as_read(&self) -> GatewayResult<u64> {
        let response: CountResponse =
            Self::send_json(self.request(Method::POST, "/v1/notifications/read-all")).await?;
        Ok(response.count)
    }

    async fn clear_all(&self) -> GatewayResult<u64> {
        let response: CountResponse =
            Self::send_json(self.request(Method::DELETE, "/v1/notifications")).await?;
        Ok(response.count)
    }

    async fn notification_summary(&self) -> GatewayResult<NotificationSummary> {
        Self::send_json(self.request(Method::GET, "/v1/notifications/summary")).await
    }

    async fn get_preferences(&self) -> GatewayResult<NotificationPreferences> {
        Self::send_json(self.request(Method::GET, "/v1/notifications/preferences")).await
    }

    async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> GatewayResult<NotificationPreferences> {
        Self::send_json(
            self.request(Method::PUT, "/v1/notifications/preferences")
                .json(preferences),
        )
        .await
    }

    async fn subscribe(&self, topic: &str) -> GatewayResult<()> {
        Self::send_empty(
            self.request(Method::POST, "/v1/notifications/subscriptions")
                .json(&serde_json::json!({ "topic": topic })),
        )
        .await
    }

    async fn unsubscribe(&self, topic: &str) -> GatewayResult<()> {
        Self::send_empty(self.request(
            Method::DELETE,
            &entity_path("notifications/subscriptions", topic),
        ))
        .await
    }
}

impl CalendarGateway for HttpGateway {
    async fn list_events(&self, filters: &EventFilters) -> GatewayResult<Vec<CalendarEvent>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = filters.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(range) = &filters.range {
            query.extend(range_query(range));
        }
        if let Some(limit) = filters.limit {
            query.push(("limit", limit.to_string()));
        }
        Self::send_json(self.request(Method::GET, "/v1/events").query(&query)).await
    }

    async fn get_event(&self, id: &str) -> GatewayResult<CalendarEvent> {
        Self::send_json(self.request(Method::GET, &entity_path("events", id))).await
    }

    async fn create_event(
        &self,
        draft: &EventDraft,
        idempotency_key: &str,
    ) -> GatewayResult<CalendarEvent> {
        Self::send_json(
            self.request(Method::POST, "/v1/events")
                .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
                .json(draft),
        )
        .await
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> GatewayResult<CalendarEvent> {
        Self::send_json(self.request(Method::PATCH, &entity_path("events", id)).json(patch)).await
    }

    async fn delete_event(&self, id: &str) -> GatewayResult<()> {
        Self::send_empty(self.request(Method::DELETE, &entity_path("events", id))).await
    }

    async fn update_event_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> GatewayResult<CalendarEvent> {
        let path = format!("{}/status", entity_path("events", id));
        Self::send_json(
            self.request(Method::PATCH, &path)
                .json(&serde_json::json!({ "status": status })),
        )
        .await
    }

    async fn check_conflicts(
        &self,
        range: &TimeRange,
        exclude_id: Option<&str>,
    ) -> GatewayResult<Vec<CalendarEvent>> {
        Self::send_json(
            self.request(Method::POST, "/v1/events/conflicts")
                .json(&serde_json::json!({
                    "start": range.start,
                    "end": range.end,
                    "exclude_id": exclude_id,
                })),
        )
        .await
    }

    async fn calendar_data(&self, range: &TimeRange) -> GatewayResult<CalendarData> {
        Self::send_json(
            self.request(Method::GET, "/v1/calendar")
                .query(&range_query(range)),
        )
        .await
    }

    async fn import_events(&self, drafts: &[EventDraft]) -> GatewayResult<Vec<CalendarEvent>> {
        Self::send_json(
            self.request(Method::POST, "/v1/events/import")
                .json(&serde_json::json!({ "events": drafts })),
        )
        .await
    }

    async fn export_events(
        &self,
        range: &TimeRange,
        format: ExportFormat,
    ) -> GatewayResult<String> {
        let mut query = range_query(range).to_vec();
        query.push(("format", format.as_str().to_string()));
        let response = Self::send(self.request(Method::GET, "/v1/events/export").query(&query))
            .await?;
        response.text().await.map_err(transport_error)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    code: Option<String>,
}

/// Map a non-success response to a service error.
fn parse_api_error(status: StatusCode, body: &str) -> ServiceError {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let error = ServiceError::new(message.trim()).with_status(status.as_u16());
            return match payload.code {
                Some(code) => error.with_code(code),
                None => error,
            };
        }
    }

    let trimmed = compact_text(body);
    let message = if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    };
    ServiceError::new(message).with_status(status.as_u16())
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Transport(format!("request timed out: {error}"))
    } else {
        GatewayError::Transport(error.to_string())
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let base_url = normalize_text_option(Some(raw.to_string()))
        .ok_or_else(|| Error::Config("API base URL must not be empty".to_string()))?;
    if !is_http_url(&base_url) {
        return Err(Error::Config(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(base_url.trim_end_matches('/').to_string())
}
