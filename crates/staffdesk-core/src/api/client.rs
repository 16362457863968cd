//! API client for the hotel staff REST API.
//!
//! `ApiClient` is the request executor: it attaches the current access token,
//! classifies 401 responses, and on an expired token delegates to the
//! `RefreshCoordinator` before replaying the request exactly once.

use std::time::Duration;

use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::models::{
    DeviceRegistration, LoginRequest, LoginResponse, NewRoom, NotificationItem,
    NotificationsResponse, Platform, RequestFilters, Room, RoomResponse, RoomsResponse,
    ServiceRequest, ServiceRequestResponse, ServiceRequestsResponse, SuccessResponse,
};

use super::error::{auth_reason, truncate_body, Unauthorized};
use super::{ApiError, RefreshCoordinator};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/mobile/login";
const DEVICE_TOKENS_PATH: &str = "/notifications/device-tokens";

/// Default page size for the notification feed.
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 20;

/// One API call, kept intact so it can be replayed after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// API client for the staff backend.
/// Clone is cheap - reqwest::Client and the token stores are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: CredentialStore,
    refresher: RefreshCoordinator,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://host:3000/api`).
    pub fn new(base_url: &str, timeout: Duration, credentials: CredentialStore) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let refresher = RefreshCoordinator::new(client.clone(), &base_url, credentials.clone());

        Ok(Self {
            client,
            base_url,
            credentials,
            refresher,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid access token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url(&request.path);
        debug!(method = %request.method, url = %url, "HTTP request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(Self::auth_headers(token)?);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Turn a response into the declared result type, or an error.
    async fn finish<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = %status, body = %truncate_body(&body), "HTTP error");
            return Err(ApiError::from_status(status, &body));
        }
        Self::decode(&body)
    }

    /// Empty bodies decode as JSON `null` so acks can be read as `Value` or `()`.
    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        let text = if body.trim().is_empty() { "null" } else { body };
        serde_json::from_str(text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Execute an authenticated request.
    ///
    /// A 401 carrying the expiry sentinel triggers one refresh and one replay
    /// of the identical request; the replay's outcome is returned as is.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let sent_with = self.credentials.access_token().await;
        let response = self.send(request, sent_with.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::finish(response).await;
        }

        let body = response.text().await?;
        match Unauthorized::classify(&body) {
            Unauthorized::Denied(reason) => {
                warn!(path = %request.path, reason = %reason, "Request not authorized");
                Err(ApiError::AuthInvalid(reason))
            }
            Unauthorized::Expired => {
                if !self.recover_expired(sent_with.as_deref()).await {
                    warn!(path = %request.path, "Access token expired and could not be refreshed");
                    return Err(ApiError::AuthInvalid(auth_reason(&body)));
                }

                let token = self.credentials.access_token().await;
                debug!(path = %request.path, "Replaying request with refreshed token");
                let replay = self.send(request, token.as_deref()).await?;
                Self::finish(replay).await
            }
        }
    }

    /// Get a usable access token after an expiry, refreshing if needed.
    async fn recover_expired(&self, sent_with: Option<&str>) -> bool {
        let current = self.credentials.access_token().await;
        if current.is_some() && current.as_deref() != sent_with {
            // Someone else refreshed while this request was on the wire.
            debug!("Access token already refreshed");
            return true;
        }
        self.refresher.refresh().await
    }

    /// Execute without credentials and without refresh handling.
    pub async fn execute_public<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request, None).await?;
        Self::finish(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(&ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.execute(&ApiRequest::new(Method::POST, path).json(body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.execute(&ApiRequest::new(Method::PATCH, path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.execute(&ApiRequest::new(Method::PUT, path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(&ApiRequest::delete(path)).await
    }

    // ===== Session Endpoints =====

    /// Exchange email/password for a token pair and the user identity.
    pub async fn login(&self, request: &LoginRequest<'_>) -> Result<LoginResponse, ApiError> {
        self.execute_public(&ApiRequest::new(Method::POST, LOGIN_PATH).json(request)?)
            .await
    }

    pub async fn register_device_token(&self, device_token: &str, platform: Platform) -> Result<Value, ApiError> {
        let body = DeviceRegistration {
            device_token: device_token.to_string(),
            platform,
        };
        self.post(DEVICE_TOKENS_PATH, &body).await
    }

    pub async fn deregister_device_token(&self, device_token: &str) -> Result<Value, ApiError> {
        let path = format!("{}?deviceToken={}", DEVICE_TOKENS_PATH, urlencoding::encode(device_token));
        self.delete(&path).await
    }

    // ===== Service Requests =====

    pub async fn fetch_requests(&self, filters: &RequestFilters) -> Result<Vec<ServiceRequest>, ApiError> {
        let path = format!("/staff/service-requests{}", filters.query_string());
        let response: ServiceRequestsResponse = self.get(&path).await?;
        Ok(response.service_requests)
    }

    pub async fn update_request_status(&self, request_id: &str, status: &str) -> Result<ServiceRequest, ApiError> {
        let body = json!({ "requestId": request_id, "status": status });
        let response: ServiceRequestResponse = self.patch("/staff/service-requests", &body).await?;
        Ok(response.service_request)
    }

    pub async fn delete_request(&self, request_id: &str) -> Result<bool, ApiError> {
        let path = format!("/staff/service-requests?requestId={}", urlencoding::encode(request_id));
        let response: SuccessResponse = self.delete(&path).await?;
        Ok(response.success)
    }

    /// Delete every service request raised from a room.
    pub async fn delete_requests_for_room(&self, room_id: &str) -> Result<bool, ApiError> {
        let path = format!("/staff/service-requests?roomId={}", urlencoding::encode(room_id));
        let response: SuccessResponse = self.delete(&path).await?;
        if let Some(message) = response.message.as_deref() {
            debug!(room_id, message, "Deleted room requests");
        }
        Ok(response.success)
    }

    // ===== Rooms =====

    pub async fn fetch_rooms(&self) -> Result<Vec<Room>, ApiError> {
        let response: RoomsResponse = self.get("/rooms").await?;
        Ok(response.rooms)
    }

    pub async fn create_room(&self, room: &NewRoom) -> Result<Room, ApiError> {
        let response: RoomResponse = self.post("/rooms", room).await?;
        Ok(response.room)
    }

    pub async fn fetch_room(&self, room_id: &str) -> Result<Room, ApiError> {
        let path = format!("/rooms/{}", urlencoding::encode(room_id));
        let response: RoomResponse = self.get(&path).await?;
        Ok(response.room)
    }

    // ===== Notifications =====

    pub async fn fetch_notifications(&self, limit: u32) -> Result<Vec<NotificationItem>, ApiError> {
        let response: NotificationsResponse = self.get(&format!("/notifications?limit={}", limit)).await?;
        Ok(response.notifications)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Value, ApiError> {
        self.patch("/notifications", &json!({ "notificationId": notification_id }))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Value, ApiError> {
        self.patch("/notifications", &json!({ "markAllAsRead": true })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_body_as_null() {
        let value: Value = ApiClient::decode("").unwrap();
        assert_eq!(value, Value::Null);
        ApiClient::decode::<()>("  ").unwrap();
    }

    #[test]
    fn test_decode_mismatch_is_invalid_response() {
        let err = ApiClient::decode::<RoomsResponse>(r#"{"rooms": 3}"#).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_auth_headers() {
        let headers = ApiClient::auth_headers(Some("A1")).unwrap();
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer A1");
        assert!(ApiClient::auth_headers(None).unwrap().is_empty());
        assert!(matches!(
            ApiClient::auth_headers(Some("bad\ntoken")),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_descriptor() {
        let req = ApiRequest::new(Method::PATCH, "/notifications")
            .json(&json!({"markAllAsRead": true}))
            .unwrap();
        assert_eq!(req.method(), &Method::PATCH);
        assert_eq!(req.path(), "/notifications");
        assert_eq!(req.body(), Some(&json!({"markAllAsRead": true})));
        assert_eq!(ApiRequest::get("/rooms").body(), None);
    }

    #[tokio::test]
    async fn test_base_url_trailing_slash_is_stripped() {
        let client = ApiClient::new(
            "http://localhost:3000/api/",
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
            CredentialStore::in_memory(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api");
        assert_eq!(client.url("/rooms"), "http://localhost:3000/api/rooms");
    }
}
