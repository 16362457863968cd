use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: String,
    pub title: String,
    pub priority: String,
    pub status: String,
    pub room: RequestRoom,
    #[serde(rename = "requestedAt")]
    pub requested_at: DateTime<Utc>,
    #[serde(rename = "assignedStaff", default)]
    pub assigned_staff: Option<AssignedStaff>,
}

impl ServiceRequest {
    pub fn assignee_display(&self) -> &str {
        self.assigned_staff
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("Unassigned")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRoom {
    #[serde(rename = "roomNumber")]
    pub room_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignedStaff {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRequestsResponse {
    #[serde(rename = "serviceRequests", default)]
    pub service_requests: Vec<ServiceRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRequestResponse {
    #[serde(rename = "serviceRequest")]
    pub service_request: ServiceRequest,
}

/// Optional server-side filters for the service request list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFilters {
    pub status: Option<String>,
    pub priority: Option<String>,
}

impl RequestFilters {
    /// Query string including the leading `?`, or empty when no filter is set.
    pub fn query_string(&self) -> String {
        let params: Vec<String> = [("status", &self.status), ("priority", &self.priority)]
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{}={}", name, urlencoding::encode(v)))
            })
            .collect();

        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string() {
        assert_eq!(RequestFilters::default().query_string(), "");

        let filters = RequestFilters {
            status: Some("pending".into()),
            priority: None,
        };
        assert_eq!(filters.query_string(), "?status=pending");

        let filters = RequestFilters {
            status: Some("in progress".into()),
            priority: Some("high".into()),
        };
        assert_eq!(filters.query_string(), "?status=in%20progress&priority=high");
    }

    #[test]
    fn test_parse_service_requests() {
        let json = r#"{"success":true,"serviceRequests":[{"id":"sr1","title":"Extra towels","priority":"low","status":"pending","room":{"roomNumber":"204"},"requestedAt":"2024-05-01T10:15:00.000Z","assignedStaff":null}]}"#;
        let resp: ServiceRequestsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.service_requests.len(), 1);
        let req = &resp.service_requests[0];
        assert_eq!(req.room.room_number, "204");
        assert_eq!(req.assignee_display(), "Unassigned");
    }
}
