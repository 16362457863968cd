use serde::{Deserialize, Serialize};

use super::Platform;

/// Role assumed for a restored session that could not be checked with the server.
pub const PLACEHOLDER_ROLE: &str = "hotel_staff";

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub role: String,
    #[serde(rename = "hotelId", default)]
    pub hotel_id: Option<String>,
}

impl SessionIdentity {
    /// Stand-in identity for a session restored without server confirmation.
    pub fn placeholder() -> Self {
        Self {
            id: "pending".to_string(),
            role: PLACEHOLDER_ROLE.to_string(),
            hotel_id: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id == "pending"
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Body of `POST /mobile/login`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_token: Option<&'a str>,
    pub platform: Platform,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "tokenType", default)]
    pub token_type: Option<String>,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    pub user: SessionIdentity,
}

/// Profile endpoint reply; accepts both `{user: {...}}` and a bare identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProfileResponse {
    Wrapped { user: SessionIdentity },
    Bare(SessionIdentity),
}

impl ProfileResponse {
    pub fn into_identity(self) -> SessionIdentity {
        match self {
            ProfileResponse::Wrapped { user } => user,
            ProfileResponse::Bare(user) => user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_response() {
        let json = r#"{"tokenType":"Bearer","accessToken":"A1","refreshToken":"R1","user":{"id":"u-1","role":"hotel_staff","hotelId":"h-9"}}"#;
        let resp: LoginResponse = serde_json::from_str(json).expect("Failed to parse login test JSON");
        assert_eq!(resp.access_token, "A1");
        assert_eq!(resp.refresh_token, "R1");
        assert_eq!(resp.user.hotel_id.as_deref(), Some("h-9"));
    }

    #[test]
    fn test_numeric_user_id() {
        let json = r#"{"id":42,"role":"hotel_admin","hotelId":null}"#;
        let user: SessionIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "42");
        assert_eq!(user.hotel_id, None);
    }

    #[test]
    fn test_login_request_omits_missing_device_token() {
        let req = LoginRequest {
            email: "a@b.c",
            password: "pw",
            device_token: None,
            platform: Platform::Android,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@b.c", "password": "pw", "platform": "android"}));
    }

    #[test]
    fn test_profile_response_shapes() {
        let wrapped: ProfileResponse =
            serde_json::from_str(r#"{"success":true,"user":{"id":"u1","role":"hotel_staff"}}"#).unwrap();
        assert_eq!(wrapped.into_identity().id, "u1");

        let bare: ProfileResponse = serde_json::from_str(r#"{"id":"u2","role":"hotel_admin"}"#).unwrap();
        assert_eq!(bare.into_identity().role, "hotel_admin");
    }
}
