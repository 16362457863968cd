//! Wire models for the staff API.

pub mod device;
pub mod notification;
pub mod room;
pub mod service_request;
pub mod user;

pub use device::{DeviceRegistration, Platform};
pub use notification::{NotificationItem, NotificationsResponse};
pub use room::{NewRoom, Room, RoomResponse, RoomsResponse};
pub use service_request::{
    AssignedStaff, RequestFilters, RequestRoom, ServiceRequest, ServiceRequestResponse,
    ServiceRequestsResponse,
};
pub use user::{LoginRequest, LoginResponse, ProfileResponse, SessionIdentity};

use serde::Deserialize;

/// Generic `{success, message?}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}
