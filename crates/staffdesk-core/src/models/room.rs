use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub room_number: String,
    pub room_type: String,
    pub access_code: String,
    pub hotel_id: String,
    pub is_occupied: bool,
    #[serde(default)]
    pub current_booking_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /rooms`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub room_number: String,
    pub room_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomsResponse {
    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoomResponse {
    pub room: Room,
}
