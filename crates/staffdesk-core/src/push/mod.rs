//! Push notification support.
//!
//! - `DeviceTokenRegistrar`: keeps the server's device-token registration in
//!   step with login and logout
//! - `NotificationEvents`: subscribe/unsubscribe hub for incoming pushes

pub mod events;
pub mod registrar;

pub use events::{ListenerId, NotificationEvents, PushEvent, PushNotification};
pub use registrar::{DeviceTokenRegistrar, NoPushTokens, PushTokenProvider};
