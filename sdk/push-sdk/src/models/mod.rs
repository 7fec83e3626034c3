mod notification;
mod user;

pub use notification::{BackgroundFetchResult, Notification, NotificationKind, NotificationSet};
pub use user::{DeviceToken, PlatformEndpoint, UserRecord};
