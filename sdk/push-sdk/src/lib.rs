pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod sdk;
pub mod services;
pub mod session;

pub use config::SdkConfig;
pub use error::{Result, SdkError};
pub use models::*;
pub use sdk::PushSdk;
pub use services::{BackgroundFetcher, NotificationDelegate, StateStore};
pub use session::Session;
