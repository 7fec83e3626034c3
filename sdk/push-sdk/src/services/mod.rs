pub mod completion;
pub mod endpoint_registrar;
pub mod notification_dispatcher;
pub mod state_store;

pub use completion::CompletionGuard;
pub use endpoint_registrar::EndpointRegistrar;
pub use notification_dispatcher::{BackgroundFetcher, NotificationDelegate, NotificationDispatcher};
pub use state_store::StateStore;
