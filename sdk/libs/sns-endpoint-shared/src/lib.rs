/// SNS Endpoint Shared Library
///
/// This library provides the platform-endpoint side of mobile push delivery:
/// turning a device token into an Amazon SNS platform endpoint and keeping
/// that endpoint's token current.
///
/// It handles:
/// - Platform endpoint creation, lookup, update and deletion
/// - Classification of provider failures into transient and permanent kinds
/// - Recovery of the existing endpoint when SNS refuses a duplicate creation
/// - An in-process provider for local development and tests
pub mod client;
pub mod errors;
pub mod memory;
pub mod models;
pub mod provider;

pub use client::SnsEndpointClient;
pub use errors::EndpointError;
pub use memory::{CallCounts, InMemoryEndpointProvider};
pub use models::EndpointAttributes;
pub use provider::{token_prefix, DynEndpointProvider, EndpointProvider};
