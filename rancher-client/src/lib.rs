//! Rancher API client
//!
//! Typed snapshots of Rancher v2-beta resources and the [`RancherApi`] seam
//! the provider drivers are written against.
//!
//! ## Module Structure
//!
//! - `api` - The `RancherApi` trait and request `Scope`
//! - `http` - reqwest-backed implementation
//! - `types` - Resource snapshots and collection pages
//! - `mock` - Scripted in-memory implementation (feature `mock`)

pub mod api;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod types;

pub use api::{RancherApi, Scope};
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
