//! Rancher Core
//!
//! Host-boundary types and the convergence engine shared by every resource
//! driver of the Rancher provider.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod wait;
