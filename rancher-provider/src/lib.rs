//! Rancher provider
//!
//! Drivers for each Rancher resource kind, the structural normalizers they
//! share, and the [`RancherProvider`] that exposes them to the host.
//!
//! ## Module Structure
//!
//! - `provider` - Host-facing dispatch over [`resources::ResourceKind`]
//! - `drivers` - Create/read/update/delete/import per resource kind
//! - `lifecycle` - Convergence waits and multi-phase teardown
//! - `finder` - Paginated lookup by name
//! - `normalize` - Policy rules, members and compose bundles
//! - `schemas` - Attribute schemas for resources and lookups
//! - `config` - Provider block resolution

pub mod config;
pub mod drivers;
pub mod finder;
pub mod lifecycle;
pub mod normalize;
pub mod provider;
pub mod resources;
pub mod schemas;
pub mod utils;

pub use config::{ProviderConfig, ResolvedConfig};
pub use lifecycle::WaitSettings;
pub use provider::RancherProvider;
