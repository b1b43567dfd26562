//! The remote API seam consumed by the provider drivers

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ClientResult;
use crate::types::{ApiResource, Collection, ListOpts, Template, TemplateVersion};

/// Where a request is addressed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Account-wide endpoint (`/v2-beta`)
    Global,
    /// Endpoint scoped to one environment (`/v2-beta/projects/<id>`)
    Environment(String),
}

impl Scope {
    pub fn environment(id: impl Into<String>) -> Self {
        Scope::Environment(id.into())
    }

    /// Environment scope when `id` is non-empty, global otherwise
    pub fn for_environment(id: &str) -> Self {
        if id.is_empty() {
            Scope::Global
        } else {
            Scope::Environment(id.to_string())
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Environment(id) => write!(f, "environment {}", id),
        }
    }
}

/// CRUD, list and action calls against the Rancher API
///
/// `by_id` maps a missing entity to `Ok(None)`; every other non-success
/// response is an error. Nothing here retries.
#[async_trait]
pub trait RancherApi: Send + Sync {
    async fn by_id<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<Option<T>>;

    /// First page of a collection
    async fn list<T: ApiResource>(
        &self,
        scope: &Scope,
        opts: &ListOpts,
    ) -> ClientResult<Collection<T>>;

    /// Page following `page`, `None` after the last one
    async fn next_page<T: ApiResource>(
        &self,
        page: &Collection<T>,
    ) -> ClientResult<Option<Collection<T>>>;

    async fn create<T, B>(&self, scope: &Scope, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync;

    async fn update<T, B>(&self, scope: &Scope, id: &str, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync;

    async fn delete<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<()>;

    /// Invoke a named action (e.g., `deactivate`, `upgrade`) on one entity
    async fn action<T, R>(
        &self,
        scope: &Scope,
        id: &str,
        action: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<R>
    where
        T: ApiResource,
        R: DeserializeOwned + Send + 'static;

    /// Catalog template by id (`group:name`)
    async fn template(&self, id: &str) -> ClientResult<Template>;

    /// Catalog template version by its version link
    async fn template_version(&self, url: &str) -> ClientResult<TemplateVersion>;
}
