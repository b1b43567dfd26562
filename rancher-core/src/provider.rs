//! Provider - Trait abstracting resource operations
//!
//! A Provider maps host-issued lifecycle calls (create, read, update, delete,
//! import) onto a remote API. Every operation runs to completion, including
//! any convergence wait, before its future resolves.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Broad category of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Non-success response from the remote API
    Api,
    /// Timeout, unexpected status, or not-found exhaustion while waiting
    Convergence,
    /// Declared attributes are structurally invalid; raised before any remote call
    Validation,
    /// A dependency of the resource is not provisioned yet
    MissingDependency,
    /// Provider configuration could not be resolved
    Configuration,
    /// Operation is not supported for this resource type
    Unsupported,
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub kind: ErrorKind,
    pub resource_id: Option<ResourceId>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::Api,
            resource_id: None,
            cause: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Validation)
    }

    pub fn convergence(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Convergence)
    }

    pub fn missing_dependency(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::MissingDependency)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Configuration)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Unsupported)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach the resource id unless one is already set
    pub fn or_resource(mut self, id: &ResourceId) -> Self {
        if self.resource_id.is_none() {
            self.resource_id = Some(id.clone());
        }
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "rancher_stack")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }

    /// Whether this type is a read-only lookup rather than a managed resource
    fn is_data_source(&self) -> bool {
        false
    }
}

/// Main Provider trait
///
/// All operations are async and involve side effects on the remote system.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "rancher")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// Managed resources are read by identifier. Data lookups pass `None` and
    /// resolve the entity from the declared attributes (e.g., by name).
    /// Returns `State::not_found()` if the resource no longer exists.
    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the server-assigned id
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource, resolving only once the remote removal is observed
    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Import an existing resource from an external id
    ///
    /// The returned state carries the resolved identifier and the parent
    /// scope attribute; the host follows up with a read.
    fn import(&self, id: &ResourceId, external_id: &str) -> BoxFuture<'_, ProviderResult<State>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).read(resource, identifier)
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).create(resource)
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).update(id, identifier, from, to)
    }

    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        (**self).delete(resource, identifier)
    }

    fn import(&self, id: &ResourceId, external_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        (**self).import(id, external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            resource: &Resource,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("1st5")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete(
            &self,
            _resource: &Resource,
            _identifier: &str,
        ) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn import(
            &self,
            id: &ResourceId,
            external_id: &str,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let external_id = external_id.to_string();
            Box::pin(async move { Ok(State::existing(id, Default::default()).with_identifier(external_id)) })
        }
    }

    #[tokio::test]
    async fn mock_provider_read_returns_not_found() {
        let provider: Box<dyn Provider> = Box::new(MockProvider);
        let resource = Resource::new("test", "example");
        let state = provider.read(&resource, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn mock_provider_create_returns_existing() {
        let provider = MockProvider;
        let resource = Resource::new("test", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier, Some("1st5".to_string()));
    }

    #[test]
    fn error_display_includes_resource() {
        let err = ProviderError::validation("bad policy")
            .for_resource(ResourceId::new("rancher_environment", "prod"));
        assert_eq!(err.to_string(), "[rancher_environment.prod] bad policy");
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn or_resource_keeps_existing_id() {
        let err = ProviderError::new("boom")
            .for_resource(ResourceId::new("a", "1"))
            .or_resource(&ResourceId::new("b", "2"));
        assert_eq!(err.resource_id, Some(ResourceId::new("a", "1")));
    }
}
