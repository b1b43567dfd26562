//! Host-facing provider
//!
//! Resolves each call to a [`ResourceKind`], validates declared attributes
//! against its schema and hands off to the matching driver.

use rancher_client::RancherApi;
use rancher_core::provider::{BoxFuture, Provider, ProviderError, ProviderResult, ResourceType};
use rancher_core::resource::{Resource, ResourceId, State};

use crate::drivers::{
    Ctx, api_key, certificate, environment, host, registration_token, registry,
    registry_credential, secret, setting, stack, volume,
};
use crate::lifecycle::WaitSettings;
use crate::resources::{ResourceKind, resource_types};

pub struct RancherProvider<C> {
    api: C,
    wait: WaitSettings,
}

impl<C: RancherApi> RancherProvider<C> {
    pub fn new(api: C) -> Self {
        Self {
            api,
            wait: WaitSettings::default(),
        }
    }

    pub fn with_wait_settings(mut self, wait: WaitSettings) -> Self {
        self.wait = wait;
        self
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    fn ctx(&self) -> Ctx<'_, C> {
        Ctx {
            api: &self.api,
            wait: &self.wait,
        }
    }

    async fn read_kind(
        &self,
        kind: ResourceKind,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let ctx = self.ctx();
        if kind.is_data_source() {
            validate(kind, resource)?;
            return match kind {
                ResourceKind::EnvironmentLookup => environment::lookup(ctx, resource).await,
                ResourceKind::CertificateLookup => certificate::lookup(ctx, resource).await,
                _ => setting::lookup(ctx, resource).await,
            };
        }

        let Some(identifier) = identifier else {
            return Ok(State::not_found(resource.id.clone()));
        };
        match kind {
            ResourceKind::Environment => environment::read(ctx, resource, identifier).await,
            ResourceKind::Stack => stack::read(ctx, resource, identifier).await,
            ResourceKind::Secret => secret::read(ctx, resource, identifier).await,
            ResourceKind::Volume => volume::read(ctx, resource, identifier).await,
            ResourceKind::ApiKey => api_key::read(ctx, resource, identifier).await,
            ResourceKind::Certificate => certificate::read(ctx, resource, identifier).await,
            ResourceKind::RegistrationToken => {
                registration_token::read(ctx, resource, identifier).await
            }
            ResourceKind::Registry => registry::read(ctx, resource, identifier).await,
            ResourceKind::RegistryCredential => {
                registry_credential::read(ctx, resource, identifier).await
            }
            ResourceKind::Host => host::read(ctx, resource, identifier).await,
            lookup => Err(read_only(lookup, &resource.id)),
        }
    }

    async fn create_kind(&self, kind: ResourceKind, resource: &Resource) -> ProviderResult<State> {
        validate(kind, resource)?;
        let ctx = self.ctx();
        match kind {
            ResourceKind::Environment => environment::create(ctx, resource).await,
            ResourceKind::Stack => stack::create(ctx, resource).await,
            ResourceKind::Secret => secret::create(ctx, resource).await,
            ResourceKind::Volume => volume::create(ctx, resource).await,
            ResourceKind::ApiKey => api_key::create(ctx, resource).await,
            ResourceKind::Certificate => certificate::create(ctx, resource).await,
            ResourceKind::RegistrationToken => registration_token::create(ctx, resource).await,
            ResourceKind::Registry => registry::create(ctx, resource).await,
            ResourceKind::RegistryCredential => registry_credential::create(ctx, resource).await,
            ResourceKind::Host => host::create(ctx, resource).await,
            lookup => Err(read_only(lookup, &resource.id)),
        }
    }

    async fn update_kind(
        &self,
        kind: ResourceKind,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        validate(kind, to)?;
        let ctx = self.ctx();
        match kind {
            ResourceKind::Environment => environment::update(ctx, identifier, to).await,
            ResourceKind::Stack => stack::update(ctx, identifier, from, to).await,
            ResourceKind::Secret => secret::update(ctx, identifier, to).await,
            ResourceKind::Volume => volume::update(ctx, identifier, to).await,
            ResourceKind::ApiKey => api_key::update(ctx, identifier, from, to).await,
            ResourceKind::Certificate => certificate::update(ctx, identifier, to).await,
            ResourceKind::RegistrationToken => {
                registration_token::update(ctx, identifier, to).await
            }
            ResourceKind::Registry => registry::update(ctx, identifier, to).await,
            ResourceKind::RegistryCredential => {
                registry_credential::update(ctx, identifier, to).await
            }
            ResourceKind::Host => host::update(ctx, identifier, to).await,
            lookup => Err(read_only(lookup, &to.id)),
        }
    }

    async fn delete_kind(
        &self,
        kind: ResourceKind,
        resource: &Resource,
        identifier: &str,
    ) -> ProviderResult<()> {
        let ctx = self.ctx();
        match kind {
            ResourceKind::Environment => environment::delete(ctx, identifier).await,
            ResourceKind::Stack => stack::delete(ctx, resource, identifier).await,
            ResourceKind::Secret => secret::delete(ctx, resource, identifier).await,
            ResourceKind::Volume => volume::delete(ctx, resource, identifier).await,
            ResourceKind::ApiKey => api_key::delete(ctx, identifier).await,
            ResourceKind::Certificate => certificate::delete(ctx, resource, identifier).await,
            ResourceKind::RegistrationToken => {
                registration_token::delete(ctx, resource, identifier).await
            }
            ResourceKind::Registry => registry::delete(ctx, resource, identifier).await,
            ResourceKind::RegistryCredential => {
                registry_credential::delete(ctx, resource, identifier).await
            }
            ResourceKind::Host => host::delete(ctx, resource, identifier).await,
            lookup => Err(read_only(lookup, &resource.id)),
        }
    }

    async fn import_kind(
        &self,
        kind: ResourceKind,
        id: &ResourceId,
        external_id: &str,
    ) -> ProviderResult<State> {
        let ctx = self.ctx();
        match kind {
            ResourceKind::Environment => Ok(environment::import(id, external_id)),
            ResourceKind::Stack => stack::import(ctx, id, external_id).await,
            ResourceKind::Secret => secret::import(ctx, id, external_id).await,
            ResourceKind::Volume => volume::import(ctx, id, external_id).await,
            ResourceKind::ApiKey => api_key::import(ctx, id, external_id).await,
            ResourceKind::Certificate => certificate::import(ctx, id, external_id).await,
            ResourceKind::RegistrationToken => {
                registration_token::import(ctx, id, external_id).await
            }
            ResourceKind::Registry => registry::import(ctx, id, external_id).await,
            ResourceKind::RegistryCredential => {
                registry_credential::import(ctx, id, external_id).await
            }
            ResourceKind::Host => host::import(ctx, id, external_id).await,
            lookup => Err(read_only(lookup, id)),
        }
    }
}

fn resolve(id: &ResourceId, read_only: bool) -> ProviderResult<ResourceKind> {
    ResourceKind::resolve(&id.resource_type, read_only).ok_or_else(|| {
        let what = if read_only { "data source" } else { "resource type" };
        ProviderError::unsupported(format!("Unknown {}: {}", what, id.resource_type))
            .for_resource(id.clone())
    })
}

fn validate(kind: ResourceKind, resource: &Resource) -> ProviderResult<()> {
    kind.schema().validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        ProviderError::validation(messages.join("; ")).for_resource(resource.id.clone())
    })
}

fn read_only(kind: ResourceKind, id: &ResourceId) -> ProviderError {
    ProviderError::unsupported(format!("{} lookups are read-only", kind.label()))
        .for_resource(id.clone())
}

impl<C: RancherApi> Provider for RancherProvider<C> {
    fn name(&self) -> &'static str {
        "rancher"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        let identifier = identifier.map(str::to_string);
        Box::pin(async move {
            let kind = resolve(&resource.id, resource.read_only)?;
            self.read_kind(kind, &resource, identifier.as_deref())
                .await
                .map_err(|e| e.or_resource(&resource.id))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            let kind = resolve(&resource.id, resource.read_only)?;
            self.create_kind(kind, &resource)
                .await
                .map_err(|e| e.or_resource(&resource.id))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            let kind = resolve(&id, to.read_only)?;
            self.update_kind(kind, &identifier, &from, &to)
                .await
                .map_err(|e| e.or_resource(&id))
        })
    }

    fn delete(&self, resource: &Resource, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let resource = resource.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let kind = resolve(&resource.id, resource.read_only)?;
            self.delete_kind(kind, &resource, &identifier)
                .await
                .map_err(|e| e.or_resource(&resource.id))
        })
    }

    fn import(&self, id: &ResourceId, external_id: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let external_id = external_id.to_string();
        Box::pin(async move {
            let kind = resolve(&id, false)?;
            self.import_kind(kind, &id, &external_id)
                .await
                .map_err(|e| e.or_resource(&id))
        })
    }
}
