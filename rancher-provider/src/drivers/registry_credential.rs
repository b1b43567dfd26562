//! Registry credential driver
//!
//! Credentials are addressed through the environment of their registry, so
//! every operation first resolves the registry's owning account.

use std::collections::HashMap;

use rancher_client::types::{Registry, RegistryCredential};
use rancher_client::{RancherApi, Scope};
use rancher_core::provider::{ErrorKind, ProviderError, ProviderResult};
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, fetch, gone, import_with_parent};
use crate::lifecycle::{DEACTIVATE_REMOVE, Missing, await_entity, teardown};
use crate::utils::{api_error, removed};

const KIND: &str = "registry credential";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRequest<'a> {
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_id: Option<&'a str>,
    email: &'a str,
    public_value: &'a str,
    secret_value: &'a str,
}

impl<'a> CredentialRequest<'a> {
    fn from_resource(resource: &'a Resource) -> Self {
        Self {
            name: resource.get_str("name"),
            description: resource.get_str("description"),
            registry_id: None,
            email: resource.get_str("email"),
            public_value: resource.get_str("public_value"),
            secret_value: resource.get_str("secret_value"),
        }
    }
}

/// Scope of the environment owning `registry_id`
async fn registry_scope<C: RancherApi>(api: &C, registry_id: &str) -> ProviderResult<Scope> {
    let registry: Option<Registry> = fetch(api, &Scope::Global, registry_id, "registry").await?;
    match registry {
        Some(r) if !removed(&r.state) => Ok(Scope::for_environment(&r.account_id)),
        _ => Err(ProviderError::new(format!("Registry {} not found", registry_id))
            .with_kind(ErrorKind::MissingDependency)),
    }
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let registry_id = resource.get_str("registry_id");
    let scope = registry_scope(ctx.api, registry_id).await?;
    let body = CredentialRequest {
        registry_id: Some(registry_id),
        ..CredentialRequest::from_resource(resource)
    };
    log::info!("Creating {} {} for registry {}", KIND, body.name, registry_id);

    let created: RegistryCredential = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, body.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, RegistryCredential>(
        ctx.api,
        &scope,
        &created.id,
        ctx.wait
            .conf(&["activating", "active", "removed", "removing"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;

    read_in(ctx, &scope, resource, &created.id).await
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let scope = registry_scope(ctx.api, resource.get_str("registry_id")).await?;
    read_in(ctx, &scope, resource, identifier).await
}

async fn read_in<C: RancherApi>(
    ctx: Ctx<'_, C>,
    scope: &Scope,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let credential: Option<RegistryCredential> = fetch(ctx.api, scope, identifier, KIND).await?;
    let credential = match credential {
        Some(c) if !removed(&c.state) => c,
        Some(c) => return Ok(gone(&resource.id, KIND, identifier, Some(&c.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let secret = if credential.secret_value.is_empty() {
        resource.get_str("secret_value").to_string()
    } else {
        credential.secret_value
    };
    let attrs = HashMap::from([
        ("name".to_string(), Value::from(credential.name)),
        ("description".to_string(), Value::from(credential.description)),
        ("registry_id".to_string(), Value::from(credential.registry_id)),
        ("email".to_string(), Value::from(credential.email)),
        ("public_value".to_string(), Value::from(credential.public_value)),
        ("secret_value".to_string(), Value::from(secret)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let scope = registry_scope(ctx.api, to.get_str("registry_id")).await?;
    ctx.api
        .update::<RegistryCredential, _>(&scope, identifier, &CredentialRequest::from_resource(to))
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;
    read_in(ctx, &scope, to, identifier).await
}

pub async fn delete<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    let scope = registry_scope(ctx.api, resource.get_str("registry_id")).await?;
    teardown::<C, RegistryCredential>(
        ctx.api,
        &scope,
        identifier,
        DEACTIVATE_REMOVE,
        ctx.wait,
        KIND,
    )
    .await
}

fn registry_of(credential: &RegistryCredential) -> String {
    credential.registry_id.clone()
}

pub async fn import<C: RancherApi>(
    ctx: Ctx<'_, C>,
    id: &ResourceId,
    external_id: &str,
) -> ProviderResult<State> {
    import_with_parent::<C, RegistryCredential>(ctx.api, id, external_id, "registry_id", registry_of)
        .await
}
