//! Registry driver

use std::collections::HashMap;

use rancher_client::RancherApi;
use rancher_client::types::Registry;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::lifecycle::{DEACTIVATE_REMOVE, Missing, await_entity, teardown};
use crate::utils::{api_error, removed};

const KIND: &str = "registry";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRegistry<'a> {
    name: &'a str,
    description: &'a str,
    server_address: &'a str,
}

#[derive(Serialize)]
struct UpdateRegistry<'a> {
    name: &'a str,
    description: &'a str,
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let body = CreateRegistry {
        name: resource.get_str("name"),
        description: resource.get_str("description"),
        server_address: resource.get_str("server_address"),
    };
    log::info!("Creating {} {} ({})", KIND, body.name, body.server_address);

    let created: Registry = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, body.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, Registry>(
        ctx.api,
        &scope,
        &created.id,
        ctx.wait
            .conf(&["activating", "active", "removed", "removing"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;

    read(ctx, resource, &created.id).await
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let registry: Option<Registry> =
        fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let registry = match registry {
        Some(r) if !removed(&r.state) => r,
        Some(r) => return Ok(gone(&resource.id, KIND, identifier, Some(&r.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let attrs = HashMap::from([
        ("name".to_string(), Value::from(registry.name)),
        ("description".to_string(), Value::from(registry.description)),
        ("environment_id".to_string(), Value::from(registry.account_id)),
        ("server_address".to_string(), Value::from(registry.server_address)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let body = UpdateRegistry {
        name: to.get_str("name"),
        description: to.get_str("description"),
    };
    ctx.api
        .update::<Registry, _>(&environment_scope(to), identifier, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;
    read(ctx, to, identifier).await
}

pub async fn delete<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, Registry>(
        ctx.api,
        &environment_scope(resource),
        identifier,
        DEACTIVATE_REMOVE,
        ctx.wait,
        KIND,
    )
    .await
}

pub async fn import<C: RancherApi>(
    ctx: Ctx<'_, C>,
    id: &ResourceId,
    external_id: &str,
) -> ProviderResult<State> {
    import_with_parent::<C, Registry>(ctx.api, id, external_id, "environment_id", account_of).await
}
