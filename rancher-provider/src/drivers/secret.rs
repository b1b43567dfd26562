//! Secret driver
//!
//! The value is sent base64-encoded and never read back; state keeps the
//! declared value.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rancher_client::RancherApi;
use rancher_client::types::Secret;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::lifecycle::{Missing, REMOVE, await_entity, teardown};
use crate::utils::{api_error, carry, removed};

const KIND: &str = "secret";

#[derive(Serialize)]
struct CreateSecret<'a> {
    name: &'a str,
    description: &'a str,
    value: String,
}

#[derive(Serialize)]
struct UpdateSecret<'a> {
    name: &'a str,
    description: &'a str,
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let name = resource.get_str("name");
    log::info!("Creating {} {} in {}", KIND, name, scope);

    let body = CreateSecret {
        name,
        description: resource.get_str("description"),
        value: STANDARD.encode(resource.get_str("value")),
    };
    let created: Secret = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, Secret>(
        ctx.api,
        &scope,
        &created.id,
        ctx.wait.conf(&["active", "removed", "removing"], &["active"]),
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
    let secret: Option<Secret> =
        fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let secret = match secret {
        Some(s) if !removed(&s.state) => s,
        Some(s) => return Ok(gone(&resource.id, KIND, identifier, Some(&s.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let mut attrs = HashMap::from([
        ("name".to_string(), Value::from(secret.name.as_str())),
        ("description".to_string(), Value::from(secret.description.as_str())),
        ("environment_id".to_string(), Value::from(secret.account_id.as_str())),
    ]);
    carry(&mut attrs, &resource.attributes, "value");
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

/// Only name and description can change; a new value replaces the secret
pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let body = UpdateSecret {
        name: to.get_str("name"),
        description: to.get_str("description"),
    };
    ctx.api
        .update::<Secret, _>(&environment_scope(to), identifier, &body)
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
    teardown::<C, Secret>(
        ctx.api,
        &environment_scope(resource),
        identifier,
        REMOVE,
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
    import_with_parent::<C, Secret>(ctx.api, id, external_id, "environment_id", account_of).await
}
