//! API key driver
//!
//! The secret half of a key is only returned by the create call. State keeps
//! it from there on, since later reads come back without it.

use std::collections::HashMap;

use rancher_client::types::ApiKey;
use rancher_client::{RancherApi, Scope};
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, fetch, gone, import_with_parent};
use crate::lifecycle::{DEACTIVATE_REMOVE, Missing, await_entity, teardown};
use crate::utils::{api_error, removed};

const KIND: &str = "API key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateApiKey<'a> {
    name: &'a str,
    description: &'a str,
    account_id: &'a str,
}

#[derive(Serialize)]
struct UpdateApiKey<'a> {
    name: &'a str,
    description: &'a str,
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let name = resource.get_str("name");
    log::info!("Creating {} {}", KIND, name);

    let body = CreateApiKey {
        name,
        description: resource.get_str("description"),
        account_id: resource.get_str("reference_id"),
    };
    let created: ApiKey = ctx
        .api
        .create(&Scope::Global, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, ApiKey>(
        ctx.api,
        &Scope::Global,
        &created.id,
        ctx.wait
            .conf(&["active", "activating", "removed", "removing"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;

    read_keeping_secret(ctx, resource, &created.id, &created.secret_value).await
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    read_keeping_secret(ctx, resource, identifier, resource.get_str("secret_value")).await
}

/// Read the key; `known_secret` stands in when the server omits the secret
async fn read_keeping_secret<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
    known_secret: &str,
) -> ProviderResult<State> {
    let key: Option<ApiKey> = fetch(ctx.api, &Scope::Global, identifier, KIND).await?;
    let key = match key {
        Some(k) if !removed(&k.state) => k,
        Some(k) => return Ok(gone(&resource.id, KIND, identifier, Some(&k.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let secret = if key.secret_value.is_empty() {
        known_secret.to_string()
    } else {
        key.secret_value
    };
    let attrs = HashMap::from([
        ("name".to_string(), Value::from(key.name)),
        ("description".to_string(), Value::from(key.description)),
        ("reference_id".to_string(), Value::from(key.account_id)),
        ("kind".to_string(), Value::from(key.kind)),
        ("public_value".to_string(), Value::from(key.public_value)),
        ("secret_value".to_string(), Value::from(secret)),
        ("uuid".to_string(), Value::from(key.uuid)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let body = UpdateApiKey {
        name: to.get_str("name"),
        description: to.get_str("description"),
    };
    ctx.api
        .update::<ApiKey, _>(&Scope::Global, identifier, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;
    let known_secret = from.get_str("secret_value").unwrap_or_default();
    read_keeping_secret(ctx, to, identifier, known_secret).await
}

/// Deactivate, then remove
pub async fn delete<C: RancherApi>(ctx: Ctx<'_, C>, identifier: &str) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, ApiKey>(
        ctx.api,
        &Scope::Global,
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
    import_with_parent::<C, ApiKey>(ctx.api, id, external_id, "reference_id", account_of).await
}
