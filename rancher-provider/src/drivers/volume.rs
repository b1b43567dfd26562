//! Volume driver
//!
//! A volume with no consumers rests in `inactive`, which counts as settled.

use std::collections::HashMap;

use rancher_client::RancherApi;
use rancher_client::types::Volume;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::lifecycle::{Missing, REMOVE_INACTIVE, await_entity, teardown};
use crate::utils::{api_error, removed};

const KIND: &str = "volume";

#[derive(Serialize)]
struct VolumeRequest<'a> {
    name: &'a str,
    description: &'a str,
    driver: &'a str,
}

impl<'a> VolumeRequest<'a> {
    fn from_resource(resource: &'a Resource) -> Self {
        Self {
            name: resource.get_str("name"),
            description: resource.get_str("description"),
            driver: resource.get_str("driver"),
        }
    }
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let body = VolumeRequest::from_resource(resource);
    log::info!("Creating {} {} in {}", KIND, body.name, scope);

    let created: Volume = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, body.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, Volume>(
        ctx.api,
        &scope,
        &created.id,
        ctx.wait.conf(
            &["active", "inactive", "removed", "removing"],
            &["active", "inactive"],
        ),
        Missing::NotFound,
        &what,
    )
    .await?;

    update(ctx, &created.id, resource).await
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let volume: Option<Volume> =
        fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let volume = match volume {
        Some(v) if !removed(&v.state) => v,
        Some(v) => return Ok(gone(&resource.id, KIND, identifier, Some(&v.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let attrs = HashMap::from([
        ("name".to_string(), Value::from(volume.name)),
        ("description".to_string(), Value::from(volume.description)),
        ("environment_id".to_string(), Value::from(volume.account_id)),
        ("driver".to_string(), Value::from(volume.driver)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    ctx.api
        .update::<Volume, _>(
            &environment_scope(to),
            identifier,
            &VolumeRequest::from_resource(to),
        )
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
    teardown::<C, Volume>(
        ctx.api,
        &environment_scope(resource),
        identifier,
        REMOVE_INACTIVE,
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
    import_with_parent::<C, Volume>(ctx.api, id, external_id, "environment_id", account_of).await
}
