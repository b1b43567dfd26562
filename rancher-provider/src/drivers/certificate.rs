//! Certificate driver and lookup

use std::collections::HashMap;

use rancher_client::RancherApi;
use rancher_client::types::Certificate;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::finder::await_named;
use crate::lifecycle::{Missing, REMOVE, await_entity, teardown};
use crate::utils::{api_error, carry, removed};

const KIND: &str = "certificate";
const LOOKUP_CHECKS: u32 = 50;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateRequest<'a> {
    name: &'a str,
    description: &'a str,
    cert: &'a str,
    key: &'a str,
    cert_chain: &'a str,
}

impl<'a> CertificateRequest<'a> {
    fn from_resource(resource: &'a Resource) -> Self {
        Self {
            name: resource.get_str("name"),
            description: resource.get_str("description"),
            cert: resource.get_str("cert"),
            key: resource.get_str("key"),
            cert_chain: resource.get_str("cert_chain"),
        }
    }
}

/// Fields the server derives from the certificate body
fn parsed_attributes(cert: Certificate) -> HashMap<String, Value> {
    let sans = cert
        .subject_alternative_names
        .into_iter()
        .map(Value::String)
        .collect();
    HashMap::from([
        ("name".to_string(), Value::from(cert.name)),
        ("description".to_string(), Value::from(cert.description)),
        ("environment_id".to_string(), Value::from(cert.account_id)),
        ("cn".to_string(), Value::from(cert.cn)),
        ("algorithm".to_string(), Value::from(cert.algorithm)),
        ("cert_fingerprint".to_string(), Value::from(cert.cert_fingerprint)),
        ("expires_at".to_string(), Value::from(cert.expires_at)),
        ("issued_at".to_string(), Value::from(cert.issued_at)),
        ("issuer".to_string(), Value::from(cert.issuer)),
        ("key_size".to_string(), Value::Int(cert.key_size)),
        ("serial_number".to_string(), Value::from(cert.serial_number)),
        ("subject_alternative_names".to_string(), Value::List(sans)),
        ("version".to_string(), Value::from(cert.version)),
    ])
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let body = CertificateRequest::from_resource(resource);
    log::info!("Creating {} {} in {}", KIND, body.name, scope);

    let created: Certificate = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, body.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, Certificate>(
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
    let cert: Option<Certificate> =
        fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let cert = match cert {
        Some(c) if !removed(&c.state) => c,
        Some(c) => return Ok(gone(&resource.id, KIND, identifier, Some(&c.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let mut attrs = parsed_attributes(cert);
    for key in ["cert", "key", "cert_chain"] {
        carry(&mut attrs, &resource.attributes, key);
    }
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

/// Replace the certificate body in place
pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let scope = environment_scope(to);
    ctx.api
        .update::<Certificate, _>(&scope, identifier, &CertificateRequest::from_resource(to))
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;

    let what = format!("{} ({}) to be updated", KIND, identifier);
    await_entity::<C, Certificate>(
        ctx.api,
        &scope,
        identifier,
        ctx.wait.conf(&["active", "updating-active"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;

    read(ctx, to, identifier).await
}

pub async fn delete<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, Certificate>(
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
    import_with_parent::<C, Certificate>(ctx.api, id, external_id, "environment_id", account_of)
        .await
}

/// Look a certificate up by name within an environment
pub async fn lookup<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let name = resource.get_str("name");
    let scope = environment_scope(resource);
    log::info!("Looking up {} {} in {}", KIND, name, scope);

    let conf = ctx
        .wait
        .conf(&["active", "removed", "removing"], &["active"])
        .with_not_found_checks(LOOKUP_CHECKS);
    let what = format!("{} {} to be found", KIND, name);
    let cert: Certificate = await_named(ctx.api, &scope, conf, name, &what).await?;

    let identifier = cert.id.clone();
    Ok(State::existing(resource.id.clone(), parsed_attributes(cert)).with_identifier(identifier))
}
