//! Host driver
//!
//! Hosts register themselves through an agent; creating one means waiting
//! for the declared hostname to appear and then adopting it.

use std::collections::HashMap;

use rancher_client::RancherApi;
use rancher_client::types::Host;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::finder::await_found;
use crate::lifecycle::{DEACTIVATE_REMOVE_PURGE, teardown};
use crate::utils::{api_error, removed};

const KIND: &str = "host";

/// Polls spent waiting for an agent to register
const REGISTRATION_CHECKS: u32 = 50;

#[derive(Serialize)]
struct HostRequest<'a> {
    name: &'a str,
    description: &'a str,
    labels: HashMap<String, String>,
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let hostname = resource.get_str("hostname");
    log::info!("Waiting for {} {} to register in {}", KIND, hostname, scope);

    let conf = ctx
        .wait
        .conf(&["activating", "registering", "active"], &["active"])
        .with_not_found_checks(REGISTRATION_CHECKS);
    let what = format!("{} {} to register", KIND, hostname);
    let host: Host = await_found(
        ctx.api,
        &scope,
        conf,
        |h: &Host| h.hostname == hostname,
        &what,
    )
    .await?;

    update(ctx, &host.id, resource).await
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let host: Option<Host> = fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let host = match host {
        Some(h) if !removed(&h.state) => h,
        Some(h) => return Ok(gone(&resource.id, KIND, identifier, Some(&h.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let labels = host
        .labels
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let attrs = HashMap::from([
        ("name".to_string(), Value::from(host.name)),
        ("description".to_string(), Value::from(host.description)),
        ("environment_id".to_string(), Value::from(host.account_id)),
        ("hostname".to_string(), Value::from(host.hostname)),
        ("labels".to_string(), Value::Map(labels)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let body = HostRequest {
        name: to.get_str("name"),
        description: to.get_str("description"),
        labels: to.get_string_map("labels"),
    };
    ctx.api
        .update::<Host, _>(&environment_scope(to), identifier, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;
    read(ctx, to, identifier).await
}

/// Deactivate, remove, then purge
pub async fn delete<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, Host>(
        ctx.api,
        &environment_scope(resource),
        identifier,
        DEACTIVATE_REMOVE_PURGE,
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
    import_with_parent::<C, Host>(ctx.api, id, external_id, "environment_id", account_of).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{WAIT, resource};
    use rancher_client::mock::MockApi;
    use rancher_core::provider::ErrorKind;
    use rancher_core::resource::string_map;
    use serde_json::json;

    fn ctx(api: &MockApi) -> Ctx<'_, MockApi> {
        Ctx { api, wait: &WAIT }
    }

    fn host(id: &str, hostname: &str, state: &str) -> serde_json::Value {
        json!({"id": id, "hostname": hostname, "state": state, "accountId": "1a5", "labels": {}})
    }

    #[tokio::test(start_paused = true)]
    async fn adopts_registered_host_by_hostname() {
        let api = MockApi::new()
            .with_pages(
                "host",
                vec![
                    vec![host("1h1", "web-0", "active")],
                    vec![host("1h2", "db-0", "active")],
                ],
            )
            .with_snapshots("host", "1h2", vec![host("1h2", "db-0", "active")]);
        let declared = resource(
            "rancher_host",
            &[("name", "db"), ("environment_id", "1a5"), ("hostname", "db-0")],
        )
        .with_attribute("labels", string_map([("tier", "data")]));

        let state = create(ctx(&api), &declared).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("1h2"));
        assert_eq!(
            &api.calls()[..2],
            ["list host page 0", "list host page 1"]
        );
        assert_eq!(state.get_str("hostname"), Some("db-0"));
        assert_eq!(state.attributes["labels"], string_map([("tier", "data")]));
        assert_eq!(
            api.last_body("update host/1h2").unwrap(),
            json!({"name": "db", "description": "", "labels": {"tier": "data"}})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_host_exhausts_checks() {
        let api = MockApi::new();
        let declared = resource("rancher_host", &[("environment_id", "1a5"), ("hostname", "ghost")]);

        let err = create(ctx(&api), &declared).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Convergence);
        assert!(err.message.contains("ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_purges() {
        let api = MockApi::new()
            .with_snapshots("host", "1h1", vec![host("1h1", "web-0", "active")])
            .on_action("host", "1h1", "deactivate", vec![host("1h1", "web-0", "inactive")])
            .on_action("host", "1h1", "remove", vec![host("1h1", "web-0", "removed")])
            .on_action("host", "1h1", "purge", vec![host("1h1", "web-0", "purged")]);
        let declared = resource("rancher_host", &[("environment_id", "1a5")]);

        delete(ctx(&api), &declared, "1h1").await.unwrap();

        let actions: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("action"))
            .collect();
        assert_eq!(
            actions,
            vec![
                "action host/1h1 deactivate",
                "action host/1h1 remove",
                "action host/1h1 purge",
            ]
        );
    }
}
