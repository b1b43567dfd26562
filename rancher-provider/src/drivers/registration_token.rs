//! Registration token driver

use std::collections::{BTreeMap, HashMap};

use rancher_client::RancherApi;
use rancher_client::types::RegistrationToken;
use rancher_core::provider::ProviderResult;
use rancher_core::resource::{Resource, ResourceId, State, Value};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::lifecycle::{DEACTIVATE_REMOVE, Missing, await_entity, teardown};
use crate::utils::{api_error, carry, removed};

const KIND: &str = "registration token";
const DOCKER_RUN: &str = "sudo docker run";

#[derive(Serialize)]
struct TokenRequest<'a> {
    name: &'a str,
    description: &'a str,
}

/// Registration command with the host labels passed to the agent
///
/// Labels are form-encoded in key order into `CATTLE_HOST_LABELS`.
pub fn command_with_labels(command: &str, labels: &HashMap<String, String>) -> String {
    if labels.is_empty() {
        return command.to_string();
    }
    let sorted: BTreeMap<&String, &String> = labels.iter().collect();
    let encoded = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted)
        .finish();
    command.replacen(
        DOCKER_RUN,
        &format!("{} -e CATTLE_HOST_LABELS='{}'", DOCKER_RUN, encoded),
        1,
    )
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let body = TokenRequest {
        name: resource.get_str("name"),
        description: resource.get_str("description"),
    };
    log::info!("Creating {} {} in {}", KIND, body.name, scope);

    let created: RegistrationToken = ctx
        .api
        .create(&scope, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, body.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, RegistrationToken>(
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
    let token: Option<RegistrationToken> =
        fetch(ctx.api, &environment_scope(resource), identifier, KIND).await?;
    let token = match token {
        Some(t) if !removed(&t.state) => t,
        Some(t) => return Ok(gone(&resource.id, KIND, identifier, Some(&t.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let command = command_with_labels(&token.command, &resource.get_string_map("host_labels"));
    let mut attrs = HashMap::from([
        ("name".to_string(), Value::from(token.name)),
        ("description".to_string(), Value::from(token.description)),
        ("environment_id".to_string(), Value::from(token.account_id)),
        ("command".to_string(), Value::from(command)),
        ("registration_url".to_string(), Value::from(token.registration_url)),
        ("token".to_string(), Value::from(token.token)),
        ("image".to_string(), Value::from(token.image)),
    ]);
    carry(&mut attrs, &resource.attributes, "host_labels");
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    log::info!("Updating {} ({})", KIND, identifier);
    let body = TokenRequest {
        name: to.get_str("name"),
        description: to.get_str("description"),
    };
    ctx.api
        .update::<RegistrationToken, _>(&environment_scope(to), identifier, &body)
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
    teardown::<C, RegistrationToken>(
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
    import_with_parent::<C, RegistrationToken>(ctx.api, id, external_id, "environment_id", account_of)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{WAIT, resource};
    use rancher_client::mock::MockApi;
    use rancher_core::resource::string_map;
    use serde_json::json;

    const COMMAND: &str = "sudo docker run --rm --privileged rancher/agent:v1.2.11 http://rancher:8080/v1/scripts/TOKEN";

    #[test]
    fn labels_are_sorted_and_encoded() {
        let labels = HashMap::from([
            ("zone".to_string(), "eu west".to_string()),
            ("role".to_string(), "db&cache".to_string()),
        ]);
        assert_eq!(
            command_with_labels(COMMAND, &labels),
            "sudo docker run -e CATTLE_HOST_LABELS='role=db%26cache&zone=eu+west' --rm --privileged rancher/agent:v1.2.11 http://rancher:8080/v1/scripts/TOKEN"
        );
        assert_eq!(command_with_labels(COMMAND, &HashMap::new()), COMMAND);
    }

    #[tokio::test(start_paused = true)]
    async fn create_reads_command() {
        let api = MockApi::new()
            .on_create("registrationToken", json!({"id": "1c5"}))
            .with_snapshots(
                "registrationToken",
                "1c5",
                vec![
                    json!({"id": "1c5", "state": "activating"}),
                    json!({
                        "id": "1c5", "state": "active", "accountId": "1a5", "command": COMMAND,
                        "token": "TOKEN", "image": "rancher/agent:v1.2.11"
                    }),
                ],
            );
        let declared = resource("rancher_registration_token", &[("name", "hosts"), ("environment_id", "1a5")])
            .with_attribute("host_labels", string_map([("role", "web")]));

        let state = create(ctx(&api), &declared).await.unwrap();

        assert_eq!(
            state.get_str("command"),
            Some("sudo docker run -e CATTLE_HOST_LABELS='role=web' --rm --privileged rancher/agent:v1.2.11 http://rancher:8080/v1/scripts/TOKEN")
        );
        assert_eq!(state.get_str("token"), Some("TOKEN"));
        assert_eq!(state.attributes["host_labels"], string_map([("role", "web")]));
    }

    fn ctx(api: &MockApi) -> Ctx<'_, MockApi> {
        Ctx { api, wait: &WAIT }
    }
}
