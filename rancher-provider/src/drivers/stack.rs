//! Stack driver
//!
//! A stack is built from inline compose text or from the files of a catalog
//! template version. Changing compose files or the environment map is only
//! applied by the `upgrade` action; a plain update touches metadata.

use std::collections::HashMap;

use rancher_client::types::{ComposeConfig, ComposeConfigInput, Stack, StackUpgrade};
use rancher_client::{RancherApi, Scope};
use rancher_core::differ::has_change;
use rancher_core::provider::{ErrorKind, ProviderError, ProviderResult};
use rancher_core::resource::{Resource, ResourceId, State, Value, string_map};
use serde::Serialize;

use super::{Ctx, account_of, environment_scope, fetch, gone, import_with_parent};
use crate::lifecycle::{Missing, REMOVE, await_entity, teardown};
use crate::normalize::compose::{
    CatalogError, CatalogId, catalog_id_from_external, compose_files, reconcile_compose,
    resolve_template_version, strip_cr,
};
use crate::utils::{api_error, removed};

const KIND: &str = "stack";

/// Attributes whose change requires an upgrade
const UPGRADE_KEYS: &[&str] = &["docker_compose", "rancher_compose", "environment", "catalog_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct StackRequest {
    name: String,
    description: String,
    docker_compose: String,
    rancher_compose: String,
    environment: HashMap<String, String>,
    external_id: String,
    start_on_create: bool,
    system: bool,
}

impl StackRequest {
    fn upgrade(&self) -> StackUpgrade {
        StackUpgrade {
            docker_compose: self.docker_compose.clone(),
            rancher_compose: self.rancher_compose.clone(),
            environment: self.environment.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

fn catalog_error(err: CatalogError) -> ProviderError {
    let kind = match &err {
        CatalogError::Format(_) => ErrorKind::Validation,
        CatalogError::UnknownTemplate(_) | CatalogError::VersionNotFound(_) => {
            ErrorKind::MissingDependency
        }
        CatalogError::Template { .. } | CatalogError::Version { .. } => ErrorKind::Api,
    };
    ProviderError::new(err.to_string())
        .with_kind(kind)
        .with_cause(err)
}

/// Request body from the declared attributes
///
/// Inline compose text wins over the catalog template's files.
async fn stack_request<C: RancherApi>(api: &C, resource: &Resource) -> ProviderResult<StackRequest> {
    let system = resource.get_str("scope") == "system";
    let mut request = StackRequest {
        name: resource.get_str("name").to_string(),
        description: resource.get_str("description").to_string(),
        environment: resource.get_string_map("environment"),
        start_on_create: resource.get_bool("start_on_create").unwrap_or_default(),
        system,
        ..Default::default()
    };

    if let Some(raw) = resource.get_opt_str("catalog_id") {
        let catalog_id = CatalogId::parse(raw).map_err(catalog_error)?;
        let version = resolve_template_version(api, &catalog_id)
            .await
            .map_err(catalog_error)?;
        let (docker, rancher) = compose_files(&version);
        request.docker_compose = docker;
        request.rancher_compose = rancher;
        request.external_id = catalog_id.external_id(system);
    }

    if let Some(docker) = resource.get_opt_str("docker_compose") {
        request.docker_compose = docker.to_string();
    }
    if let Some(rancher) = resource.get_opt_str("rancher_compose") {
        request.rancher_compose = rancher.to_string();
    }
    Ok(request)
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let scope = environment_scope(resource);
    let request = stack_request(ctx.api, resource).await?;
    log::info!("Creating {} {} in {}", KIND, request.name, scope);

    let created: Stack = ctx
        .api
        .create(&scope, &request)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, request.name), e))?;

    let what = format!("{} ({}) to be created", KIND, created.id);
    await_entity::<C, Stack>(
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
    let scope = environment_scope(resource);
    let stack: Option<Stack> = fetch(ctx.api, &scope, identifier, KIND).await?;
    let stack = match stack {
        Some(s) if !removed(&s.state) => s,
        Some(s) => return Ok(gone(&resource.id, KIND, identifier, Some(&s.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let input = serde_json::to_value(ComposeConfigInput::default())
        .map_err(|e| ProviderError::new(format!("Failed to encode export request: {}", e)))?;
    let config: ComposeConfig = ctx
        .api
        .action::<Stack, _>(&scope, identifier, "exportconfig", Some(input))
        .await
        .map_err(|e| api_error(&format!("Failed to export config of {} ({})", KIND, identifier), e))?;
    let rendered_docker = strip_cr(&config.docker_compose_config);
    let rendered_rancher = strip_cr(&config.rancher_compose_config);

    let (docker, rancher) = if resource.get_opt_str("catalog_id").is_none() {
        (
            reconcile_compose(resource.get_str("docker_compose"), &rendered_docker),
            reconcile_compose(resource.get_str("rancher_compose"), &rendered_rancher),
        )
    } else {
        (String::new(), String::new())
    };

    let scope_name = if stack.system { "system" } else { "user" };
    let attrs = HashMap::from([
        ("name".to_string(), Value::from(stack.name.as_str())),
        ("description".to_string(), Value::from(stack.description.as_str())),
        ("environment_id".to_string(), Value::from(stack.account_id.as_str())),
        ("environment".to_string(), string_map(stack.environment.clone())),
        ("scope".to_string(), Value::from(scope_name)),
        (
            "catalog_id".to_string(),
            Value::from(catalog_id_from_external(&stack.external_id)),
        ),
        ("start_on_create".to_string(), Value::Bool(stack.start_on_create)),
        (
            "finish_upgrade".to_string(),
            Value::Bool(resource.get_bool("finish_upgrade").unwrap_or_default()),
        ),
        ("docker_compose".to_string(), Value::from(docker)),
        ("rancher_compose".to_string(), Value::from(rancher)),
        ("rendered_docker_compose".to_string(), Value::from(rendered_docker)),
        ("rendered_rancher_compose".to_string(), Value::from(rendered_rancher)),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let scope = environment_scope(to);
    let request = stack_request(ctx.api, to).await?;
    log::info!("Updating {} ({})", KIND, identifier);

    ctx.api
        .update::<Stack, _>(&scope, identifier, &request)
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;
    let what = format!("{} ({}) to be updated", KIND, identifier);
    await_entity::<C, Stack>(
        ctx.api,
        &scope,
        identifier,
        ctx.wait
            .conf(&["active", "active-updating", "upgrading"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;

    if has_change(from, to, UPGRADE_KEYS) {
        upgrade(ctx, &scope, identifier, &request).await?;
        if to.get_bool("finish_upgrade").unwrap_or_default() {
            finish_upgrade(ctx, &scope, identifier).await?;
        }
    }

    read(ctx, to, identifier).await
}

async fn upgrade<C: RancherApi>(
    ctx: Ctx<'_, C>,
    scope: &Scope,
    identifier: &str,
    request: &StackRequest,
) -> ProviderResult<()> {
    log::info!("Upgrading {} ({})", KIND, identifier);
    let body = serde_json::to_value(request.upgrade())
        .map_err(|e| ProviderError::new(format!("Failed to encode upgrade: {}", e)))?;
    ctx.api
        .action::<Stack, serde_json::Value>(scope, identifier, "upgrade", Some(body))
        .await
        .map_err(|e| api_error(&format!("Failed to upgrade {} ({})", KIND, identifier), e))?;

    let what = format!("{} ({}) to be upgraded", KIND, identifier);
    await_entity::<C, Stack>(
        ctx.api,
        scope,
        identifier,
        ctx.wait
            .conf(&["active", "upgrading", "upgraded"], &["upgraded"]),
        Missing::NotFound,
        &what,
    )
    .await?;
    Ok(())
}

async fn finish_upgrade<C: RancherApi>(
    ctx: Ctx<'_, C>,
    scope: &Scope,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Finishing upgrade of {} ({})", KIND, identifier);
    ctx.api
        .action::<Stack, serde_json::Value>(scope, identifier, "finishupgrade", None)
        .await
        .map_err(|e| api_error(&format!("Failed to finish upgrade of {} ({})", KIND, identifier), e))?;

    let what = format!("{} ({}) to finish upgrading", KIND, identifier);
    await_entity::<C, Stack>(
        ctx.api,
        scope,
        identifier,
        ctx.wait
            .conf(&["active", "upgraded", "finishing-upgrade"], &["active"]),
        Missing::NotFound,
        &what,
    )
    .await?;
    Ok(())
}

pub async fn delete<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, Stack>(
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
    import_with_parent::<C, Stack>(ctx.api, id, external_id, "environment_id", account_of).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{WAIT, resource};
    use rancher_client::mock::MockApi;
    use serde_json::json;

    fn ctx(api: &MockApi) -> Ctx<'_, MockApi> {
        Ctx { api, wait: &WAIT }
    }

    const COMPOSE: &str = "web:\n  image: nginx\n";

    fn stack(state: &str) -> serde_json::Value {
        json!({
            "id": "1st1",
            "name": "web",
            "state": state,
            "accountId": "1a5",
            "environment": {"PORT": "80"},
            "startOnCreate": true
        })
    }

    fn with_export(api: MockApi, docker: &str) -> MockApi {
        api.action_response(
            "stack",
            "1st1",
            "exportconfig",
            json!({"dockerComposeConfig": docker, "rancherComposeConfig": ""}),
        )
    }

    fn declared() -> Resource {
        resource(
            "rancher_stack",
            &[("name", "web"), ("environment_id", "1a5"), ("docker_compose", COMPOSE)],
        )
        .with_attribute("environment", string_map([("PORT", "80")]))
    }

    #[tokio::test]
    async fn bare_import_takes_environment_from_account() {
        let api = MockApi::new().with_snapshots("stack", "s1", vec![json!({"id": "s1", "state": "active", "accountId": "1a5"})]);
        let id = ResourceId::new("rancher_stack", "web");

        let state = import(ctx(&api), &id, "s1").await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("s1"));
        assert_eq!(state.get_str("environment_id"), Some("1a5"));
        assert_eq!(api.calls_in(&Scope::Global), vec!["get stack/s1 = active"]);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_inline_stack() {
        let api = with_export(
            MockApi::new()
                .on_create("stack", json!({"id": "1st1"}))
                .with_snapshots("stack", "1st1", vec![stack("activating"), stack("active")]),
            "web:\r\n  image: nginx\r\n",
        );

        let state = create(ctx(&api), &declared()).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("1st1"));
        assert_eq!(state.get_str("docker_compose"), Some(COMPOSE));
        assert_eq!(state.get_str("rendered_docker_compose"), Some(COMPOSE));
        assert_eq!(state.get_str("scope"), Some("user"));
        assert_eq!(state.attributes["start_on_create"], Value::Bool(true));
        assert_eq!(state.attributes["finish_upgrade"], Value::Bool(false));
        assert_eq!(api.last_body("create stack").unwrap()["externalId"], "");
        assert!(api.calls_in(&Scope::Global).is_empty());
        assert_eq!(
            api.calls_in(&Scope::environment("1a5")).len(),
            api.calls().len()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn create_from_catalog() {
        let mut catalog_stack = stack("active");
        catalog_stack["system"] = json!(true);
        catalog_stack["externalId"] = json!("system-catalog://library:route53:7");
        let api = with_export(
            MockApi::new()
                .with_template(json!({
                    "id": "library:route53",
                    "versionLinks": {"0.7.0": "http://rancher/v1-catalog/templates/library:route53:7"}
                }))
                .with_template_version(
                    "http://rancher/v1-catalog/templates/library:route53:7",
                    json!({"id": "library:route53:7", "files": {"docker-compose.yml": COMPOSE}}),
                )
                .on_create("stack", json!({"id": "1st1"}))
                .with_snapshots("stack", "1st1", vec![catalog_stack]),
            COMPOSE,
        );
        let declared = resource(
            "rancher_stack",
            &[
                ("name", "route53"),
                ("environment_id", "1a5"),
                ("catalog_id", "library:route53:7"),
                ("scope", "system"),
            ],
        );

        let state = create(ctx(&api), &declared).await.unwrap();

        let body = api.last_body("create stack").unwrap();
        assert_eq!(body["externalId"], "system-catalog://library:route53:7");
        assert_eq!(body["dockerCompose"], COMPOSE);
        assert_eq!(body["system"], true);
        assert_eq!(state.get_str("docker_compose"), Some(""));
        assert_eq!(state.get_str("rendered_docker_compose"), Some(COMPOSE));
        assert_eq!(state.get_str("catalog_id"), Some("library:route53:7"));
    }

    #[tokio::test]
    async fn bad_catalog_id_is_a_validation_error() {
        let api = MockApi::new();
        let declared = resource(
            "rancher_stack",
            &[("name", "x"), ("environment_id", "1a5"), ("catalog_id", "library")],
        );
        let err = create(ctx(&api), &declared).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn read_replaces_diverged_compose() {
        let api = with_export(
            MockApi::new().with_snapshots("stack", "1st1", vec![stack("active")]),
            "web:\n  image: httpd\n",
        );

        let state = read(ctx(&api), &declared(), "1st1").await.unwrap();

        assert_eq!(state.get_str("docker_compose"), Some("web:\n  image: httpd\n"));
        assert_eq!(state.attributes["environment"], string_map([("PORT", "80")]));
        assert_eq!(state.get_str("environment_id"), Some("1a5"));
    }

    #[tokio::test(start_paused = true)]
    async fn metadata_change_does_not_upgrade() {
        let api = with_export(
            MockApi::new().with_snapshots("stack", "1st1", vec![stack("active")]),
            COMPOSE,
        );
        let from = read(ctx(&api), &declared(), "1st1").await.unwrap();
        let to = declared().with_attribute("description", "front end");

        update(ctx(&api), "1st1", &from, &to).await.unwrap();

        assert!(api.calls().contains(&"update stack/1st1".to_string()));
        assert!(!api.calls().iter().any(|c| c.ends_with(" upgrade")));
    }

    #[tokio::test(start_paused = true)]
    async fn compose_change_upgrades_and_finishes() {
        let api = with_export(
            MockApi::new()
                .with_snapshots("stack", "1st1", vec![stack("active")])
                .on_action(
                    "stack",
                    "1st1",
                    "upgrade",
                    vec![stack("upgrading"), stack("upgraded")],
                )
                .on_action(
                    "stack",
                    "1st1",
                    "finishupgrade",
                    vec![stack("finishing-upgrade"), stack("active")],
                ),
            COMPOSE,
        );
        let from = read(ctx(&api), &declared(), "1st1").await.unwrap();
        let to = resource(
            "rancher_stack",
            &[
                ("name", "web"),
                ("environment_id", "1a5"),
                ("docker_compose", "web:\n  image: nginx:1.25\n"),
            ],
        )
        .with_attribute("finish_upgrade", true);

        update(ctx(&api), "1st1", &from, &to).await.unwrap();

        let actions: Vec<String> = api
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("action") && !c.ends_with("exportconfig"))
            .collect();
        assert_eq!(
            actions,
            vec!["action stack/1st1 upgrade", "action stack/1st1 finishupgrade"]
        );
        assert_eq!(
            api.last_body("action stack/1st1 upgrade").unwrap()["dockerCompose"],
            "web:\n  image: nginx:1.25\n"
        );
        let calls = api.calls();
        let upgraded = calls.iter().position(|c| c == "get stack/1st1 = upgraded").unwrap();
        let finish = calls
            .iter()
            .position(|c| c == "action stack/1st1 finishupgrade")
            .unwrap();
        assert!(upgraded < finish);
    }

    #[tokio::test(start_paused = true)]
    async fn upgrade_without_finish_stays_upgraded() {
        let api = with_export(
            MockApi::new()
                .with_snapshots("stack", "1st1", vec![stack("active")])
                .on_action("stack", "1st1", "upgrade", vec![stack("upgraded")]),
            COMPOSE,
        );
        let from = read(ctx(&api), &declared(), "1st1").await.unwrap();
        let to = declared().with_attribute("environment", string_map([("PORT", "8080")]));

        update(ctx(&api), "1st1", &from, &to).await.unwrap();

        assert!(api.calls().contains(&"action stack/1st1 upgrade".to_string()));
        assert!(!api.calls().iter().any(|c| c.ends_with("finishupgrade")));
    }
}
