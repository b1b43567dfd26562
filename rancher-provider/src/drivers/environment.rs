//! Environment (Rancher project) driver and lookup
//!
//! An environment is created from a public project template, then its
//! default network policy and member list are applied once the project is
//! active. The project only counts as visible to the create wait once the
//! server has assigned its default network.

use std::collections::HashMap;

use rancher_client::types::{
    ListOpts, Network, NetworkPolicyRule, Project, ProjectMember, ProjectTemplate,
    SetProjectMembersInput,
};
use rancher_client::{ClientError, RancherApi, Scope};
use rancher_core::provider::{ProviderError, ProviderResult};
use rancher_core::resource::{Resource, ResourceId, State, Value};
use rancher_core::wait::DEFAULT_NOT_FOUND_CHECKS;
use serde::Serialize;

use super::{Ctx, fetch, gone};
use crate::finder::{await_named, list_all};
use crate::lifecycle::{REMOVE, teardown, wait_failed};
use crate::normalize::members::{make_members, normalize_members};
use crate::normalize::policy::{PolicyRule, decode_rules, encode_rules, parse_rules};
use crate::schemas::ORCHESTRATIONS;
use crate::utils::{api_error, removed};

const KIND: &str = "environment";
const DEFAULT_ORCHESTRATION: &str = "cattle";

const CREATE_PENDING: &[&str] = &["active", "activating", "registering", "removed", "removing"];
const LOOKUP_PENDING: &[&str] = &["active", "removed", "removing"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProject<'a> {
    name: &'a str,
    description: &'a str,
    project_template_id: &'a str,
}

#[derive(Serialize)]
struct UpdateProject<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DefaultPolicyUpdate<'a> {
    default_policy_action: &'a str,
}

#[derive(Serialize)]
struct PolicyUpdate {
    policy: Vec<NetworkPolicyRule>,
}

/// Declared policy rules, validated before anything is sent
fn declared_rules(resource: &Resource) -> ProviderResult<Vec<PolicyRule>> {
    parse_rules(&resource.get_blocks("policy"))
        .map_err(|e| ProviderError::validation(e.to_string()).with_cause(e))
}

/// Public project template id for the declared orchestration
async fn template_id<C: RancherApi>(api: &C, resource: &Resource) -> ProviderResult<String> {
    if let Some(id) = resource.get_opt_str("project_template_id") {
        return Ok(id.to_string());
    }
    let Some(orchestration) = resource.get_opt_str("orchestration") else {
        return Err(ProviderError::validation(
            "Need either 'orchestration' or 'project_template_id'",
        ));
    };
    if !ORCHESTRATIONS.contains(&orchestration) {
        return Err(ProviderError::validation(format!(
            "Invalid orchestration: {}",
            orchestration
        )));
    }

    let opts = ListOpts::new()
        .filter("isPublic", "true")
        .filter("name", orchestration);
    let templates = api
        .list::<ProjectTemplate>(&Scope::Global, &opts)
        .await
        .map_err(|e| api_error("Failed to list project templates", e))?;
    templates
        .data
        .into_iter()
        .next()
        .map(|t| t.id)
        .ok_or_else(|| {
            ProviderError::missing_dependency(format!(
                "No public project template for orchestration {}",
                orchestration
            ))
        })
}

pub async fn create<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let rules = declared_rules(resource)?;
    let template = template_id(ctx.api, resource).await?;
    let name = resource.get_str("name");
    log::info!("Creating {} {}", KIND, name);

    let body = CreateProject {
        name,
        description: resource.get_str("description"),
        project_template_id: &template,
    };
    let created: Project = ctx
        .api
        .create(&Scope::Global, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to create {} {}", KIND, name), e))?;

    let project = await_project(ctx, &created.id).await?;
    apply_network_policy(ctx, &project, resource, &rules).await?;
    apply_members(ctx, &project.id, resource).await?;

    read(ctx, resource, &project.id).await
}

/// Wait for a new project to be active with its default network assigned
async fn await_project<C: RancherApi>(ctx: Ctx<'_, C>, id: &str) -> ProviderResult<Project> {
    let api = ctx.api;
    let what = format!("{} ({}) to be created", KIND, id);
    log::debug!("Waiting for {}", what);
    let project: Option<Project> = ctx
        .wait
        .conf(CREATE_PENDING, &["active"])
        .await_state(move || async move {
            let observed = api.by_id::<Project>(&Scope::Global, id).await?;
            Ok::<_, ClientError>(match observed {
                None => Some((None, "removed".to_string())),
                Some(p) if p.state.is_empty() => Some((None, "removed".to_string())),
                Some(p) if p.default_network_id.is_empty() => None,
                Some(p) => {
                    let state = p.state.clone();
                    Some((Some(p), state))
                }
            })
        })
        .await
        .map_err(|e| wait_failed(&what, e))?;
    project.ok_or_else(|| ProviderError::convergence(format!("{} ({}) vanished", KIND, id)))
}

/// The project's default network; its absence is a hard error
async fn default_network<C: RancherApi>(
    ctx: Ctx<'_, C>,
    project: &Project,
) -> ProviderResult<Network> {
    let network: Option<Network> = if project.default_network_id.is_empty() {
        None
    } else {
        let scope = Scope::environment(&project.id);
        fetch(ctx.api, &scope, &project.default_network_id, "network").await?
    };
    network.ok_or_else(|| {
        ProviderError::missing_dependency(format!(
            "{} ({}) has no default network yet",
            KIND, project.id
        ))
    })
}

/// Push the declared default action and rule list to the default network
async fn apply_network_policy<C: RancherApi>(
    ctx: Ctx<'_, C>,
    project: &Project,
    resource: &Resource,
    rules: &[PolicyRule],
) -> ProviderResult<()> {
    let scope = Scope::environment(&project.id);
    let network = default_network(ctx, project).await?;

    if let Some(policy) = resource.get_opt_str("default_policy")
        && !policy.eq_ignore_ascii_case(&network.default_policy_action)
    {
        log::info!(
            "Setting default policy of network {} to {}",
            network.id,
            policy
        );
        let body = DefaultPolicyUpdate {
            default_policy_action: &policy.to_ascii_lowercase(),
        };
        ctx.api
            .update::<Network, _>(&scope, &network.id, &body)
            .await
            .map_err(|e| api_error("Failed to set default network policy", e))?;
    }

    let body = PolicyUpdate {
        policy: encode_rules(rules),
    };
    ctx.api
        .update::<Network, _>(&scope, &network.id, &body)
        .await
        .map_err(|e| api_error("Failed to set network policy", e))?;
    Ok(())
}

async fn apply_members<C: RancherApi>(
    ctx: Ctx<'_, C>,
    project_id: &str,
    resource: &Resource,
) -> ProviderResult<()> {
    let members = make_members(&resource.get_blocks("member"));
    if members.is_empty() {
        return Ok(());
    }
    log::info!("Setting {} members of {} ({})", members.len(), KIND, project_id);
    let input = serde_json::to_value(SetProjectMembersInput { members })
        .map_err(|e| ProviderError::new(format!("Failed to encode members: {}", e)))?;
    ctx.api
        .action::<Project, serde_json::Value>(&Scope::Global, project_id, "setmembers", Some(input))
        .await
        .map_err(|e| api_error(&format!("Failed setting members of {}", project_id), e))?;
    Ok(())
}

/// Attributes shared by the resource and the lookup
async fn project_attributes<C: RancherApi>(
    ctx: Ctx<'_, C>,
    project: &Project,
) -> ProviderResult<HashMap<String, Value>> {
    let scope = Scope::environment(&project.id);
    let network = default_network(ctx, project).await?;
    let policy = decode_rules(&network.policy);

    let members: Vec<ProjectMember> = list_all(ctx.api, &scope, &ListOpts::new())
        .await
        .map_err(|e| api_error(&format!("Failed to list members of {}", project.id), e))?;

    let orchestration = if project.orchestration.is_empty() {
        DEFAULT_ORCHESTRATION
    } else {
        &project.orchestration
    };

    let mut attrs = HashMap::from([
        ("name".to_string(), Value::from(project.name.as_str())),
        (
            "description".to_string(),
            Value::from(project.description.as_str()),
        ),
        ("orchestration".to_string(), Value::from(orchestration)),
        (
            "project_template_id".to_string(),
            Value::from(project.project_template_id.as_str()),
        ),
        (
            "default_policy".to_string(),
            Value::from(network.default_policy_action),
        ),
        ("policy".to_string(), policy),
    ]);
    if !members.is_empty() {
        attrs.insert(
            "member".to_string(),
            Value::List(normalize_members(&members)),
        );
    }
    Ok(attrs)
}

pub async fn read<C: RancherApi>(
    ctx: Ctx<'_, C>,
    resource: &Resource,
    identifier: &str,
) -> ProviderResult<State> {
    let project: Option<Project> = fetch(ctx.api, &Scope::Global, identifier, KIND).await?;
    let project = match project {
        Some(p) if !removed(&p.state) => p,
        Some(p) => return Ok(gone(&resource.id, KIND, identifier, Some(&p.state))),
        None => return Ok(gone(&resource.id, KIND, identifier, None)),
    };

    let attrs = project_attributes(ctx, &project).await?;
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(identifier))
}

pub async fn update<C: RancherApi>(
    ctx: Ctx<'_, C>,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    let rules = declared_rules(to)?;
    log::info!("Updating {} ({})", KIND, identifier);

    let body = UpdateProject {
        name: to.get_str("name"),
        description: to.get_str("description"),
    };
    let project: Project = ctx
        .api
        .update(&Scope::Global, identifier, &body)
        .await
        .map_err(|e| api_error(&format!("Failed to update {} ({})", KIND, identifier), e))?;

    apply_network_policy(ctx, &project, to, &rules).await?;
    apply_members(ctx, identifier, to).await?;

    read(ctx, to, identifier).await
}

pub async fn delete<C: RancherApi>(ctx: Ctx<'_, C>, identifier: &str) -> ProviderResult<()> {
    log::info!("Deleting {} ({})", KIND, identifier);
    teardown::<C, Project>(ctx.api, &Scope::Global, identifier, REMOVE, ctx.wait, KIND).await
}

/// Environments live in the global scope; the id is taken as is
pub fn import(id: &ResourceId, external_id: &str) -> State {
    State::existing(id.clone(), HashMap::new()).with_identifier(external_id)
}

/// Look an environment up by name
pub async fn lookup<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let name = resource.get_str("name");
    log::info!("Looking up {} {}", KIND, name);
    let conf = ctx
        .wait
        .conf(LOOKUP_PENDING, &["active"])
        .with_not_found_checks(DEFAULT_NOT_FOUND_CHECKS);
    let what = format!("{} {} to be found", KIND, name);
    let project: Project = await_named(ctx.api, &Scope::Global, conf, name, &what).await?;

    let attrs = project_attributes(ctx, &project).await?;
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(project.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::testing::{WAIT, resource};
    use rancher_client::mock::MockApi;
    use rancher_core::provider::ErrorKind;
    use serde_json::json;

    fn ctx(api: &MockApi) -> Ctx<'_, MockApi> {
        Ctx { api, wait: &WAIT }
    }

    fn project(state: &str) -> serde_json::Value {
        json!({
            "id": "1a5",
            "name": "prod",
            "state": state,
            "orchestration": "cattle",
            "projectTemplateId": "1pt1",
            "defaultNetworkId": "1n5"
        })
    }

    fn templates(api: MockApi) -> MockApi {
        api.with_snapshots(
            "projectTemplate",
            "1pt1",
            vec![json!({"id": "1pt1", "name": "cattle", "isPublic": true, "state": "active"})],
        )
        .with_snapshots(
            "projectTemplate",
            "1pt2",
            vec![json!({"id": "1pt2", "name": "kubernetes", "isPublic": true, "state": "active"})],
        )
        .with_snapshots(
            "projectTemplate",
            "1pt9",
            vec![json!({"id": "1pt9", "name": "cattle", "isPublic": false, "state": "active"})],
        )
    }

    fn network(policy: &str) -> serde_json::Value {
        json!({"id": "1n5", "state": "active", "defaultPolicyAction": policy, "policy": []})
    }

    #[tokio::test(start_paused = true)]
    async fn create_with_cattle_orchestration() {
        let api = templates(MockApi::new())
            .on_create("project", json!({"id": "1a5", "state": "registering"}))
            .with_snapshots("project", "1a5", vec![project("activating"), project("active")])
            .with_snapshots("network", "1n5", vec![network("allow")]);
        let declared = resource("rancher_environment", &[("name", "prod"), ("orchestration", "cattle")])
            .with_attribute("default_policy", "deny");

        let state = create(ctx(&api), &declared).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("1a5"));
        assert_eq!(state.get_str("project_template_id"), Some("1pt1"));
        assert_eq!(state.get_str("default_policy"), Some("deny"));
        assert_eq!(state.attributes["policy"], Value::List(vec![]));
        assert!(!state.attributes.contains_key("member"));

        let calls = api.calls();
        assert!(calls.contains(&"get project/1a5 = activating".to_string()));
        assert!(calls.contains(&"get project/1a5 = active".to_string()));
        assert_eq!(
            api.last_body("create project").unwrap(),
            json!({"name": "prod", "description": "", "projectTemplateId": "1pt1"})
        );
        assert!(!calls.iter().any(|c| c.contains("setmembers")));
    }

    #[tokio::test(start_paused = true)]
    async fn create_waits_for_default_network() {
        let pending = json!({"id": "1a5", "name": "prod", "state": "active", "defaultNetworkId": ""});
        let api = templates(MockApi::new())
            .on_create("project", json!({"id": "1a5", "state": "registering"}))
            .with_snapshots("project", "1a5", vec![pending.clone(), pending, project("active")])
            .with_snapshots("network", "1n5", vec![network("allow")]);
        let declared = resource("rancher_environment", &[("name", "prod"), ("orchestration", "cattle")]);

        create(ctx(&api), &declared).await.unwrap();

        let calls = api.calls();
        let first_network_update = calls
            .iter()
            .position(|c| c.starts_with("update network/1n5"))
            .unwrap();
        let gets_before = calls[..first_network_update]
            .iter()
            .filter(|c| c.starts_with("get project/1a5"))
            .count();
        assert_eq!(gets_before, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn create_pushes_policy_and_members() {
        let api = templates(MockApi::new())
            .on_create("project", json!({"id": "1a5"}))
            .with_snapshots("project", "1a5", vec![project("active")])
            .with_snapshots("network", "1n5", vec![network("allow")])
            .with_snapshots(
                "projectMember",
                "1pm1",
                vec![json!({"id": "1pm1", "state": "active", "externalId": "1a1", "externalIdType": "rancher_id", "role": "owner"})],
            );
        let rule = Value::Map(HashMap::from([
            ("action".to_string(), Value::from("allow")),
            ("from".to_string(), Value::from("app=web")),
            ("to".to_string(), Value::from("app=db")),
            ("ports".to_string(), Value::from("5432")),
        ]));
        let member = Value::Map(HashMap::from([
            ("external_id".to_string(), Value::from("1a1")),
            ("external_id_type".to_string(), Value::from("rancher_id")),
            ("role".to_string(), Value::from("owner")),
        ]));
        let declared = resource("rancher_environment", &[("name", "prod"), ("project_template_id", "1pt7")])
            .with_attribute("policy", Value::List(vec![rule]))
            .with_attribute("member", Value::List(vec![member.clone()]));

        let state = create(ctx(&api), &declared).await.unwrap();

        assert_eq!(
            api.last_body("update network/1n5").unwrap(),
            json!({"policy": [{
                "action": "allow",
                "from": {"selector": "app=web"},
                "to": {"selector": "app=db"},
                "ports": ["5432"]
            }]})
        );
        assert_eq!(
            api.last_body("action project/1a5 setmembers").unwrap()["members"][0]["role"],
            "owner"
        );
        assert_eq!(state.attributes["member"], Value::List(vec![member]));
        assert!(!api.calls().iter().any(|c| c.starts_with("list projectTemplate")));
    }

    #[tokio::test]
    async fn invalid_policy_is_rejected_before_any_call() {
        let api = MockApi::new();
        let rule = Value::Map(HashMap::from([
            ("action".to_string(), Value::from("allow")),
            ("from".to_string(), Value::from("a")),
            ("to".to_string(), Value::from("")),
        ]));
        let declared = resource("rancher_environment", &[("name", "prod"), ("orchestration", "cattle")])
            .with_attribute("policy", Value::List(vec![rule]));

        let err = create(ctx(&api), &declared).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("only one of"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn template_or_orchestration_is_required() {
        let api = MockApi::new();
        let err = create(ctx(&api), &resource("rancher_environment", &[("name", "prod")]))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Need either 'orchestration' or 'project_template_id'");

        let err = create(
            ctx(&api),
            &resource("rancher_environment", &[("name", "prod"), ("orchestration", "nomad")]),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "Invalid orchestration: nomad");
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_default_network_is_a_dependency_error() {
        let api = templates(MockApi::new())
            .on_create("project", json!({"id": "1a5"}))
            .with_snapshots("project", "1a5", vec![project("active")]);
        let declared = resource("rancher_environment", &[("name", "prod"), ("orchestration", "cattle")]);

        let err = create(ctx(&api), &declared).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingDependency);
    }

    #[tokio::test]
    async fn removed_project_reads_as_gone() {
        let api = MockApi::new().with_snapshots("project", "1a5", vec![project("removed")]);
        let declared = resource("rancher_environment", &[("name", "prod")]);

        let state = read(ctx(&api), &declared, "1a5").await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn read_defaults_orchestration_and_sets_empty_policy() {
        let mut bare = project("active");
        bare["orchestration"] = json!("");
        let api = MockApi::new()
            .with_snapshots("project", "1a5", vec![bare])
            .with_snapshots("network", "1n5", vec![network("allow")]);

        let state = read(ctx(&api), &resource("rancher_environment", &[]), "1a5")
            .await
            .unwrap();

        assert_eq!(state.get_str("orchestration"), Some("cattle"));
        assert_eq!(state.get_str("default_policy"), Some("allow"));
        assert_eq!(state.attributes["policy"], Value::List(vec![]));
    }

    #[tokio::test]
    async fn read_without_default_network_is_a_dependency_error() {
        let api = MockApi::new().with_snapshots("project", "1a5", vec![project("active")]);

        let err = read(ctx(&api), &resource("rancher_environment", &[]), "1a5")
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingDependency);
        assert!(err.message.contains("1a5"));
        assert!(api.calls().contains(&"get network/1n5 = none".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_without_default_network_is_a_dependency_error() {
        let api = MockApi::new().with_pages("project", vec![vec![project("active")]]);
        let declared = resource("rancher_environment", &[("name", "prod")]).with_read_only(true);

        let err = lookup(ctx(&api), &declared).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingDependency);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_finds_project_on_a_later_page() {
        let api = MockApi::new()
            .with_pages(
                "project",
                vec![
                    vec![json!({"id": "1a1", "name": "dev", "state": "active"})],
                    vec![project("active")],
                ],
            )
            .with_snapshots("network", "1n5", vec![network("deny")]);
        let declared = resource("rancher_environment", &[("name", "prod")]).with_read_only(true);

        let state = lookup(ctx(&api), &declared).await.unwrap();

        assert_eq!(state.identifier.as_deref(), Some("1a5"));
        assert_eq!(state.get_str("default_policy"), Some("deny"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_for_removal() {
        let api = MockApi::new()
            .with_snapshots("project", "1a5", vec![project("active")])
            .on_action(
                "project",
                "1a5",
                "delete",
                vec![project("removing"), project("removed")],
            );

        delete(ctx(&api), "1a5").await.unwrap();

        assert_eq!(api.calls().last().unwrap(), "get project/1a5 = removed");
    }
}
