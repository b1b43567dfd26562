//! Typed snapshots of Rancher API resources
//!
//! Every snapshot is a point-in-time view decoded from the v2-beta API.
//! Missing fields decode to their defaults. The server reports unset
//! values either by omitting them or as explicit `null`; both decode the same.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Decode `null` as the field's default
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A resource type served under its own collection endpoint
pub trait ApiResource: DeserializeOwned + Send + Sync + 'static {
    /// Singular API type name (e.g., "project")
    const RESOURCE_TYPE: &'static str;
    /// Collection path segment (e.g., "projects")
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// Lifecycle status; empty when the server did not report one
    fn state(&self) -> &str;
    /// Owning account (environment) reference
    fn account_id(&self) -> &str;
}

macro_rules! api_resource {
    ($ty:ident, $type_name:expr, $collection:expr) => {
        impl ApiResource for $ty {
            const RESOURCE_TYPE: &'static str = $type_name;
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.name
            }
            fn state(&self) -> &str {
                &self.state
            }
            fn account_id(&self) -> &str {
                &self.account_id
            }
        }
    };
}

/// Environment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(skip_serializing, deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub orchestration: String,
    #[serde(deserialize_with = "null_default")]
    pub project_template_id: String,
    #[serde(deserialize_with = "null_default")]
    pub default_network_id: String,
    pub removed: Option<String>,
}
api_resource!(Project, "project", "projects");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectTemplate {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub is_public: bool,
}
api_resource!(ProjectTemplate, "projectTemplate", "projecttemplates");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Network {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub default_policy_action: String,
    #[serde(deserialize_with = "null_default")]
    pub policy: Vec<NetworkPolicyRule>,
}
api_resource!(Network, "network", "networks");

/// One network policy rule in its nested wire form
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkPolicyRule {
    #[serde(deserialize_with = "null_default")]
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_default")]
    pub within: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub between: Option<NetworkPolicyRuleBetween>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NetworkPolicyRuleMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NetworkPolicyRuleMember>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "null_default")]
    pub ports: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkPolicyRuleBetween {
    #[serde(deserialize_with = "null_default")]
    pub group_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkPolicyRuleMember {
    #[serde(deserialize_with = "null_default")]
    pub selector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectMember {
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_default")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_default")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_default")]
    pub state: String,
    #[serde(skip_serializing, deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub external_id: String,
    #[serde(deserialize_with = "null_default")]
    pub external_id_type: String,
    #[serde(deserialize_with = "null_default")]
    pub role: String,
}
api_resource!(ProjectMember, "projectMember", "projectmembers");

/// Input of the project `setmembers` action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetProjectMembersInput {
    pub members: Vec<ProjectMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stack {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub docker_compose: String,
    #[serde(deserialize_with = "null_default")]
    pub rancher_compose: String,
    #[serde(deserialize_with = "null_default")]
    pub environment: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub external_id: String,
    #[serde(deserialize_with = "null_default")]
    pub system: bool,
    #[serde(deserialize_with = "null_default")]
    pub start_on_create: bool,
    pub removed: Option<String>,
}
api_resource!(Stack, "stack", "stacks");

/// Input of the stack `upgrade` action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackUpgrade {
    pub docker_compose: String,
    pub rancher_compose: String,
    pub environment: HashMap<String, String>,
    pub external_id: String,
}

/// Rendered compose files returned by the stack `exportconfig` action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComposeConfig {
    #[serde(deserialize_with = "null_default")]
    pub docker_compose_config: String,
    #[serde(deserialize_with = "null_default")]
    pub rancher_compose_config: String,
}

/// Input of the stack `exportconfig` action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposeConfigInput {
    pub service_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub value: String,
}
api_resource!(Secret, "secret", "secrets");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub driver: String,
}
api_resource!(Volume, "volume", "volumes");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKey {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_default")]
    pub public_value: String,
    #[serde(deserialize_with = "null_default")]
    pub secret_value: String,
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
}
api_resource!(ApiKey, "apiKey", "apikeys");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Certificate {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub cert: String,
    #[serde(deserialize_with = "null_default")]
    pub key: String,
    #[serde(deserialize_with = "null_default")]
    pub cert_chain: String,
    #[serde(rename = "CN", deserialize_with = "null_default")]
    pub cn: String,
    #[serde(deserialize_with = "null_default")]
    pub algorithm: String,
    #[serde(deserialize_with = "null_default")]
    pub cert_fingerprint: String,
    #[serde(deserialize_with = "null_default")]
    pub expires_at: String,
    #[serde(deserialize_with = "null_default")]
    pub issued_at: String,
    #[serde(deserialize_with = "null_default")]
    pub issuer: String,
    #[serde(deserialize_with = "null_default")]
    pub key_size: i64,
    #[serde(deserialize_with = "null_default")]
    pub serial_number: String,
    #[serde(deserialize_with = "null_default")]
    pub subject_alternative_names: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub version: String,
}
api_resource!(Certificate, "certificate", "certificates");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationToken {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub command: String,
    #[serde(deserialize_with = "null_default")]
    pub registration_url: String,
    #[serde(deserialize_with = "null_default")]
    pub token: String,
    #[serde(deserialize_with = "null_default")]
    pub image: String,
}
api_resource!(RegistrationToken, "registrationToken", "registrationtokens");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registry {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub server_address: String,
}
api_resource!(Registry, "registry", "registries");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryCredential {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub registry_id: String,
    #[serde(deserialize_with = "null_default")]
    pub email: String,
    #[serde(deserialize_with = "null_default")]
    pub public_value: String,
    #[serde(deserialize_with = "null_default")]
    pub secret_value: String,
}
api_resource!(RegistryCredential, "registryCredential", "registrycredentials");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Host {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_default")]
    pub labels: HashMap<String, String>,
}
api_resource!(Host, "host", "hosts");

/// Server setting, addressed by its name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Setting {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub value: String,
}
api_resource!(Setting, "setting", "settings");

/// Catalog template (served by the catalog API, not v2-beta)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Template {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    /// Version name to version URL
    #[serde(deserialize_with = "null_default")]
    pub version_links: HashMap<String, String>,
}

/// One version of a catalog template with its file bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateVersion {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub version: String,
    #[serde(deserialize_with = "null_default")]
    pub files: HashMap<String, String>,
}

/// Pagination block of a collection response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub first: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub limit: Option<i64>,
    pub total: Option<i64>,
    #[serde(deserialize_with = "null_default")]
    pub partial: bool,
}

/// One page of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Collection<T> {
    /// URL of the following page, if the server reported one
    pub fn next_url(&self) -> Option<&str> {
        self.pagination
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Query filters for list calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOpts {
    pub filters: Vec<(String, String)>,
}

impl ListOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_project_with_missing_fields() {
        let project: Project = serde_json::from_value(json!({
            "id": "1a5",
            "type": "project",
            "name": "prod",
            "state": "active",
            "defaultNetworkId": "1n5"
        }))
        .unwrap();

        assert_eq!(project.id(), "1a5");
        assert_eq!(project.default_network_id, "1n5");
        assert_eq!(project.description, "");
        assert!(project.removed.is_none());
    }

    #[test]
    fn null_fields_decode_as_defaults() {
        let project: Project = serde_json::from_value(json!({
            "id": "1a5",
            "name": "prod",
            "description": null,
            "orchestration": null,
            "removed": null
        }))
        .unwrap();
        assert_eq!(project.description, "");
        assert_eq!(project.orchestration, "");
        assert!(project.removed.is_none());

        let stack: Stack = serde_json::from_value(json!({
            "id": "1st1",
            "externalId": null,
            "environment": null,
            "system": null
        }))
        .unwrap();
        assert_eq!(stack.external_id, "");
        assert!(stack.environment.is_empty());
        assert!(!stack.system);

        let cert: Certificate = serde_json::from_value(json!({
            "id": "1c1",
            "keySize": null,
            "subjectAlternativeNames": null
        }))
        .unwrap();
        assert_eq!(cert.key_size, 0);
        assert!(cert.subject_alternative_names.is_empty());
    }

    #[test]
    fn policy_rule_omits_empty_fields() {
        let rule = NetworkPolicyRule {
            action: "allow".to_string(),
            within: "stack".to_string(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&rule).unwrap(),
            json!({"action": "allow", "within": "stack"})
        );
    }

    #[test]
    fn collection_next_url() {
        let page: Collection<Certificate> = serde_json::from_value(json!({
            "type": "collection",
            "data": [{"id": "1c1", "name": "web", "state": "active", "CN": "example.com"}],
            "pagination": {"next": "http://rancher/v2-beta/certificates?marker=m1", "partial": true}
        }))
        .unwrap();

        assert_eq!(page.data[0].cn, "example.com");
        assert_eq!(
            page.next_url(),
            Some("http://rancher/v2-beta/certificates?marker=m1")
        );

        let last: Collection<Certificate> =
            serde_json::from_value(json!({"data": [], "pagination": {"next": null}})).unwrap();
        assert_eq!(last.next_url(), None);
    }
}
