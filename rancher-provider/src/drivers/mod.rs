//! Resource drivers
//!
//! One module per resource kind. Each driver turns declared attributes into a
//! typed request, issues it, waits for the entity to settle, and reads the
//! result back into an attribute bag.

pub mod api_key;
pub mod certificate;
pub mod environment;
pub mod host;
pub mod registration_token;
pub mod registry;
pub mod registry_credential;
pub mod secret;
pub mod setting;
pub mod stack;
pub mod volume;

use rancher_client::types::ApiResource;
use rancher_client::{RancherApi, Scope};
use rancher_core::provider::{ProviderError, ProviderResult};
use rancher_core::resource::{Resource, ResourceId, State};

use crate::lifecycle::WaitSettings;
use crate::utils::{api_error, attributes, split_id};

/// What every driver operation runs against
pub struct Ctx<'a, C> {
    pub api: &'a C,
    pub wait: &'a WaitSettings,
}

impl<C> Clone for Ctx<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Ctx<'_, C> {}

/// Scope of an environment-scoped resource
pub(crate) fn environment_scope(resource: &Resource) -> Scope {
    Scope::for_environment(resource.get_str("environment_id"))
}

/// State for an entity that no longer exists remotely
pub(crate) fn gone(id: &ResourceId, kind: &str, identifier: &str, state: Option<&str>) -> State {
    match state {
        Some(state) => log::warn!("{} ({}) is {}, removing from state", kind, identifier, state),
        None => log::warn!("{} ({}) not found, removing from state", kind, identifier),
    }
    State::not_found(id.clone())
}

/// Fetch one entity, mapping transport failures to a provider error
pub(crate) async fn fetch<C, T>(
    api: &C,
    scope: &Scope,
    identifier: &str,
    kind: &str,
) -> ProviderResult<Option<T>>
where
    C: RancherApi,
    T: ApiResource,
{
    api.by_id::<T>(scope, identifier)
        .await
        .map_err(|e| api_error(&format!("Failed to read {} ({})", kind, identifier), e))
}

/// Import `<parent>/<id>`, or a bare id whose parent is read off the entity
///
/// The returned state carries the identifier and `parent_attr`; the host
/// follows up with a read.
pub(crate) async fn import_with_parent<C, T>(
    api: &C,
    id: &ResourceId,
    external_id: &str,
    parent_attr: &str,
    parent_of: fn(&T) -> String,
) -> ProviderResult<State>
where
    C: RancherApi,
    T: ApiResource,
{
    let (parent, child) = split_id(external_id);
    let parent = match parent {
        Some(parent) => parent.to_string(),
        None => {
            let entity: T = fetch(api, &Scope::Global, child, T::RESOURCE_TYPE)
                .await?
                .ok_or_else(|| {
                    ProviderError::new(format!("Failed to find {} ({})", T::RESOURCE_TYPE, child))
                        .for_resource(id.clone())
                })?;
            parent_of(&entity)
        }
    };
    log::info!("Importing {} ({}) under {}", T::RESOURCE_TYPE, child, parent);

    Ok(
        State::existing(id.clone(), attributes([(parent_attr, parent.into())]))
            .with_identifier(child),
    )
}

/// Parent reference for resources owned by an environment
pub(crate) fn account_of<T: ApiResource>(entity: &T) -> String {
    entity.account_id().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    use rancher_core::resource::Resource;

    use crate::lifecycle::WaitSettings;

    /// Default wait timing; tests run on a paused clock
    pub static WAIT: WaitSettings = WaitSettings {
        timeout: rancher_core::wait::DEFAULT_TIMEOUT,
        delay: rancher_core::wait::DEFAULT_DELAY,
        min_timeout: rancher_core::wait::DEFAULT_MIN_TIMEOUT,
    };

    pub fn resource(type_name: &str, pairs: &[(&str, &str)]) -> Resource {
        pairs
            .iter()
            .fold(Resource::new(type_name, "test"), |r, (k, v)| {
                r.with_attribute(*k, *v)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rancher_client::mock::MockApi;
    use rancher_client::types::Volume;
    use serde_json::json;

    #[tokio::test]
    async fn composite_import_needs_no_lookup() {
        let api = MockApi::new();
        let id = ResourceId::new("rancher_volume", "data");

        let state = import_with_parent::<_, Volume>(&api, &id, "1a5/1v9", "environment_id", account_of)
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("1v9"));
        assert_eq!(state.get_str("environment_id"), Some("1a5"));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn bare_import_reads_parent_from_entity() {
        let api = MockApi::new().with_snapshots(
            "volume",
            "1v9",
            vec![json!({"id": "1v9", "state": "active", "accountId": "1a7"})],
        );
        let id = ResourceId::new("rancher_volume", "data");

        let state = import_with_parent::<_, Volume>(&api, &id, "1v9", "environment_id", account_of)
            .await
            .unwrap();

        assert_eq!(state.get_str("environment_id"), Some("1a7"));
    }

    #[tokio::test]
    async fn bare_import_of_missing_entity_fails() {
        let api = MockApi::new();
        let id = ResourceId::new("rancher_volume", "data");
        let err = import_with_parent::<_, Volume>(&api, &id, "1v9", "environment_id", account_of)
            .await
            .unwrap_err();
        assert!(err.message.contains("1v9"));
    }
}
