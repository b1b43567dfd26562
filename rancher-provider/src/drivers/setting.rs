//! Server setting lookup

use rancher_client::types::Setting;
use rancher_client::{RancherApi, Scope};
use rancher_core::provider::{ErrorKind, ProviderError, ProviderResult};
use rancher_core::resource::{Resource, State};

use super::{Ctx, fetch};
use crate::utils::attributes;

pub async fn lookup<C: RancherApi>(ctx: Ctx<'_, C>, resource: &Resource) -> ProviderResult<State> {
    let name = resource.get_str("name");
    log::info!("Looking up setting {}", name);

    let setting: Setting = fetch(ctx.api, &Scope::Global, name, "setting")
        .await?
        .ok_or_else(|| {
            ProviderError::new(format!("Setting {} not found", name))
                .with_kind(ErrorKind::MissingDependency)
        })?;

    let attrs = attributes([
        ("name", setting.name.into()),
        ("value", setting.value.into()),
    ]);
    Ok(State::existing(resource.id.clone(), attrs).with_identifier(name))
}
