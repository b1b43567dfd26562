//! Finder - Resolve a name to a remote entity by walking list pages
//!
//! Lists are eventually consistent: a freshly created entity may be missing
//! from the first few listings. Lookups therefore run the finder inside the
//! poller, where "not found" keeps the wait going until the not-found budget
//! is spent.

use rancher_client::types::{ApiResource, ListOpts};
use rancher_client::{ClientError, ClientResult, RancherApi, Scope};
use rancher_core::provider::ProviderResult;
use rancher_core::wait::StateChangeConf;

use crate::lifecycle::wait_failed;

/// First entity matching `predicate`, scanning every page in order
pub async fn find_first<C, T, P>(
    api: &C,
    scope: &Scope,
    opts: &ListOpts,
    predicate: P,
) -> ClientResult<Option<T>>
where
    C: RancherApi,
    T: ApiResource,
    P: Fn(&T) -> bool,
{
    let mut page = api.list::<T>(scope, opts).await?;
    loop {
        if let Some(pos) = page.data.iter().position(&predicate) {
            return Ok(Some(page.data.swap_remove(pos)));
        }
        match api.next_page(&page).await? {
            Some(next) => page = next,
            None => return Ok(None),
        }
    }
}

/// First entity whose name is exactly `name`
pub async fn find_by_name<C, T>(api: &C, scope: &Scope, name: &str) -> ClientResult<Option<T>>
where
    C: RancherApi,
    T: ApiResource,
{
    let found = find_first(api, scope, &ListOpts::new(), |entity: &T| entity.name() == name).await?;
    match &found {
        Some(entity) => log::debug!(
            "Found {} {} with state {}",
            T::RESOURCE_TYPE,
            name,
            entity.state()
        ),
        None => log::debug!("{} {} not found", T::RESOURCE_TYPE, name),
    }
    Ok(found)
}

/// Every entity of a collection, across all pages
pub async fn list_all<C, T>(api: &C, scope: &Scope, opts: &ListOpts) -> ClientResult<Vec<T>>
where
    C: RancherApi,
    T: ApiResource,
{
    let mut page = api.list::<T>(scope, opts).await?;
    let mut all = std::mem::take(&mut page.data);
    while let Some(mut next) = api.next_page(&page).await? {
        all.append(&mut next.data);
        page = next;
    }
    Ok(all)
}

/// Wait until an entity matching `predicate` shows up in a target status
pub(crate) async fn await_found<C, T, P>(
    api: &C,
    scope: &Scope,
    conf: StateChangeConf,
    predicate: P,
    what: &str,
) -> ProviderResult<T>
where
    C: RancherApi,
    T: ApiResource,
    P: Fn(&T) -> bool + Copy,
{
    let opts = ListOpts::new();
    let opts = &opts;
    await_listed(conf, what, move || find_first(api, scope, opts, predicate)).await
}

/// Wait until the entity named `name` shows up in a target status
pub(crate) async fn await_named<C, T>(
    api: &C,
    scope: &Scope,
    conf: StateChangeConf,
    name: &str,
    what: &str,
) -> ProviderResult<T>
where
    C: RancherApi,
    T: ApiResource,
{
    await_listed(conf, what, move || find_by_name(api, scope, name)).await
}

/// Run a list search inside the poller; "not found" counts against the budget
async fn await_listed<T, F, Fut>(conf: StateChangeConf, what: &str, mut find: F) -> ProviderResult<T>
where
    T: ApiResource,
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    log::debug!("Waiting for {}", what);
    conf.await_state(move || {
        let search = find();
        async move {
            Ok::<_, ClientError>(search.await?.map(|entity| {
                let state = entity.state().to_string();
                (entity, state)
            }))
        }
    })
    .await
    .map_err(|e| wait_failed(what, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rancher_client::mock::MockApi;
    use rancher_client::types::Certificate;
    use serde_json::json;

    fn cert(id: &str, name: &str) -> serde_json::Value {
        json!({"id": id, "name": name, "state": "active"})
    }

    fn three_pages() -> MockApi {
        MockApi::new().with_pages(
            "certificate",
            vec![
                vec![cert("1c1", "alpha"), cert("1c2", "beta")],
                vec![cert("1c3", "gamma")],
                vec![cert("1c4", "delta")],
            ],
        )
    }

    #[tokio::test]
    async fn match_on_last_page() {
        let api = three_pages();

        let found: Option<Certificate> = find_by_name(&api, &Scope::Global, "delta").await.unwrap();

        assert_eq!(found.unwrap().id, "1c4");
        assert_eq!(
            api.calls(),
            vec![
                "list certificate page 0",
                "list certificate page 1",
                "list certificate page 2"
            ]
        );
    }

    #[tokio::test]
    async fn not_found_only_after_every_page() {
        let api = three_pages();

        let found: Option<Certificate> = find_by_name(&api, &Scope::Global, "omega").await.unwrap();

        assert!(found.is_none());
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn stops_at_first_match() {
        let api = three_pages();

        let found: Option<Certificate> = find_by_name(&api, &Scope::Global, "alpha").await.unwrap();

        assert_eq!(found.unwrap().id, "1c1");
        assert_eq!(api.calls(), vec!["list certificate page 0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn await_named_gives_up_after_not_found_budget() {
        let api = MockApi::new();
        let conf = StateChangeConf::new(&["active"], &["active"]).with_not_found_checks(5);

        let err = await_named::<_, Certificate>(&api, &Scope::environment("1a5"), conf, "web", "certificate web")
            .await
            .unwrap_err();

        assert_eq!(err.kind, rancher_core::provider::ErrorKind::Convergence);
        assert_eq!(
            api.calls_in(&Scope::environment("1a5")),
            vec!["list certificate page 0"; 6]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn await_named_returns_active_match() {
        let api = three_pages();
        let conf = StateChangeConf::new(&["activating"], &["active"]);

        let found: Certificate = await_named(&api, &Scope::Global, conf, "gamma", "certificate gamma")
            .await
            .unwrap();

        assert_eq!(found.id, "1c3");
    }

    #[tokio::test]
    async fn list_all_concatenates_pages() {
        let api = three_pages();
        let all: Vec<Certificate> = list_all(&api, &Scope::Global, &ListOpts::new()).await.unwrap();
        let names: Vec<&str> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma", "delta"]);
    }
}
