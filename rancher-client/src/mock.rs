//! Scripted in-memory [`RancherApi`] for driver tests
//!
//! Each `(type, id)` pair holds a queue of JSON snapshots. Every `by_id`
//! pops the front until one snapshot is left, which then repeats; a `null`
//! snapshot reads as "not found". Actions and deletes can swap in a new
//! queue, so a test scripts exactly which statuses the poller observes
//! after each call. Every call is appended to a log, together with the scope
//! it was addressed to, for ordering and addressing assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as Json;

use crate::api::{RancherApi, Scope};
use crate::error::{ClientError, ClientResult};
use crate::types::{ApiResource, Collection, ListOpts, Pagination, Template, TemplateVersion};

const NEXT_PREFIX: &str = "mock://";

type EntityKey = (String, String);
type ActionKey = (String, String, String);

#[derive(Default)]
struct Inner {
    snapshots: HashMap<EntityKey, VecDeque<Json>>,
    transitions: HashMap<ActionKey, Vec<Json>>,
    responses: HashMap<ActionKey, Json>,
    created: HashMap<String, VecDeque<Json>>,
    pages: HashMap<String, Vec<Vec<Json>>>,
    templates: HashMap<String, Json>,
    versions: HashMap<String, Json>,
    calls: Vec<(Option<Scope>, String)>,
    bodies: Vec<(String, Json)>,
}

/// In-memory API double
#[derive(Default)]
pub struct MockApi {
    inner: Mutex<Inner>,
}

fn entity_key(kind: &str, id: &str) -> EntityKey {
    (kind.to_string(), id.to_string())
}

fn action_key(kind: &str, id: &str, action: &str) -> ActionKey {
    (kind.to_string(), id.to_string(), action.to_string())
}

fn not_found(what: &str) -> ClientError {
    ClientError::status(404, format!("mock://{}", what), "Not Found")
}

fn state_of(snapshot: &Json) -> &str {
    snapshot.get("state").and_then(Json::as_str).unwrap_or("")
}

/// Shallow-merge object `patch` into `target`
fn merge(target: &mut Json, patch: &Json) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

fn matches_filters(item: &Json, opts: &ListOpts) -> bool {
    opts.filters.iter().all(|(key, expected)| match item.get(key) {
        Some(Json::String(s)) => s == expected,
        Some(Json::Bool(b)) => b.to_string() == *expected,
        Some(Json::Number(n)) => n.to_string() == *expected,
        _ => false,
    })
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Script the successive snapshots returned for one entity
    pub fn with_snapshots(self, kind: &str, id: &str, snapshots: Vec<Json>) -> Self {
        self.lock()
            .snapshots
            .insert(entity_key(kind, id), snapshots.into());
        self
    }

    /// Replace an entity's snapshot queue once `action` is invoked on it
    ///
    /// `delete` is treated as an action name.
    pub fn on_action(self, kind: &str, id: &str, action: &str, snapshots: Vec<Json>) -> Self {
        self.lock()
            .transitions
            .insert(action_key(kind, id, action), snapshots);
        self
    }

    /// Fixed response body for an action; defaults to the entity's snapshot
    pub fn action_response(self, kind: &str, id: &str, action: &str, response: Json) -> Self {
        self.lock()
            .responses
            .insert(action_key(kind, id, action), response);
        self
    }

    /// Queue the server's answer to the next create of `kind`
    ///
    /// The request body is merged under the scripted response, whose `id`
    /// must be set. If no snapshots were scripted for that id, the created
    /// entity becomes its only snapshot.
    pub fn on_create(self, kind: &str, response: Json) -> Self {
        self.lock()
            .created
            .entry(kind.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Script list pages for `kind`; without pages, lists are built from snapshots
    pub fn with_pages(self, kind: &str, pages: Vec<Vec<Json>>) -> Self {
        self.lock().pages.insert(kind.to_string(), pages);
        self
    }

    pub fn with_template(self, template: Json) -> Self {
        let id = template
            .get("id")
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        self.lock().templates.insert(id, template);
        self
    }

    pub fn with_template_version(self, url: &str, version: Json) -> Self {
        self.lock().versions.insert(url.to_string(), version);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.iter().map(|(_, label)| label.clone()).collect()
    }

    /// Calls addressed to `scope`, in order
    ///
    /// Page follow-ups and catalog calls carry no scope and are never listed.
    pub fn calls_in(&self, scope: &Scope) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(s, _)| s.as_ref() == Some(scope))
            .map(|(_, label)| label.clone())
            .collect()
    }

    /// Request bodies keyed by call label
    pub fn bodies(&self) -> Vec<(String, Json)> {
        self.lock().bodies.clone()
    }

    /// Most recent body sent with a call whose label starts with `prefix`
    pub fn last_body(&self, prefix: &str) -> Option<Json> {
        self.lock()
            .bodies
            .iter()
            .rev()
            .find(|(label, _)| label.starts_with(prefix))
            .map(|(_, body)| body.clone())
    }

    fn decode<T: DeserializeOwned>(value: Json) -> ClientResult<T> {
        Ok(serde_json::from_value(value)?)
    }

    /// Front snapshot of an entity, advancing the queue
    fn observe(inner: &mut Inner, kind: &str, id: &str) -> Option<Json> {
        let queue = inner.snapshots.get_mut(&entity_key(kind, id))?;
        let snapshot = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        snapshot.filter(|s| !s.is_null())
    }

    fn peek(inner: &Inner, kind: &str, id: &str) -> Option<Json> {
        inner
            .snapshots
            .get(&entity_key(kind, id))
            .and_then(|q| q.front().cloned())
            .filter(|s| !s.is_null())
    }

    fn transition(inner: &mut Inner, kind: &str, id: &str, action: &str) {
        if let Some(next) = inner.transitions.remove(&action_key(kind, id, action)) {
            inner.snapshots.insert(entity_key(kind, id), next.into());
        }
    }

    fn page(kind: &str, items: Vec<Json>, index: usize, total: usize) -> Json {
        let next = (index + 1 < total).then(|| format!("{}{}/{}", NEXT_PREFIX, kind, index + 1));
        let pagination = Pagination {
            next,
            ..Default::default()
        };
        serde_json::json!({ "data": items, "pagination": pagination })
    }

    fn list_page(inner: &Inner, kind: &str, index: usize, opts: &ListOpts) -> Option<Json> {
        if let Some(pages) = inner.pages.get(kind) {
            let items: Vec<Json> = pages
                .get(index)?
                .iter()
                .filter(|item| matches_filters(item, opts))
                .cloned()
                .collect();
            return Some(Self::page(kind, items, index, pages.len()));
        }
        if index > 0 {
            return None;
        }
        let mut items: Vec<Json> = inner
            .snapshots
            .iter()
            .filter(|((k, _), _)| k == kind)
            .filter_map(|(_, queue)| queue.front().filter(|s| !s.is_null()).cloned())
            .filter(|item| matches_filters(item, opts))
            .collect();
        items.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
        Some(Self::page(kind, items, 0, 1))
    }
}

#[async_trait]
impl RancherApi for MockApi {
    async fn by_id<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<Option<T>> {
        let mut inner = self.lock();
        let observed = Self::observe(&mut inner, T::RESOURCE_TYPE, id);
        let state = observed.as_ref().map(state_of).unwrap_or("none").to_string();
        inner.calls.push((
            Some(scope.clone()),
            format!("get {}/{} = {}", T::RESOURCE_TYPE, id, state),
        ));
        drop(inner);
        observed.map(Self::decode).transpose()
    }

    async fn list<T: ApiResource>(
        &self,
        scope: &Scope,
        opts: &ListOpts,
    ) -> ClientResult<Collection<T>> {
        let mut inner = self.lock();
        inner
            .calls
            .push((Some(scope.clone()), format!("list {} page 0", T::RESOURCE_TYPE)));
        let page = Self::list_page(&inner, T::RESOURCE_TYPE, 0, opts)
            .unwrap_or_else(|| Self::page(T::RESOURCE_TYPE, Vec::new(), 0, 1));
        drop(inner);
        Self::decode(page)
    }

    async fn next_page<T: ApiResource>(
        &self,
        page: &Collection<T>,
    ) -> ClientResult<Option<Collection<T>>> {
        let Some(next) = page.next_url() else {
            return Ok(None);
        };
        let index = next
            .strip_prefix(NEXT_PREFIX)
            .and_then(|rest| rest.rsplit_once('/'))
            .and_then(|(_, n)| n.parse::<usize>().ok())
            .ok_or_else(|| ClientError::Decode(format!("bad next link '{}'", next)))?;

        let mut inner = self.lock();
        inner
            .calls
            .push((None, format!("list {} page {}", T::RESOURCE_TYPE, index)));
        let page = Self::list_page(&inner, T::RESOURCE_TYPE, index, &ListOpts::default());
        drop(inner);
        page.map(Self::decode).transpose()
    }

    async fn create<T, B>(&self, scope: &Scope, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Encode(e.to_string()))?;
        let mut inner = self.lock();
        let label = format!("create {}", T::RESOURCE_TYPE);
        inner.calls.push((Some(scope.clone()), label.clone()));
        inner.bodies.push((label, body.clone()));

        let response = inner
            .created
            .get_mut(T::RESOURCE_TYPE)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| not_found(T::COLLECTION))?;
        let mut entity = body;
        merge(&mut entity, &response);

        let id = id_of(&entity);
        inner
            .snapshots
            .entry(entity_key(T::RESOURCE_TYPE, &id))
            .or_insert_with(|| VecDeque::from([entity.clone()]));
        drop(inner);
        Self::decode(entity)
    }

    async fn update<T, B>(&self, scope: &Scope, id: &str, body: &B) -> ClientResult<T>
    where
        T: ApiResource,
        B: Serialize + Sync,
    {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Encode(e.to_string()))?;
        let mut inner = self.lock();
        let label = format!("update {}/{}", T::RESOURCE_TYPE, id);
        inner.calls.push((Some(scope.clone()), label.clone()));
        inner.bodies.push((label, body.clone()));

        Self::transition(&mut inner, T::RESOURCE_TYPE, id, "update");
        let queue = inner
            .snapshots
            .get_mut(&entity_key(T::RESOURCE_TYPE, id))
            .ok_or_else(|| not_found(id))?;
        for snapshot in queue.iter_mut().filter(|s| !s.is_null()) {
            merge(snapshot, &body);
        }
        let current = Self::peek(&inner, T::RESOURCE_TYPE, id).ok_or_else(|| not_found(id))?;
        drop(inner);
        Self::decode(current)
    }

    async fn delete<T: ApiResource>(&self, scope: &Scope, id: &str) -> ClientResult<()> {
        let mut inner = self.lock();
        inner
            .calls
            .push((Some(scope.clone()), format!("delete {}/{}", T::RESOURCE_TYPE, id)));
        if Self::peek(&inner, T::RESOURCE_TYPE, id).is_none() {
            return Err(not_found(id));
        }
        Self::transition(&mut inner, T::RESOURCE_TYPE, id, "delete");
        Ok(())
    }

    async fn action<T, R>(
        &self,
        scope: &Scope,
        id: &str,
        action: &str,
        body: Option<Json>,
    ) -> ClientResult<R>
    where
        T: ApiResource,
        R: DeserializeOwned + Send + 'static,
    {
        let mut inner = self.lock();
        let label = format!("action {}/{} {}", T::RESOURCE_TYPE, id, action);
        inner.calls.push((Some(scope.clone()), label.clone()));
        if let Some(body) = body {
            inner.bodies.push((label, body));
        }

        let current = Self::peek(&inner, T::RESOURCE_TYPE, id).ok_or_else(|| not_found(id))?;
        Self::transition(&mut inner, T::RESOURCE_TYPE, id, action);
        let response = inner
            .responses
            .get(&action_key(T::RESOURCE_TYPE, id, action))
            .cloned()
            .or_else(|| Self::peek(&inner, T::RESOURCE_TYPE, id))
            .unwrap_or(current);
        drop(inner);
        Self::decode(response)
    }

    async fn template(&self, id: &str) -> ClientResult<Template> {
        let mut inner = self.lock();
        inner.calls.push((None, format!("template {}", id)));
        let template = inner.templates.get(id).cloned().ok_or_else(|| not_found(id))?;
        drop(inner);
        Self::decode(template)
    }

    async fn template_version(&self, url: &str) -> ClientResult<TemplateVersion> {
        let mut inner = self.lock();
        inner.calls.push((None, format!("template version {}", url)));
        let version = inner.versions.get(url).cloned().ok_or_else(|| not_found(url))?;
        drop(inner);
        Self::decode(version)
    }
}

fn id_of(entity: &Json) -> String {
    entity
        .get("id")
        .and_then(Json::as_str)
        .unwrap_or_default()
        .to_string()
}
