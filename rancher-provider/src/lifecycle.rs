//! Convergence waits and multi-phase teardown
//!
//! Every driver waits through [`await_entity`], which runs the core poller
//! against a by-id refresh. Deletion is a fixed sequence of [`Phase`]s per
//! resource kind; each phase issues one call and waits for its target status
//! before the next phase may start.

use std::time::Duration;

use rancher_client::types::ApiResource;
use rancher_client::{ClientError, RancherApi, Scope};
use rancher_core::provider::{ProviderError, ProviderResult};
use rancher_core::wait::{
    DEFAULT_DELAY, DEFAULT_MIN_TIMEOUT, DEFAULT_TIMEOUT, StateChangeConf, WaitError,
};

use crate::utils::{api_error, removed};

/// Timing applied to every wait issued by one provider instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    pub timeout: Duration,
    pub delay: Duration,
    pub min_timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            delay: DEFAULT_DELAY,
            min_timeout: DEFAULT_MIN_TIMEOUT,
        }
    }
}

impl WaitSettings {
    pub fn conf(&self, pending: &[&str], target: &[&str]) -> StateChangeConf {
        StateChangeConf::new(pending, target)
            .with_timeout(self.timeout)
            .with_delay(self.delay)
            .with_min_timeout(self.min_timeout)
    }
}

/// How a vanished entity reads during a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    /// Counts against the not-found budget
    NotFound,
    /// Reads as this status
    As(&'static str),
}

pub(crate) fn wait_failed(what: &str, err: WaitError<ClientError>) -> ProviderError {
    match err {
        WaitError::Refresh(e) => api_error(&format!("Error waiting for {}", what), e),
        other => ProviderError::convergence(format!("Error waiting for {}: {}", what, other))
            .with_cause(other),
    }
}

/// Poll one entity by id until `conf` is satisfied
///
/// Returns `None` when the wait ended on an entity that had vanished and
/// `missing` mapped that to a target status.
pub(crate) async fn await_entity<C, T>(
    api: &C,
    scope: &Scope,
    id: &str,
    conf: StateChangeConf,
    missing: Missing,
    what: &str,
) -> ProviderResult<Option<T>>
where
    C: RancherApi,
    T: ApiResource,
{
    log::debug!("Waiting for {}", what);
    conf.await_state(move || async move {
        let observed = api.by_id::<T>(scope, id).await?;
        Ok::<_, ClientError>(match (observed, missing) {
            (Some(entity), _) => {
                let state = entity.state().to_string();
                Some((Some(entity), state))
            }
            (None, Missing::As(state)) => Some((None, state.to_string())),
            (None, Missing::NotFound) => None,
        })
    })
    .await
    .map_err(|e| wait_failed(what, e))
}

/// Call issued at the start of a teardown phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Delete,
    Action(&'static str),
}

/// One transition of a teardown sequence
#[derive(Debug, Clone, Copy)]
pub(crate) struct Phase {
    pub step: Step,
    pub pending: &'static [&'static str],
    pub target: &'static [&'static str],
    /// Past participle used in messages ("deactivated", "removed")
    pub label: &'static str,
}

impl Phase {
    const fn delete(pending: &'static [&'static str]) -> Self {
        Self {
            step: Step::Delete,
            pending,
            target: &["removed"],
            label: "removed",
        }
    }

    const fn action(
        action: &'static str,
        pending: &'static [&'static str],
        target: &'static [&'static str],
        label: &'static str,
    ) -> Self {
        Self {
            step: Step::Action(action),
            pending,
            target,
            label,
        }
    }

    fn missing(&self) -> Missing {
        match self.target.first() {
            Some(&t) if removed(t) => Missing::As(t),
            _ => Missing::NotFound,
        }
    }
}

/// Single delete call
pub(crate) const REMOVE: &[Phase] = &[Phase::delete(&["active", "removed", "removing"])];

/// Single delete call for entities that may rest in `inactive`
pub(crate) const REMOVE_INACTIVE: &[Phase] =
    &[Phase::delete(&["active", "inactive", "removed", "removing"])];

/// Deactivate, then remove
pub(crate) const DEACTIVATE_REMOVE: &[Phase] = &[
    Phase::action(
        "deactivate",
        &["active", "inactive", "deactivating"],
        &["inactive"],
        "deactivated",
    ),
    Phase::action(
        "remove",
        &["inactive", "removed", "removing"],
        &["removed"],
        "removed",
    ),
];

/// Deactivate, remove, then purge
pub(crate) const DEACTIVATE_REMOVE_PURGE: &[Phase] = &[
    DEACTIVATE_REMOVE[0],
    DEACTIVATE_REMOVE[1],
    Phase::action(
        "purge",
        &["removed", "purging"],
        &["purged"],
        "purged",
    ),
];

/// Run a teardown sequence against one entity
///
/// Phases whose target the entity already sits in are skipped, so a
/// teardown interrupted half-way resumes where it stopped. An entity that is
/// already gone needs no teardown.
pub(crate) async fn teardown<C, T>(
    api: &C,
    scope: &Scope,
    id: &str,
    phases: &[Phase],
    wait: &WaitSettings,
    kind: &str,
) -> ProviderResult<()>
where
    C: RancherApi,
    T: ApiResource,
{
    let current = api
        .by_id::<T>(scope, id)
        .await
        .map_err(|e| api_error(&format!("Failed to read {} ({})", kind, id), e))?;
    let Some(current) = current else {
        log::info!("{} ({}) already gone", kind, id);
        return Ok(());
    };
    let mut state = current.state().to_string();
    if state == "purged" || phases.last().is_some_and(|p| p.target.contains(&state.as_str())) {
        log::info!("{} ({}) is already {}", kind, id, state);
        return Ok(());
    }

    for (i, phase) in phases.iter().enumerate() {
        let already_there = phase.target.contains(&state.as_str());
        let past_it = phases[i + 1..]
            .iter()
            .any(|later| later.target.contains(&state.as_str()));
        if already_there || past_it {
            log::debug!("{} ({}) is {}, skipping {:?}", kind, id, state, phase.step);
            continue;
        }

        let issued = match phase.step {
            Step::Delete => api.delete::<T>(scope, id).await,
            Step::Action(action) => api
                .action::<T, serde_json::Value>(scope, id, action, None)
                .await
                .map(|_| ()),
        };
        issued.map_err(|e| api_error(&format!("Error {} {} ({})", verb(phase.step), kind, id), e))?;

        let what = format!("{} ({}) to be {}", kind, id, phase.label);
        let reached = await_entity::<C, T>(
            api,
            scope,
            id,
            wait.conf(phase.pending, phase.target),
            phase.missing(),
            &what,
        )
        .await?;
        state = match reached {
            Some(entity) => entity.state().to_string(),
            None => phase.target.first().copied().unwrap_or_default().to_string(),
        };
    }

    Ok(())
}

fn verb(step: Step) -> &'static str {
    match step {
        Step::Delete => "deleting",
        Step::Action("deactivate") => "deactivating",
        Step::Action("remove") => "removing",
        Step::Action("purge") => "purging",
        Step::Action(_) => "updating",
    }
}
