//! Background synchronisation between a `StudySession` and the state API.
//!
//! Local state is always authoritative for the page. Saves are fired in
//! the background and never block or roll back a local mutation; failures
//! are logged and dropped.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::SyncError;
use crate::planner::StudyPlan;

use super::api::StateApi;
use super::render::{WidgetView, widget_view};
use super::session::{PlanForm, StudySession};

/// Spawn a save and log its failure. The returned handle is only useful to
/// callers that want to wait for the request, such as tests.
pub fn persist_best_effort<F>(label: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), SyncError>> + Send + 'static,
{
    tokio::spawn(async move {
        match fut.await {
            Ok(()) => tracing::debug!(target: "sync", what = label, "state saved"),
            Err(e) => tracing::warn!(target: "sync", what = label, error = %e, "failed to save state"),
        }
    })
}

/// Save the session's planner in the background.
pub fn persist_planner(api: &StateApi, session: &StudySession) -> JoinHandle<()> {
    let api = api.clone();
    let planner = session.planner().clone();
    persist_best_effort("planner", async move { api.put_planner(&planner).await })
}

/// Save the session's timeline in the background.
pub fn persist_tools(api: &StateApi, session: &StudySession) -> JoinHandle<()> {
    let api = api.clone();
    let tools = session.tools().clone();
    persist_best_effort("tools", async move { api.put_tools(&tools).await })
}

/// Load server state into the session. On any failure the session keeps
/// its local defaults and `false` is returned.
pub async fn bootstrap(api: &StateApi, session: &mut StudySession) -> bool {
    match api.fetch_state().await {
        Ok(payload) => {
            session.apply_remote_state(&payload);
            true
        }
        Err(e) => {
            tracing::warn!(
                target: "sync",
                user_id = api.user_id(),
                error = %e,
                "failed to load state, using local defaults"
            );
            false
        }
    }
}

/// A session wired to the API: each user action mutates local state and
/// schedules the matching save.
#[derive(Debug, Clone)]
pub struct StudyWidget {
    session: StudySession,
    api: StateApi,
}

impl StudyWidget {
    pub fn new(api: StateApi) -> Self {
        Self {
            session: StudySession::new(),
            api,
        }
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub async fn bootstrap(&mut self) -> bool {
        bootstrap(&self.api, &mut self.session).await
    }

    /// Returns `None` when the input is rejected and nothing was saved.
    pub fn log_hours(&mut self, raw: &str) -> Option<JoinHandle<()>> {
        self.session
            .log_hours(raw)
            .then(|| persist_planner(&self.api, &self.session))
    }

    pub fn submit_plan(&mut self, form: &PlanForm) -> (StudyPlan, JoinHandle<()>) {
        let plan = self.session.submit_plan(form).clone();
        (plan, persist_planner(&self.api, &self.session))
    }

    pub fn toggle_step(&mut self, index: usize, completed: bool) -> Option<JoinHandle<()>> {
        self.session
            .set_step_completed(index, completed)
            .then(|| persist_tools(&self.api, &self.session))
    }

    pub fn view(&self) -> WidgetView {
        widget_view(self.session.planner(), self.session.tools())
    }
}
