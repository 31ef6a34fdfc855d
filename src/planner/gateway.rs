//! State gateway: get-or-create and partial updates keyed by user id.
//!
//! The gateway owns the merge rules: each field of a partial update is
//! sanitized on its own and written only when it survives sanitization.
//! Dropped fields are logged and otherwise invisible to the caller.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::model::{
    PlanMergePolicy, PlannerState, PlannerUpdate, StateView, ToolsState, ToolsUpdate, UserState,
};
use super::sanitize::{
    clamp_logged_hours, clamp_weekly_goal, is_truthy, sanitize_plan, sanitize_snapshot_list,
    sanitize_timeline,
};
use crate::error::StateError;
use crate::store::StateStore;

/// Merge `update` into `planner`. Returns the names of fields that were
/// present but dropped by sanitization.
pub fn merge_planner(
    planner: &mut PlannerState,
    update: &PlannerUpdate,
    policy: PlanMergePolicy,
) -> Vec<&'static str> {
    let mut dropped = Vec::new();

    if let Some(raw) = &update.logged_hours {
        match clamp_logged_hours(raw) {
            Some(hours) => planner.logged_hours = hours,
            None => dropped.push("loggedHours"),
        }
    }

    if let Some(raw) = &update.weekly_goal {
        match clamp_weekly_goal(raw) {
            Some(goal) => planner.weekly_goal = goal,
            None => dropped.push("weeklyGoal"),
        }
    }

    if let Some(raw) = &update.snapshots {
        if raw.is_array() {
            planner.snapshots = sanitize_snapshot_list(raw);
        } else {
            dropped.push("snapshots");
        }
    }

    if let Some(raw) = &update.last_plan {
        match (sanitize_plan(raw), policy) {
            (Some(plan), _) => planner.last_plan = Some(plan),
            (None, PlanMergePolicy::OverwriteWithNull) => {
                planner.last_plan = None;
                dropped.push("lastPlan");
            }
            (None, PlanMergePolicy::SkipInvalid) => dropped.push("lastPlan"),
        }
    }

    dropped
}

/// Merge `update` into `tools`. A present, truthy timeline replaces the
/// stored one wholesale.
pub fn merge_tools(tools: &mut ToolsState, update: &ToolsUpdate) -> Vec<&'static str> {
    match &update.timeline {
        Some(raw) if is_truthy(raw) => {
            tools.timeline = sanitize_timeline(raw);
            Vec::new()
        }
        Some(_) => vec!["timeline"],
        None => Vec::new(),
    }
}

/// Storage-backed gateway for per-user state.
pub struct StateGateway {
    store: Arc<dyn StateStore>,
    plan_policy: PlanMergePolicy,
}

impl StateGateway {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            plan_policy: PlanMergePolicy::default(),
        }
    }

    /// Builder: set how invalid `lastPlan` updates are merged.
    pub fn with_plan_policy(mut self, policy: PlanMergePolicy) -> Self {
        self.plan_policy = policy;
        self
    }

    pub fn plan_policy(&self) -> PlanMergePolicy {
        self.plan_policy
    }

    /// Load the record for `user_id`, creating it with defaults on first
    /// access.
    ///
    /// A concurrent first access that loses the creation race gets
    /// `DatabaseError::Conflict` back; reading again will find the winner's
    /// record.
    pub async fn ensure_state(&self, user_id: &str) -> Result<UserState, StateError> {
        let user_id = validate_user_id(user_id)?;
        if let Some(state) = self.store.get_state(user_id).await? {
            return Ok(state);
        }

        let state = UserState::new(user_id);
        self.store.create_state(&state).await?;
        info!(user_id, id = %state.id, "Created default planner state");
        Ok(state)
    }

    /// Current `{planner, tools}` view for `user_id`.
    pub async fn get_state(&self, user_id: &str) -> Result<StateView, StateError> {
        Ok(self.ensure_state(user_id).await?.view())
    }

    /// Apply a partial planner update and return the stored planner.
    pub async fn update_planner(
        &self,
        user_id: &str,
        update: &PlannerUpdate,
    ) -> Result<PlannerState, StateError> {
        let mut state = self.ensure_state(user_id).await?;
        let dropped = merge_planner(&mut state.planner, update, self.plan_policy);
        if !dropped.is_empty() {
            debug!(user_id, ?dropped, "Dropped planner fields that failed sanitization");
        }
        self.store
            .update_planner(&state.user_id, &state.planner, Utc::now())
            .await?;
        Ok(state.planner)
    }

    /// Apply a partial tools update and return the stored tools.
    pub async fn update_tools(
        &self,
        user_id: &str,
        update: &ToolsUpdate,
    ) -> Result<ToolsState, StateError> {
        let mut state = self.ensure_state(user_id).await?;
        let dropped = merge_tools(&mut state.tools, update);
        if !dropped.is_empty() {
            debug!(user_id, ?dropped, "Dropped tools fields that failed sanitization");
        }
        self.store
            .update_tools(&state.user_id, &state.tools, Utc::now())
            .await?;
        Ok(state.tools)
    }
}

/// Reject blank ids. Anything else is used verbatim as the record key.
fn validate_user_id(user_id: &str) -> Result<&str, StateError> {
    if user_id.trim().is_empty() {
        Err(StateError::InvalidUserId)
    } else {
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::DateTime;
    use serde_json::json;

    use super::*;
    use crate::error::DatabaseError;
    use crate::planner::{Confidence, StudyPlan, TIMELINE_STEPS};
    use crate::store::LibSqlBackend;

    async fn test_gateway() -> StateGateway {
        let store: Arc<dyn StateStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        StateGateway::new(store)
    }

    fn planner_update(value: serde_json::Value) -> PlannerUpdate {
        serde_json::from_value(value).unwrap()
    }

    fn stored_plan() -> StudyPlan {
        StudyPlan {
            subject: "History".into(),
            topic: "1505 onwards".into(),
            hours: 4.0,
            confidence: Confidence::High,
        }
    }

    // ── merge_planner ───────────────────────────────────────────────

    #[test]
    fn absent_fields_are_untouched() {
        let mut planner = PlannerState {
            logged_hours: 3.0,
            weekly_goal: 15.0,
            snapshots: Vec::new(),
            last_plan: Some(stored_plan()),
        };
        let before = planner.clone();
        let dropped = merge_planner(&mut planner, &PlannerUpdate::default(), PlanMergePolicy::default());
        assert!(dropped.is_empty());
        assert_eq!(planner, before);
    }

    #[test]
    fn numeric_fields_are_clamped_or_dropped() {
        let mut planner = PlannerState::default();
        let dropped = merge_planner(
            &mut planner,
            &planner_update(json!({"loggedHours": 250, "weeklyGoal": "abc"})),
            PlanMergePolicy::default(),
        );
        assert_eq!(planner.logged_hours, 200.0);
        assert_eq!(planner.weekly_goal, 20.0);
        assert_eq!(dropped, vec!["weeklyGoal"]);
    }

    #[test]
    fn snapshots_replace_when_array_and_drop_otherwise() {
        let mut planner = PlannerState::default();
        merge_planner(
            &mut planner,
            &planner_update(json!({"snapshots": [{"subject": "Math", "topic": "Sets", "hours": 2}]})),
            PlanMergePolicy::default(),
        );
        assert_eq!(planner.snapshots.len(), 1);

        let dropped = merge_planner(
            &mut planner,
            &planner_update(json!({"snapshots": "none"})),
            PlanMergePolicy::default(),
        );
        assert_eq!(dropped, vec!["snapshots"]);
        assert_eq!(planner.snapshots.len(), 1);

        merge_planner(
            &mut planner,
            &planner_update(json!({"snapshots": []})),
            PlanMergePolicy::default(),
        );
        assert!(planner.snapshots.is_empty());
    }

    #[test]
    fn invalid_plan_is_skipped_under_skip_policy() {
        let mut planner = PlannerState {
            last_plan: Some(stored_plan()),
            ..PlannerState::default()
        };
        let dropped = merge_planner(
            &mut planner,
            &planner_update(json!({"lastPlan": {"subject": "", "topic": "x", "hours": 3}})),
            PlanMergePolicy::SkipInvalid,
        );
        assert_eq!(dropped, vec!["lastPlan"]);
        assert_eq!(planner.last_plan, Some(stored_plan()));
    }

    #[test]
    fn invalid_plan_clears_under_overwrite_policy() {
        let mut planner = PlannerState {
            last_plan: Some(stored_plan()),
            ..PlannerState::default()
        };
        merge_planner(
            &mut planner,
            &planner_update(json!({"lastPlan": {"subject": "", "topic": "x", "hours": 3}})),
            PlanMergePolicy::OverwriteWithNull,
        );
        assert_eq!(planner.last_plan, None);
    }

    #[test]
    fn null_plan_is_absent_under_both_policies() {
        for policy in [PlanMergePolicy::SkipInvalid, PlanMergePolicy::OverwriteWithNull] {
            let mut planner = PlannerState {
                last_plan: Some(stored_plan()),
                ..PlannerState::default()
            };
            merge_planner(&mut planner, &planner_update(json!({"lastPlan": null})), policy);
            assert_eq!(planner.last_plan, Some(stored_plan()), "{policy:?}");
        }
    }

    #[test]
    fn valid_plan_is_sanitized_and_written() {
        let mut planner = PlannerState::default();
        merge_planner(
            &mut planner,
            &planner_update(json!({"lastPlan": {
                "subject": "Math", "topic": "Algebra", "hours": 300, "confidence": "bogus"
            }})),
            PlanMergePolicy::default(),
        );
        let plan = planner.last_plan.unwrap();
        assert_eq!(plan.hours, 200.0);
        assert_eq!(plan.confidence, Confidence::Medium);
    }

    #[test]
    fn falsy_timeline_is_ignored() {
        let mut tools = ToolsState::default();
        tools.timeline[0].completed = true;
        let dropped = merge_tools(
            &mut tools,
            &ToolsUpdate {
                timeline: Some(json!(false)),
            },
        );
        assert_eq!(dropped, vec!["timeline"]);
        assert!(tools.timeline[0].completed);
    }

    // ── StateGateway ────────────────────────────────────────────────

    #[tokio::test]
    async fn ensure_state_is_idempotent() {
        let gateway = test_gateway().await;
        let first = gateway.ensure_state("u1").await.unwrap();
        let second = gateway.ensure_state("u1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.planner, second.planner);
        assert_eq!(second.planner.weekly_goal, 20.0);
        assert_eq!(second.tools.timeline.len(), TIMELINE_STEPS.len());
    }

    #[tokio::test]
    async fn blank_user_id_is_rejected() {
        let gateway = test_gateway().await;
        let err = gateway.ensure_state("   ").await.unwrap_err();
        assert!(matches!(err, StateError::InvalidUserId));
    }

    #[tokio::test]
    async fn update_planner_then_get_reflects_only_sent_fields() {
        let gateway = test_gateway().await;
        gateway
            .update_planner("u1", &planner_update(json!({"weeklyGoal": 30})))
            .await
            .unwrap();

        let planner = gateway
            .update_planner("u1", &planner_update(json!({"loggedHours": 5})))
            .await
            .unwrap();
        assert_eq!(planner.logged_hours, 5.0);

        let view = gateway.get_state("u1").await.unwrap();
        assert_eq!(view.planner.logged_hours, 5.0);
        assert_eq!(view.planner.weekly_goal, 30.0);
    }

    #[tokio::test]
    async fn update_tools_replaces_timeline() {
        let gateway = test_gateway().await;
        let tools = gateway
            .update_tools(
                "u1",
                &ToolsUpdate {
                    timeline: Some(json!([
                        {"step": "Conduct error analysis", "completed": true},
                        {"step": "Unknown step", "completed": true}
                    ])),
                },
            )
            .await
            .unwrap();
        assert_eq!(tools.completed_count(), 1);
        assert!(tools.timeline[3].completed);

        let view = gateway.get_state("u1").await.unwrap();
        assert_eq!(view.tools, tools);
    }

    #[tokio::test]
    async fn update_tools_without_timeline_keeps_stored() {
        let gateway = test_gateway().await;
        gateway
            .update_tools(
                "u1",
                &ToolsUpdate {
                    timeline: Some(json!([{"step": "Complete syllabus overview", "completed": true}])),
                },
            )
            .await
            .unwrap();
        let tools = gateway.update_tools("u1", &ToolsUpdate::default()).await.unwrap();
        assert!(tools.timeline[0].completed);
    }

    #[tokio::test]
    async fn user_ids_are_exact_keys() {
        let gateway = test_gateway().await;
        gateway
            .update_planner(" alice", &planner_update(json!({"loggedHours": 9})))
            .await
            .unwrap();

        assert_eq!(gateway.get_state("alice").await.unwrap().planner.logged_hours, 0.0);
        assert_eq!(gateway.get_state("alice ").await.unwrap().planner.logged_hours, 0.0);
        assert_eq!(gateway.get_state(" alice").await.unwrap().planner.logged_hours, 9.0);
    }

    /// Holds planner writes back so a tools write lands in between.
    struct SlowPlannerStore {
        inner: LibSqlBackend,
    }

    #[async_trait::async_trait]
    impl StateStore for SlowPlannerStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.inner.run_migrations().await
        }
        async fn get_state(&self, user_id: &str) -> Result<Option<UserState>, DatabaseError> {
            self.inner.get_state(user_id).await
        }
        async fn create_state(&self, state: &UserState) -> Result<(), DatabaseError> {
            self.inner.create_state(state).await
        }
        async fn update_planner(
            &self,
            user_id: &str,
            planner: &PlannerState,
            updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.inner.update_planner(user_id, planner, updated_at).await
        }
        async fn update_tools(
            &self,
            user_id: &str,
            tools: &ToolsState,
            updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            self.inner.update_tools(user_id, tools, updated_at).await
        }
    }

    #[tokio::test]
    async fn overlapping_planner_and_tools_saves_both_land() {
        let store = SlowPlannerStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
        };
        let gateway = StateGateway::new(Arc::new(store));
        gateway.ensure_state("u1").await.unwrap();

        let tools_update = ToolsUpdate {
            timeline: Some(json!([{"step": "Complete syllabus overview", "completed": true}])),
        };
        let planner_upd = planner_update(json!({"loggedHours": 5}));
        let (planner, tools) = tokio::join!(
            gateway.update_planner("u1", &planner_upd),
            gateway.update_tools("u1", &tools_update),
        );
        planner.unwrap();
        tools.unwrap();

        let view = gateway.get_state("u1").await.unwrap();
        assert_eq!(view.planner.logged_hours, 5.0);
        assert!(view.tools.timeline[0].completed);
    }

    // ── Failure propagation ─────────────────────────────────────────

    struct FailingStore;

    #[async_trait::async_trait]
    impl StateStore for FailingStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn get_state(&self, _user_id: &str) -> Result<Option<UserState>, DatabaseError> {
            Err(DatabaseError::Pool("connection refused".into()))
        }
        async fn create_state(&self, _state: &UserState) -> Result<(), DatabaseError> {
            unreachable!("get_state always fails first")
        }
        async fn update_planner(
            &self,
            _user_id: &str,
            _planner: &PlannerState,
            _updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            unreachable!("get_state always fails first")
        }
        async fn update_tools(
            &self,
            _user_id: &str,
            _tools: &ToolsState,
            _updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            unreachable!("get_state always fails first")
        }
    }

    /// Reports the record as missing, then loses the creation race.
    struct RacingStore;

    #[async_trait::async_trait]
    impl StateStore for RacingStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn get_state(&self, _user_id: &str) -> Result<Option<UserState>, DatabaseError> {
            Ok(None)
        }
        async fn create_state(&self, state: &UserState) -> Result<(), DatabaseError> {
            Err(DatabaseError::Conflict {
                user_id: state.user_id.clone(),
            })
        }
        async fn update_planner(
            &self,
            _user_id: &str,
            _planner: &PlannerState,
            _updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }
        async fn update_tools(
            &self,
            _user_id: &str,
            _tools: &ToolsState,
            _updated_at: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn storage_failure_carries_cause() {
        let gateway = StateGateway::new(Arc::new(FailingStore));
        let err = gateway.get_state("u1").await.unwrap_err();
        match err {
            StateError::Storage(DatabaseError::Pool(reason)) => {
                assert_eq!(reason, "connection refused")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn creation_race_surfaces_as_retryable_conflict() {
        let gateway = StateGateway::new(Arc::new(RacingStore));
        let err = gateway.ensure_state("u1").await.unwrap_err();
        match err {
            StateError::Storage(db_err) => assert!(db_err.is_retryable()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
