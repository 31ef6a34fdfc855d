//! Planner state: data model, sanitization, and the storage gateway.

pub mod gateway;
pub mod model;
pub mod sanitize;

pub use gateway::{StateGateway, merge_planner, merge_tools};
pub use model::{
    Confidence, PlanMergePolicy, PlannerState, PlannerUpdate, Snapshot, StateView, StudyPlan,
    TIMELINE_STEPS, TimelineEntry, ToolsState, ToolsUpdate, UserState,
};
