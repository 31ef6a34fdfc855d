//! Widget-side state: local session, HTTP client, background sync and
//! display projections.

pub mod api;
pub mod render;
pub mod session;
pub mod sync;

pub use api::StateApi;
pub use render::{PlanView, ProgressView, WidgetView, widget_view};
pub use session::{PlanForm, StudySession};
pub use sync::{StudyWidget, bootstrap, persist_best_effort, persist_planner, persist_tools};
