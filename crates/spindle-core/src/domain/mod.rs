//! Domain model: ids, status, task records, attempt history and events.

pub mod attempt;
pub mod events;
pub mod ids;
pub mod state;
pub mod task;

pub use attempt::AttemptRecord;
pub use events::TaskEvent;
pub use ids::{Id, IdMarker, TaskId};
pub use state::TaskStatus;
pub use task::{Task, TaskRecord};
