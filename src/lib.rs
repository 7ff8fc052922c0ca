// GoldTasks - household task manager core with key-value persistence

pub mod calendar;
pub mod config;
pub mod filter;
pub mod jsonl;
pub mod models;
pub mod record;
pub mod storage;
pub mod store;
pub mod task_store;
pub mod time;
pub mod user_store;
pub mod view;

// Re-export main types for convenience
pub use calendar::{CalendarDocument, export_calendar_event};
pub use config::Config;
pub use filter::Selector;
pub use models::{
    Category, NewCategory, NewTask, NewUser, Priority, Role, Task, TaskPatch, User, UserPatch,
    default_categories,
};
pub use record::Record;
pub use storage::{KeyValue, MemoryStorage, SaveHook};
pub use store::Store;
pub use task_store::TaskStore;
pub use user_store::UserStore;
pub use view::{EmptyState, badge_counts, count, filter_tasks, resolve_category};
