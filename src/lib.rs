//! # todo-store
//!
//! 个人待办工具的核心：一个文件支持的任务存储。任务保存在单个 JSON
//! 文件里，ID 单调分配、永不复用，数据文件损坏时从空集合恢复而不是
//! 崩溃。前端（文本菜单或图形列表）通过 [`TaskStore`] 的公开操作
//! 驱动存储，自己不接触文件。
//!
//! ```no_run
//! use todo_store::{NewTask, TaskPatch, TaskStore};
//!
//! # fn main() -> todo_store::Result<()> {
//! let mut store = TaskStore::open(todo_store::default_store_path())?;
//!
//! let id = store.add(NewTask::new("Buy milk"))?;
//! store.edit(id, TaskPatch {
//!     text: Some("Buy oat milk".to_string()),
//!     ..Default::default()
//! })?;
//! store.set_completed(id, true)?;
//!
//! for task in store.tasks() {
//!     println!("[{}] {} {}", if task.completed { "x" } else { " " }, task.id, task.text);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod storage;
mod store;

pub use error::{Result, TodoError};
pub use storage::default_store_path;
pub use storage::tasks::{
    parse_task_id, LoadOutcome, Task, TaskId, CATEGORIES, PRIORITIES,
};
pub use store::{NewTask, TaskPatch, TaskStore};
