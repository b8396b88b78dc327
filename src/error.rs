//! todo-store 统一错误类型定义
//!
//! 使用 `thiserror` 库提供统一的错误处理，支持错误链式传播。
//! 所有可预期的失败（任务不存在、输入为空、保存失败）都以值的形式
//! 返回给调用方，错误消息可直接展示给用户。

use std::io;
use thiserror::Error;

use crate::storage::tasks::TaskId;

/// todo-store 错误类型
#[derive(Debug, Error)]
pub enum TodoError {
    /// I/O 错误（数据文件读写）
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON 序列化错误（保存时）
    #[error("JSON serialize error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// 任务不存在
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// 任务内容为空（新增或编辑时校验）
    #[error("Task text cannot be empty")]
    EmptyText,

    /// 用户输入的任务 ID 无法解析为数字
    #[error("Invalid task id: {0}")]
    InvalidId(String),
}

/// todo-store Result 类型别名
pub type Result<T> = std::result::Result<T, TodoError>;
