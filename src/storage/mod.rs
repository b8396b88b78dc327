//! 本地数据文件存储
//!
//! 所有任务保存在单个 JSON 文件中。文件路径由调用方注入（便于测试），
//! 默认位于当前工作目录下的 `tasks.json`。

pub mod tasks;

use std::path::PathBuf;

/// 默认数据文件名
pub const DEFAULT_FILE_NAME: &str = "tasks.json";

/// 获取默认数据文件路径（当前工作目录下的 `tasks.json`）
pub fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_FILE_NAME)
}
