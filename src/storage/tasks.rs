//! 任务记录与数据文件读写
//!
//! 规范的持久化格式是单个 JSON 对象 `{ "next_id": N, "tasks": [...] }`；
//! 同时兼容读取早期版本写出的裸数组格式与旧字段形态（见 `TaskCompat`）。
//! 解析失败不向上抛错：数据文件损坏时丢弃内容、从空集合开始，结果通过
//! [`LoadOutcome`] 反映给调用方。

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TodoError};

/// 任务 ID（单调递增分配，删除后不复用）
pub type TaskId = u32;

/// 类目建议列表（仅作输入提示，不做强校验：任意字符串都可接受）
pub const CATEGORIES: [&str; 5] = ["Personal", "Work", "Shopping", "Health", "Other"];

/// 优先级建议列表（仅作输入提示，不做强校验）
pub const PRIORITIES: [&str; 3] = ["High", "Medium", "Low"];

/// 任务记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TaskCompat")]
pub struct Task {
    /// 任务 ID（分配后不可变）
    pub id: TaskId,
    /// 任务内容（非空）
    pub text: String,
    /// 类目（缺省 "Personal"）
    pub category: String,
    /// 优先级（缺省 "Medium"）
    pub priority: String,
    /// 截止日期（可选）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最近一次修改时间
    pub updated_at: DateTime<Utc>,
    /// 完成状态
    pub completed: bool,
}

impl Task {
    /// 创建一条新任务记录：填充缺省元数据，两个时间戳取当前时间，初始未完成
    pub(crate) fn new(
        id: TaskId,
        text: String,
        category: Option<String>,
        priority: Option<String>,
        due_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Task {
            id,
            text,
            category: category.unwrap_or_else(default_category),
            priority: priority.unwrap_or_else(default_priority),
            due_date,
            created_at: now,
            updated_at: now,
            completed: false,
        }
    }
}

/// 反序列化兼容层：同时接受规范格式与旧字段形态
///
/// - "task" 是 "text" 的旧字段名
/// - 时间戳接受 RFC 3339 与旧格式 "%Y-%m-%d %H:%M:%S"（按 UTC 处理）
/// - 缺失的 `updated_at` 回退为 `created_at`
/// - 无法解析的 `due_date` 按缺失处理（早期数据里存在空串）
#[derive(Deserialize)]
struct TaskCompat {
    id: TaskId,
    #[serde(alias = "task")]
    text: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default = "default_priority")]
    priority: String,
    #[serde(default, deserialize_with = "deserialize_lenient_date")]
    due_date: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
}

impl From<TaskCompat> for Task {
    fn from(raw: TaskCompat) -> Self {
        let updated_at = raw.updated_at.unwrap_or(raw.created_at);
        Task {
            id: raw.id,
            text: raw.text,
            category: raw.category,
            priority: raw.priority,
            due_date: raw.due_date,
            created_at: raw.created_at,
            updated_at,
            completed: raw.completed,
        }
    }
}

fn default_category() -> String {
    "Personal".to_string()
}

fn default_priority() -> String {
    "Medium".to_string()
}

/// 解析时间戳：优先 RFC 3339，其次旧格式 "%Y-%m-%d %H:%M:%S"（按 UTC）
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_timestamp(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", value)))
}

fn deserialize_opt_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_timestamp))
}

/// 宽松解析截止日期：空串或无法解析的值按缺失处理
fn deserialize_lenient_date<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

/// 任务数据文件结构
///
/// `next_id` 与集合一同持久化、只增不减，保证任务删除后其 ID 不会被
/// 复用——包括跨进程重启。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TasksFile {
    /// 下一个待分配的任务 ID
    #[serde(default)]
    pub next_id: TaskId,
    /// 任务列表（保持插入顺序）
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TasksFile {
    /// 空数据文件（首个 ID 从 1 开始）
    pub fn empty() -> Self {
        TasksFile {
            next_id: 1,
            tasks: Vec::new(),
        }
    }

    /// 从裸数组格式构造，next_id 由最大现存 ID 推导
    fn from_legacy(tasks: Vec<Task>) -> Self {
        let mut file = TasksFile { next_id: 0, tasks };
        file.normalize();
        file
    }

    /// 修复 next_id：保证严格大于所有现存 ID 且至少为 1
    ///
    /// 手工编辑过的文件可能带着缺失或过小的 next_id，统一在装载时修复，
    /// 避免新任务与现存任务撞 ID。
    fn normalize(&mut self) {
        let min_next = self
            .tasks
            .iter()
            .map(|t| t.id)
            .max()
            .unwrap_or(0)
            .saturating_add(1);
        if self.next_id < min_next {
            self.next_id = min_next;
        }
    }

    /// 分配一个新任务 ID（调用方负责持久化）
    pub fn allocate_id(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id = id.saturating_add(1);
        id
    }

    /// 按 ID 查找任务
    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// 按 ID 查找任务（可变引用）
    pub fn find_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}

/// 打开数据文件时的装载结果
///
/// 解析失败不算致命错误（损坏的文件不应让工具无法启动），但结果在此
/// 类型中可见，调用方可据此提示用户。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// 文件读取并解析成功
    Loaded,
    /// 文件不存在，从空集合开始
    Missing,
    /// 文件内容无法解析，已丢弃并从空集合开始
    Recovered {
        /// 底层解析错误描述
        error: String,
    },
}

/// 解析数据文件内容
///
/// 规范格式是 `{ next_id, tasks }` 对象；裸数组同样接受。两条路径都
/// 失败时，裸数组内容报数组侧错误（对排查损坏记录更有用），否则报
/// 对象侧错误。
fn parse_tasks_file(content: &str) -> serde_json::Result<TasksFile> {
    match serde_json::from_str::<TasksFile>(content) {
        Ok(mut file) => {
            file.normalize();
            Ok(file)
        }
        Err(object_err) => match serde_json::from_str::<Vec<Task>>(content) {
            Ok(tasks) => Ok(TasksFile::from_legacy(tasks)),
            Err(array_err) => {
                if content.trim_start().starts_with('[') {
                    Err(array_err)
                } else {
                    Err(object_err)
                }
            }
        },
    }
}

/// 读取任务数据文件
///
/// 文件不存在视为空集合；内容无法解析时丢弃并从空集合开始（通过
/// [`LoadOutcome::Recovered`] 反映，原文件保持原样，直到下次保存被
/// 整体重写）。真正的 I/O 错误（如权限不足）原样返回。
pub(crate) fn load_tasks(path: &Path) -> Result<(TasksFile, LoadOutcome)> {
    if !path.exists() {
        return Ok((TasksFile::empty(), LoadOutcome::Missing));
    }

    let content = std::fs::read_to_string(path)?;
    match parse_tasks_file(&content) {
        Ok(file) => Ok((file, LoadOutcome::Loaded)),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "tasks file is unparseable; starting from an empty list"
            );
            Ok((
                TasksFile::empty(),
                LoadOutcome::Recovered {
                    error: e.to_string(),
                },
            ))
        }
    }
}

/// 保存任务数据文件（整体重写）
///
/// 无部分写保护：写入中途崩溃可能留下损坏的文件，属可接受范围——
/// 装载侧会以空集合恢复。
pub(crate) fn save_tasks(path: &Path, file: &TasksFile) -> Result<()> {
    let content = serde_json::to_string_pretty(file)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    debug!(path = %path.display(), tasks = file.tasks.len(), "tasks file rewritten");
    Ok(())
}

/// 解析用户输入的任务 ID
///
/// 供文本界面使用：非数字输入是用户错误，以 [`TodoError::InvalidId`]
/// 返回，绝不 panic。
pub fn parse_task_id(input: &str) -> Result<TaskId> {
    let trimmed = input.trim();
    trimmed
        .parse::<TaskId>()
        .map_err(|_| TodoError::InvalidId(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_canonical_format() {
        let json = r#"{
            "next_id": 5,
            "tasks": [
                {
                    "id": 3,
                    "text": "Water plants",
                    "category": "Personal",
                    "priority": "Low",
                    "due_date": "2025-03-01",
                    "created_at": "2025-02-20T10:00:00Z",
                    "updated_at": "2025-02-21T08:30:00Z",
                    "completed": false
                }
            ]
        }"#;

        let file = parse_tasks_file(json).unwrap();
        assert_eq!(file.next_id, 5);
        assert_eq!(file.tasks.len(), 1);

        let task = &file.tasks[0];
        assert_eq!(task.id, 3);
        assert_eq!(task.text, "Water plants");
        assert_eq!(task.category, "Personal");
        assert_eq!(task.priority, "Low");
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(
            task.created_at,
            Utc.with_ymd_and_hms(2025, 2, 20, 10, 0, 0).unwrap()
        );
        assert_eq!(
            task.updated_at,
            Utc.with_ymd_and_hms(2025, 2, 21, 8, 30, 0).unwrap()
        );
        assert!(!task.completed);
    }

    #[test]
    fn test_parse_legacy_array() {
        // 早期版本写出的格式：裸数组、"task" 字段名、本地化的时间戳
        let json = r#"[
            {
                "id": 1,
                "task": "Buy milk",
                "created_at": "2024-05-01 09:30:00",
                "completed": false
            },
            {
                "id": 2,
                "task": "Dentist",
                "category": "Health",
                "priority": "High",
                "due_date": "2024-06-15",
                "created_at": "2024-05-02 08:00:00",
                "completed": true
            }
        ]"#;

        let file = parse_tasks_file(json).unwrap();
        assert_eq!(file.tasks.len(), 2);
        assert_eq!(file.next_id, 3);

        let first = &file.tasks[0];
        assert_eq!(first.text, "Buy milk");
        assert_eq!(first.category, "Personal");
        assert_eq!(first.priority, "Medium");
        assert_eq!(first.due_date, None);
        assert_eq!(
            first.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
        );
        // 缺失的 updated_at 回退为创建时间
        assert_eq!(first.updated_at, first.created_at);

        let second = &file.tasks[1];
        assert_eq!(second.category, "Health");
        assert_eq!(second.due_date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert!(second.completed);
    }

    #[test]
    fn test_parse_repairs_next_id() {
        // next_id 缺失或过小时由最大现存 ID 修复
        let stale = r#"{
            "next_id": 2,
            "tasks": [
                {"id": 7, "text": "a", "created_at": "2025-01-01T00:00:00Z"}
            ]
        }"#;
        let file = parse_tasks_file(stale).unwrap();
        assert_eq!(file.next_id, 8);

        // 已经更大的 next_id 保持不变（删除过的 ID 不回收）
        let ahead = r#"{
            "next_id": 40,
            "tasks": [
                {"id": 7, "text": "a", "created_at": "2025-01-01T00:00:00Z"}
            ]
        }"#;
        let file = parse_tasks_file(ahead).unwrap();
        assert_eq!(file.next_id, 40);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(parse_tasks_file("{{{").is_err());
        assert!(parse_tasks_file("\"hello\"").is_err());
        assert!(parse_tasks_file("[1, 2, 3]").is_err());

        // 数组内容非法时报数组侧错误
        let err = parse_tasks_file(r#"[{"id": 1}]"#).unwrap_err();
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn test_lenient_due_date() {
        let json = |due: &str| {
            format!(
                r#"[{{"id": 1, "text": "a", "due_date": {}, "created_at": "2025-01-01T00:00:00Z"}}]"#,
                due
            )
        };

        let file = parse_tasks_file(&json("\"\"")).unwrap();
        assert_eq!(file.tasks[0].due_date, None);

        let file = parse_tasks_file(&json("\"soon\"")).unwrap();
        assert_eq!(file.tasks[0].due_date, None);

        let file = parse_tasks_file(&json("null")).unwrap();
        assert_eq!(file.tasks[0].due_date, None);

        let file = parse_tasks_file(&json("\"2025-12-31\"")).unwrap();
        assert_eq!(file.tasks[0].due_date, NaiveDate::from_ymd_opt(2025, 12, 31));
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2024-05-01T09:30:00Z"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-05-01T09:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).unwrap())
        );
        assert_eq!(
            parse_timestamp("2024-05-01 09:30:00"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap())
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_due_date_omitted_when_none() {
        let task = Task::new(1, "a".to_string(), None, None, None);
        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("due_date"));

        let task = Task::new(1, "a".to_string(), None, None, NaiveDate::from_ymd_opt(2025, 1, 15));
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"due_date\":\"2025-01-15\""));
    }

    #[test]
    fn test_allocate_id_monotonic() {
        let mut file = TasksFile::empty();
        assert_eq!(file.allocate_id(), 1);
        assert_eq!(file.allocate_id(), 2);
        assert_eq!(file.next_id, 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let (file, outcome) = load_tasks(&dir.path().join("tasks.json")).unwrap();
        assert_eq!(outcome, LoadOutcome::Missing);
        assert!(file.tasks.is_empty());
        assert_eq!(file.next_id, 1);
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");
        std::fs::write(&path, "this is not json").unwrap();

        let (file, outcome) = load_tasks(&path).unwrap();
        assert!(file.tasks.is_empty());
        match outcome {
            LoadOutcome::Recovered { error } => assert!(!error.is_empty()),
            other => panic!("expected Recovered, got {:?}", other),
        }

        // 装载不触碰原文件
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "this is not json");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let mut file = TasksFile::empty();
        let id = file.allocate_id();
        file.tasks.push(Task::new(
            id,
            "Buy milk".to_string(),
            Some("Shopping".to_string()),
            Some("High".to_string()),
            NaiveDate::from_ymd_opt(2025, 6, 1),
        ));
        save_tasks(&path, &file).unwrap();

        let (loaded, outcome) = load_tasks(&path).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(loaded.next_id, file.next_id);
        assert_eq!(loaded.tasks, file.tasks);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("tasks.json");
        save_tasks(&path, &TasksFile::empty()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_parse_task_id() {
        assert_eq!(parse_task_id("42").unwrap(), 42);
        assert_eq!(parse_task_id("  7 ").unwrap(), 7);

        assert!(matches!(
            parse_task_id("abc"),
            Err(TodoError::InvalidId(s)) if s == "abc"
        ));
        assert!(matches!(parse_task_id(""), Err(TodoError::InvalidId(_))));
        assert!(matches!(parse_task_id("3.5"), Err(TodoError::InvalidId(_))));
        assert!(matches!(parse_task_id("-1"), Err(TodoError::InvalidId(_))));
    }
}
