//! 任务操作层：文本界面与图形界面共用的业务逻辑
//!
//! 原始程序的两个前端各自维护一份几乎相同的读写逻辑，完成状态的处理
//! 还不一致（文本端只能单向标记完成，图形端可来回切换）。这里收敛为
//! 一个 [`TaskStore`]：两种完成操作都是同一条"查找 → 修改 → 持久化"
//! 路径上的薄变体，前端只负责提示与展示。
//!
//! 所有修改操作在成功写盘后才算生效：写盘失败时回滚内存中的改动，
//! 保证 `Err` 意味着集合（内存与磁盘）完全未变。

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::error::{Result, TodoError};
use crate::storage::tasks::{load_tasks, save_tasks, LoadOutcome, Task, TaskId, TasksFile};

/// 新建任务的输入
///
/// `text` 必填；元数据缺省时由存储层补默认值（类目 "Personal"、
/// 优先级 "Medium"）。
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub text: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    /// 仅指定内容的新任务，元数据全部取默认
    pub fn new(text: impl Into<String>) -> Self {
        NewTask {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// 编辑任务的字段级补丁
///
/// 只有为 `Some` 的字段会被写回——图形端的编辑表单据此只提交用户
/// 改动过的字段。`due_date` 只能设置、不能清除（`None` 表示不改动）。
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TaskPatch {
    /// 补丁是否不包含任何改动
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
    }
}

/// 任务存储：内存中的任务集合 + 到数据文件的持久化
///
/// 路径由调用方注入，没有任何模块级可变状态；测试可以指向临时目录。
#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    file: TasksFile,
    load_outcome: LoadOutcome,
}

impl TaskStore {
    /// 打开数据文件并装载任务集合
    ///
    /// 文件不存在与内容损坏都不算失败（后者丢弃内容、从空集合开始），
    /// 具体情况通过 [`load_outcome`](Self::load_outcome) 可见；真正的
    /// 读 I/O 错误（如权限不足）返回 `Err`。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let (file, load_outcome) = load_tasks(&path)?;
        Ok(TaskStore {
            path,
            file,
            load_outcome,
        })
    }

    /// 本次打开时的装载结果
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// 数据文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 当前任务集合（插入顺序，不做任何变换）
    pub fn tasks(&self) -> &[Task] {
        &self.file.tasks
    }

    /// 按 ID 查找任务（编辑表单用它预填现有字段）
    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.file.find(id)
    }

    pub fn len(&self) -> usize {
        self.file.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file.tasks.is_empty()
    }

    /// 新增任务，返回分配的 ID
    ///
    /// 内容去除首尾空白后必须非空，否则返回 [`TodoError::EmptyText`]
    /// 且集合不变。ID 来自持久化的单调计数器，已删除任务的 ID 不会被
    /// 复用。
    pub fn add(&mut self, new_task: NewTask) -> Result<TaskId> {
        let text = new_task.text.trim().to_string();
        if text.is_empty() {
            return Err(TodoError::EmptyText);
        }

        let snapshot = self.file.clone();
        let id = self.file.allocate_id();
        self.file.tasks.push(Task::new(
            id,
            text,
            new_task.category,
            new_task.priority,
            new_task.due_date,
        ));
        self.commit(snapshot)?;
        debug!(id, "task added");
        Ok(id)
    }

    /// 按补丁编辑任务，刷新修改时间
    ///
    /// 未知 ID 返回 [`TodoError::NotFound`]；补丁把内容改为空白返回
    /// [`TodoError::EmptyText`]。两种情况下集合都不变。
    pub fn edit(&mut self, id: TaskId, patch: TaskPatch) -> Result<()> {
        let text = match patch.text {
            Some(raw) => {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    return Err(TodoError::EmptyText);
                }
                Some(trimmed)
            }
            None => None,
        };
        if self.file.find(id).is_none() {
            return Err(TodoError::NotFound(id));
        }

        let snapshot = self.file.clone();
        {
            // 上面已确认存在
            let task = self.file.find_mut(id).ok_or(TodoError::NotFound(id))?;
            if let Some(text) = text {
                task.text = text;
            }
            if let Some(category) = patch.category {
                task.category = category;
            }
            if let Some(priority) = patch.priority {
                task.priority = priority;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = Some(due_date);
            }
            task.updated_at = Utc::now();
        }
        self.commit(snapshot)?;
        debug!(id, "task edited");
        Ok(())
    }

    /// 删除任务，返回被删除的记录
    ///
    /// 删除是终态：该 ID 此后不会再出现。未知 ID 返回
    /// [`TodoError::NotFound`]。
    pub fn delete(&mut self, id: TaskId) -> Result<Task> {
        let index = self
            .file
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(TodoError::NotFound(id))?;

        let snapshot = self.file.clone();
        let removed = self.file.tasks.remove(index);
        self.commit(snapshot)?;
        debug!(id, "task deleted");
        Ok(removed)
    }

    /// 设置完成状态（文本界面的单向 `mark_completed` 即
    /// `set_completed(id, true)`），幂等，但每次成功调用都刷新修改时间
    pub fn set_completed(&mut self, id: TaskId, completed: bool) -> Result<()> {
        self.flip_completed(id, |_| completed)?;
        Ok(())
    }

    /// 切换完成状态（图形界面用），返回切换后的新状态
    pub fn toggle_completed(&mut self, id: TaskId) -> Result<bool> {
        self.flip_completed(id, |current| !current)
    }

    /// 两种完成操作共用的"查找 → 修改 → 持久化"路径
    fn flip_completed(&mut self, id: TaskId, next: impl FnOnce(bool) -> bool) -> Result<bool> {
        if self.file.find(id).is_none() {
            return Err(TodoError::NotFound(id));
        }

        let snapshot = self.file.clone();
        let new_state = {
            let task = self.file.find_mut(id).ok_or(TodoError::NotFound(id))?;
            task.completed = next(task.completed);
            task.updated_at = Utc::now();
            task.completed
        };
        self.commit(snapshot)?;
        debug!(id, completed = new_state, "task completion updated");
        Ok(new_state)
    }

    /// 整体重写数据文件；失败时恢复快照，使本次修改成为空操作
    fn commit(&mut self, snapshot: TasksFile) -> Result<()> {
        if let Err(e) = save_tasks(&self.path, &self.file) {
            self.file = snapshot;
            return Err(e);
        }
        Ok(())
    }
}
