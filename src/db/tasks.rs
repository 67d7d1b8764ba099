//! Task persistence.
//!
//! [`TaskStore`] is the storage seam the engine talks to. It is implemented
//! for `rusqlite::Connection`, so a transaction (which derefs to a
//! connection) can be handed to the engine and committed as a unit.

use super::{from_ms, to_ms};
use crate::types::{Period, Task, TaskId, TaskStatus};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

/// Create/read/update access to task records. Nothing is ever erased.
pub trait TaskStore {
    fn insert_task(&self, task: &Task) -> Result<()>;
    fn update_task(&self, task: &Task) -> Result<()>;
    fn get_task(&self, id: &TaskId) -> Result<Option<Task>>;
    /// Tasks whose hyphenated id starts with `prefix`.
    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Task>>;
    fn all_tasks(&self) -> Result<Vec<Task>>;
    /// All children of a parent in any status, ordered by mask index.
    fn children_of(&self, parent_id: &TaskId) -> Result<Vec<Task>>;
    /// Pending or waiting tasks that carry a period and have no parent.
    fn recurring_parents(&self) -> Result<Vec<Task>>;
    fn count_tasks(&self) -> Result<i64>;
}

fn conversion_err(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_uuid(row: &Row, column: &str) -> rusqlite::Result<Option<Uuid>> {
    let idx = row.as_ref().column_index(column)?;
    let text: Option<String> = row.get(idx)?;
    text.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn parse_time(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let idx = row.as_ref().column_index(column)?;
    let ms: Option<i64> = row.get(idx)?;
    ms.map(|ms| from_ms(ms).ok_or_else(|| conversion_err(idx, format!("timestamp out of range: {}", ms))))
        .transpose()
}

fn required<T>(value: Option<T>, row: &Row, column: &str) -> rusqlite::Result<T> {
    let idx = row.as_ref().column_index(column)?;
    value.ok_or_else(|| conversion_err(idx, format!("{} is null", column)))
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let id = required(parse_uuid(row, "id")?, row, "id")?;
    let description: String = row.get("description")?;

    let status_idx = row.as_ref().column_index("status")?;
    let status_text: String = row.get(status_idx)?;
    let status = TaskStatus::from_str(&status_text)
        .ok_or_else(|| conversion_err(status_idx, format!("unknown status '{}'", status_text)))?;

    let project: Option<String> = row.get("project")?;
    let priority: Option<String> = row.get("priority")?;

    let tags_idx = row.as_ref().column_index("tags")?;
    let tags_json: Option<String> = row.get(tags_idx)?;
    let tags: Vec<String> = tags_json
        .map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(tags_idx, e)))
        .transpose()?
        .unwrap_or_default();

    let recur_idx = row.as_ref().column_index("recur")?;
    let recur_json: Option<String> = row.get(recur_idx)?;
    let recur: Option<Period> = recur_json
        .map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(recur_idx, e)))
        .transpose()?;

    let mask_index: Option<u32> = row.get("mask_index")?;

    Ok(Task {
        id,
        description,
        status,
        project,
        priority,
        tags,
        entry: required(parse_time(row, "entry")?, row, "entry")?,
        modified: required(parse_time(row, "modified")?, row, "modified")?,
        end: parse_time(row, "end_time")?,
        due: parse_time(row, "due")?,
        until: parse_time(row, "until")?,
        recur,
        parent_id: parse_uuid(row, "parent_id")?,
        mask_index,
    })
}

fn query_tasks(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let tasks = stmt
        .query_map(args, parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn recur_json(task: &Task) -> Result<Option<String>> {
    Ok(task.recur.as_ref().map(serde_json::to_string).transpose()?)
}

impl TaskStore for Connection {
    fn insert_task(&self, task: &Task) -> Result<()> {
        self.execute(
            "INSERT INTO tasks (
                id, description, status, project, priority, tags,
                entry, modified, end_time, due, until, recur, parent_id, mask_index
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                task.id.to_string(),
                &task.description,
                task.status.as_str(),
                &task.project,
                &task.priority,
                serde_json::to_string(&task.tags)?,
                to_ms(task.entry),
                to_ms(task.modified),
                task.end.map(to_ms),
                task.due.map(to_ms),
                task.until.map(to_ms),
                recur_json(task)?,
                task.parent_id.map(|p| p.to_string()),
                task.mask_index,
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<()> {
        let updated = self.execute(
            "UPDATE tasks SET
                description = ?2, status = ?3, project = ?4, priority = ?5, tags = ?6,
                modified = ?7, end_time = ?8, due = ?9, until = ?10, recur = ?11
             WHERE id = ?1",
            params![
                task.id.to_string(),
                &task.description,
                task.status.as_str(),
                &task.project,
                &task.priority,
                serde_json::to_string(&task.tags)?,
                to_ms(task.modified),
                task.end.map(to_ms),
                task.due.map(to_ms),
                task.until.map(to_ms),
                recur_json(task)?,
            ],
        )?;
        if updated == 0 {
            return Err(anyhow!("Task not found: {}", task.id));
        }
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let mut stmt = self.prepare("SELECT * FROM tasks WHERE id = ?1")?;

        let result = stmt.query_row(params![id.to_string()], parse_task_row);

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_prefix(&self, prefix: &str) -> Result<Vec<Task>> {
        let prefix = prefix.trim().to_ascii_lowercase();
        // Only hex digits and hyphens can appear in an id; anything else
        // (including LIKE wildcards) cannot match.
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return Ok(Vec::new());
        }
        query_tasks(
            self,
            "SELECT * FROM tasks WHERE id LIKE ?1 || '%' ORDER BY entry",
            params![prefix],
        )
    }

    fn all_tasks(&self) -> Result<Vec<Task>> {
        query_tasks(
            self,
            "SELECT * FROM tasks ORDER BY entry, mask_index",
            [],
        )
    }

    fn children_of(&self, parent_id: &TaskId) -> Result<Vec<Task>> {
        query_tasks(
            self,
            "SELECT * FROM tasks WHERE parent_id = ?1 ORDER BY mask_index",
            params![parent_id.to_string()],
        )
    }

    fn recurring_parents(&self) -> Result<Vec<Task>> {
        query_tasks(
            self,
            "SELECT * FROM tasks
             WHERE recur IS NOT NULL AND parent_id IS NULL
               AND status IN ('pending', 'waiting')
             ORDER BY entry",
            [],
        )
    }

    fn count_tasks(&self) -> Result<i64> {
        let count: i64 = self.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(count)
    }
}
