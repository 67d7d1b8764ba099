//! Core types for the task tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable task identifier. Never reused, not even after deletion.
pub type TaskId = Uuid;

const DAY_SECONDS: i64 = 86_400;

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
    Waiting,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
            TaskStatus::Waiting => "waiting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "deleted" => Some(TaskStatus::Deleted),
            "waiting" => Some(TaskStatus::Waiting),
            _ => None,
        }
    }

    /// Pending and waiting tasks are still "live".
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Waiting)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar unit used by named periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarUnit {
    Day,
    Week,
    Month,
    Year,
}

impl CalendarUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarUnit::Day => "day",
            CalendarUnit::Week => "week",
            CalendarUnit::Month => "month",
            CalendarUnit::Year => "year",
        }
    }

    /// Nominal length in seconds (months are 30 days, years 365).
    pub fn nominal_seconds(&self) -> i64 {
        match self {
            CalendarUnit::Day => DAY_SECONDS,
            CalendarUnit::Week => 7 * DAY_SECONDS,
            CalendarUnit::Month => 30 * DAY_SECONDS,
            CalendarUnit::Year => 365 * DAY_SECONDS,
        }
    }
}

/// A parsed recurrence period.
///
/// Calendar periods respect variable month and year lengths when advanced;
/// exact periods are plain duration addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Period {
    Calendar {
        unit: CalendarUnit,
        step: u32,
        skip_weekends: bool,
    },
    Exact {
        seconds: i64,
    },
}

impl Period {
    /// One step of the given calendar unit.
    pub fn calendar(unit: CalendarUnit) -> Self {
        Period::Calendar {
            unit,
            step: 1,
            skip_weekends: false,
        }
    }

    /// The `weekdays` period: one calendar day, skipping Saturday and Sunday.
    pub fn weekdays() -> Self {
        Period::Calendar {
            unit: CalendarUnit::Day,
            step: 1,
            skip_weekends: true,
        }
    }

    pub fn exact(seconds: i64) -> Self {
        Period::Exact { seconds }
    }

    /// Nominal length used to order periods against each other.
    pub fn nominal_seconds(&self) -> i64 {
        match *self {
            Period::Calendar { unit, step, .. } => unit.nominal_seconds() * i64::from(step),
            Period::Exact { seconds } => seconds,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Period::Calendar {
                unit: CalendarUnit::Day,
                step: 1,
                skip_weekends: true,
            } => f.write_str("weekdays"),
            Period::Calendar { unit, step, .. } => match (unit, step) {
                (CalendarUnit::Day, 1) => f.write_str("daily"),
                (CalendarUnit::Week, 1) => f.write_str("weekly"),
                (CalendarUnit::Week, 2) => f.write_str("biweekly"),
                (CalendarUnit::Month, 1) => f.write_str("monthly"),
                (CalendarUnit::Month, 2) => f.write_str("bimonthly"),
                (CalendarUnit::Month, 3) => f.write_str("quarterly"),
                (CalendarUnit::Month, 6) => f.write_str("semiannual"),
                (CalendarUnit::Year, 1) => f.write_str("yearly"),
                (CalendarUnit::Year, 2) => f.write_str("biyearly"),
                (unit, step) => write!(f, "every {} {}s", step, unit.as_str()),
            },
            Period::Exact { seconds } => f.write_str(&format_iso_duration(seconds)),
        }
    }
}

/// Render seconds as an ISO-8601 duration (`P1DT2H`, `PT90S`).
pub fn format_iso_duration(seconds: i64) -> String {
    if seconds == 0 {
        return "PT0S".to_string();
    }
    let sign = if seconds < 0 { "-" } else { "" };
    let mut rest = seconds.unsigned_abs();
    let days = rest / 86_400;
    rest %= 86_400;
    let hours = rest / 3_600;
    rest %= 3_600;
    let minutes = rest / 60;
    let secs = rest % 60;

    let mut out = format!("{}P", sign);
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || secs > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if secs > 0 {
            out.push_str(&format!("{}S", secs));
        }
    }
    out
}

/// A task record. Recurring parents and their generated children share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    pub project: Option<String>,
    pub priority: Option<String>,
    pub tags: Vec<String>,
    pub entry: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub due: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub recur: Option<Period>,
    /// Back-reference to the recurring parent; parents do not own children.
    pub parent_id: Option<TaskId>,
    /// Dense position within the parent's generated series.
    pub mask_index: Option<u32>,
}

impl Task {
    /// A fresh pending task with a new v4 id.
    pub fn new(description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            status: TaskStatus::Pending,
            project: None,
            priority: None,
            tags: Vec::new(),
            entry: now,
            modified: now,
            end: None,
            due: None,
            until: None,
            recur: None,
            parent_id: None,
            mask_index: None,
        }
    }

    /// A recurring definition: carries a period and is not itself an instance.
    pub fn is_recurring_parent(&self) -> bool {
        self.recur.is_some() && self.parent_id.is_none()
    }

    /// Parents that still seed new instances.
    pub fn is_active_parent(&self) -> bool {
        self.is_recurring_parent() && self.status.is_open()
    }

    /// Short identifier for display (first 8 hex characters).
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// Field-level edit applied to one or more tasks.
///
/// Outer `None` leaves a field alone; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub description: Option<String>,
    pub project: Option<Option<String>>,
    pub priority: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub due: Option<Option<DateTime<Utc>>>,
    pub until: Option<Option<DateTime<Utc>>>,
    pub recur: Option<Period>,
}

impl FieldEdit {
    pub fn is_empty(&self) -> bool {
        self == &FieldEdit::default()
    }

    fn apply(&self, task: &mut Task) {
        if let Some(ref description) = self.description {
            task.description = description.clone();
        }
        if let Some(ref project) = self.project {
            task.project = project.clone();
        }
        if let Some(ref priority) = self.priority {
            task.priority = priority.clone();
        }
        if let Some(ref tags) = self.tags {
            task.tags = tags.clone();
        }
        if let Some(due) = self.due {
            task.due = due;
        }
        if let Some(until) = self.until {
            task.until = until;
        }
        if let Some(recur) = self.recur {
            task.recur = Some(recur);
        }
    }
}

/// A change proposed against a task and, optionally, its later siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    Edit(FieldEdit),
    Delete,
}

impl Mutation {
    /// Apply the mutation to a task, stamping `modified`.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        match self {
            Mutation::Edit(edit) => edit.apply(task),
            Mutation::Delete => {
                task.status = TaskStatus::Deleted;
                task.end = Some(now);
            }
        }
        task.modified = now;
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Mutation::Edit(_) => "modify",
            Mutation::Delete => "delete",
        }
    }
}
