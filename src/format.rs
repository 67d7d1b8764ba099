//! Output formatting and report sorting for markdown and JSON.

use crate::integrity::IntegrityReport;
use crate::types::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Column a task list can be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Due,
    /// Nominal period length.
    Recur,
    Entry,
    Description,
}

impl SortField {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "due" => Some(SortField::Due),
            "recur" | "period" => Some(SortField::Recur),
            "entry" | "created" => Some(SortField::Entry),
            "description" | "desc" => Some(SortField::Description),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn new(field: SortField, descending: bool) -> Self {
        Self { field, descending }
    }

    /// Parse `field`, `field+` or `field-`. A trailing `-` sorts descending.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(field) = s.strip_suffix('-') {
            return SortField::from_str(field).map(|f| Self::new(f, true));
        }
        let field = s.strip_suffix('+').unwrap_or(s);
        SortField::from_str(field).map(|f| Self::new(f, false))
    }
}

// Missing values sort last in either direction.
fn cmp_present<T: Ord>(a: Option<T>, b: Option<T>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.cmp(&a),
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort; ties fall back to due date, then mask index.
pub fn sort_tasks(tasks: &mut [Task], key: SortKey) {
    tasks.sort_by(|a, b| {
        let primary = match key.field {
            SortField::Due => cmp_present(a.due, b.due, key.descending),
            SortField::Recur => cmp_present(
                a.recur.map(|p| p.nominal_seconds()),
                b.recur.map(|p| p.nominal_seconds()),
                key.descending,
            ),
            SortField::Entry => cmp_present(Some(a.entry), Some(b.entry), key.descending),
            SortField::Description => cmp_present(
                Some(a.description.to_lowercase()),
                Some(b.description.to_lowercase()),
                key.descending,
            ),
        };
        primary
            .then_with(|| cmp_present(a.due, b.due, false))
            .then_with(|| cmp_present(a.mask_index, b.mask_index, false))
    });
}

fn format_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task) -> String {
    let priority_marker = match task.priority.as_deref() {
        Some("H") | Some("high") => "!!! ",
        _ => "",
    };

    let due = task
        .due
        .map(|d| format!(" due {}", format_time(d)))
        .unwrap_or_default();

    let recur = task
        .recur
        .map(|r| format!(" ({})", r))
        .unwrap_or_default();

    let project = task
        .project
        .as_ref()
        .map(|p| format!(" [{}]", p))
        .unwrap_or_default();

    format!(
        "- {}{} `{}`{}{}{}\n",
        priority_marker,
        task.description,
        task.short_id(),
        project,
        due,
        recur,
    )
}

/// Format a list of tasks as markdown, in the order given.
pub fn format_tasks_markdown(tasks: &[Task]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Tasks ({})\n\n", tasks.len()));
    for task in tasks {
        md.push_str(&format_task_short(task));
    }

    md
}

/// Format the integrity report as markdown.
pub fn format_report_markdown(report: &IntegrityReport) -> String {
    let mut md = String::new();

    md.push_str("# Diagnostics\n\n");
    md.push_str(&format!("- **tasks**: {}\n", report.total));

    if report.duplicate_ids.is_empty() {
        md.push_str("- **duplicate ids**: none\n");
    } else {
        md.push_str(&format!("- **duplicate ids**: {}\n", report.duplicate_ids.len()));
        for id in &report.duplicate_ids {
            md.push_str(&format!("  - `{}`\n", id));
        }
    }

    if !report.duplicate_masks.is_empty() {
        md.push_str(&format!(
            "- **duplicate mask indices**: {}\n",
            report.duplicate_masks.len()
        ));
        for (parent, mask) in &report.duplicate_masks {
            md.push_str(&format!("  - `{}` #{}\n", parent, mask));
        }
    }

    if !report.series.is_empty() {
        md.push_str("\n## Recurring series\n\n");
        for series in &report.series {
            md.push_str(&format!(
                "- `{}` next {} [{}]\n",
                series.parent_id, series.next_mask, series.mask
            ));
        }
    }

    md
}

/// Summarize how a mutation landed, one line per changed task.
pub fn format_changed_markdown(verb: &str, changed: &[Task]) -> String {
    let mut md = String::new();
    for task in changed {
        let past = match task.status {
            TaskStatus::Deleted => "Deleted",
            TaskStatus::Completed => "Completed",
            _ if verb == "add" => "Created",
            _ => "Modified",
        };
        md.push_str(&format!("{} task `{}` '{}'.\n", past, task.short_id(), task.description));
    }
    md
}

/// Serialize any result for JSON output.
pub fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CalendarUnit, Period};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    fn with_period(desc: &str, period: Option<Period>) -> Task {
        let mut task = Task::new(desc, now());
        task.recur = period;
        task.due = Some(now() + Duration::days(1));
        task
    }

    #[test]
    fn test_sort_by_recur_both_directions() {
        let mut tasks = vec![
            with_period("monthly", Some(Period::calendar(CalendarUnit::Month))),
            with_period("daily", Some(Period::calendar(CalendarUnit::Day))),
            with_period("weekly", Some(Period::calendar(CalendarUnit::Week))),
        ];

        sort_tasks(&mut tasks, SortKey::new(SortField::Recur, false));
        let order: Vec<_> = tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["daily", "weekly", "monthly"]);

        sort_tasks(&mut tasks, SortKey::new(SortField::Recur, true));
        let order: Vec<_> = tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["monthly", "weekly", "daily"]);
    }

    #[test]
    fn test_missing_values_sort_last() {
        let mut tasks = vec![
            with_period("plain", None),
            with_period("hourly", Some(Period::exact(3_600))),
        ];
        sort_tasks(&mut tasks, SortKey::new(SortField::Recur, true));
        assert_eq!(tasks[1].description, "plain");
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(
            SortKey::parse("recur-"),
            Some(SortKey::new(SortField::Recur, true))
        );
        assert_eq!(
            SortKey::parse("due+"),
            Some(SortKey::new(SortField::Due, false))
        );
        assert_eq!(SortKey::parse("bogus"), None);
    }

    #[test]
    fn test_list_markdown_shows_period_and_short_id() {
        let task = with_period("stand-up", Some(Period::weekdays()));
        let md = format_tasks_markdown(std::slice::from_ref(&task));
        assert!(md.starts_with("# Tasks (1)"));
        assert!(md.contains("(weekdays)"));
        assert!(md.contains(&task.short_id()));
    }
}
