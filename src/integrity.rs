//! Integrity checks over the full task set.

use crate::error::{RecurError, RecurResult};
use crate::types::{Task, TaskId, TaskStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::error;

/// Fails on the first id that appears twice.
pub fn check_no_duplicate_ids(tasks: &[Task]) -> RecurResult<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.id) {
            error!(id = %task.id, "duplicate task id");
            return Err(RecurError::DuplicateId(task.id));
        }
    }
    Ok(())
}

/// Fails on the first mask index used twice under one parent.
pub fn check_mask_indices(tasks: &[Task]) -> RecurResult<()> {
    let mut seen = HashSet::new();
    for task in tasks {
        if let (Some(parent), Some(mask_index)) = (task.parent_id, task.mask_index) {
            if !seen.insert((parent, mask_index)) {
                error!(%parent, mask_index, "duplicate mask index");
                return Err(RecurError::DuplicateMask { parent, mask_index });
            }
        }
    }
    Ok(())
}

/// One recurring series as seen by `diag`.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub parent_id: TaskId,
    pub next_mask: u32,
    /// One character per mask position: `-` pending, `+` completed,
    /// `X` deleted, `W` waiting, space for a gap.
    pub mask: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub total: usize,
    pub duplicate_ids: Vec<TaskId>,
    pub duplicate_masks: Vec<(TaskId, u32)>,
    pub series: Vec<SeriesSummary>,
}

impl IntegrityReport {
    pub fn is_ok(&self) -> bool {
        self.duplicate_ids.is_empty() && self.duplicate_masks.is_empty()
    }

    /// The report itself, or the first violation it found.
    pub fn into_result(self) -> RecurResult<Self> {
        if let Some(id) = self.duplicate_ids.first() {
            return Err(RecurError::DuplicateId(*id));
        }
        if let Some(&(parent, mask_index)) = self.duplicate_masks.first() {
            return Err(RecurError::DuplicateMask { parent, mask_index });
        }
        Ok(self)
    }
}

fn status_mark(status: TaskStatus) -> char {
    match status {
        TaskStatus::Pending => '-',
        TaskStatus::Completed => '+',
        TaskStatus::Deleted => 'X',
        TaskStatus::Waiting => 'W',
    }
}

/// Build a full report without stopping at the first violation.
pub fn diagnose(tasks: &[Task]) -> IntegrityReport {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    let mut duplicate_ids = Vec::new();
    for task in tasks {
        if !seen_ids.insert(task.id) && !duplicate_ids.contains(&task.id) {
            duplicate_ids.push(task.id);
        }
    }

    let mut by_parent: BTreeMap<TaskId, Vec<&Task>> = BTreeMap::new();
    for task in tasks.iter().filter(|t| t.is_recurring_parent()) {
        by_parent.entry(task.id).or_default();
    }
    for task in tasks {
        if let (Some(parent), Some(_)) = (task.parent_id, task.mask_index) {
            by_parent.entry(parent).or_default().push(task);
        }
    }

    let mut duplicate_masks = Vec::new();
    let mut series = Vec::with_capacity(by_parent.len());
    for (parent_id, children) in by_parent {
        let next_mask = children
            .iter()
            .filter_map(|c| c.mask_index)
            .max()
            .map_or(0, |m| m + 1);
        let mut mask = vec![' '; next_mask as usize];
        let mut seen_masks = HashSet::new();
        for child in &children {
            let Some(index) = child.mask_index else { continue };
            if !seen_masks.insert(index) {
                duplicate_masks.push((parent_id, index));
            }
            mask[index as usize] = status_mark(child.status);
        }
        series.push(SeriesSummary {
            parent_id,
            next_mask,
            mask: mask.into_iter().collect(),
        });
    }

    IntegrityReport {
        total: tasks.len(),
        duplicate_ids,
        duplicate_masks,
        series,
    }
}

/// Assertion run after each generation or propagation batch in debug builds.
pub fn debug_check(tasks: &[Task]) -> RecurResult<()> {
    if cfg!(debug_assertions) {
        check_no_duplicate_ids(tasks)?;
        check_mask_indices(tasks)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;
    use chrono::{DateTime, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    fn family(statuses: &[(u32, TaskStatus)]) -> Vec<Task> {
        let mut parent = Task::new("gym", now());
        parent.recur = Some(Period::weekdays());
        parent.due = Some(now());
        let mut tasks = vec![parent.clone()];
        for &(mask, status) in statuses {
            let mut child = Task::new("gym", now());
            child.parent_id = Some(parent.id);
            child.mask_index = Some(mask);
            child.status = status;
            tasks.push(child);
        }
        tasks
    }

    #[test]
    fn test_clean_set_passes() {
        let tasks = family(&[(0, TaskStatus::Completed), (1, TaskStatus::Pending)]);
        assert!(check_no_duplicate_ids(&tasks).is_ok());
        assert!(check_mask_indices(&tasks).is_ok());
        assert!(diagnose(&tasks).is_ok());
    }

    #[test]
    fn test_duplicate_id_detected() {
        let mut tasks = family(&[(0, TaskStatus::Pending)]);
        let copy = tasks[1].clone();
        tasks.push(copy.clone());

        let err = check_no_duplicate_ids(&tasks).unwrap_err();
        assert!(matches!(err, RecurError::DuplicateId(id) if id == copy.id));

        let report = diagnose(&tasks);
        assert_eq!(report.duplicate_ids, vec![copy.id]);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_duplicate_mask_detected() {
        let tasks = family(&[(0, TaskStatus::Pending), (0, TaskStatus::Pending)]);
        let parent = tasks[0].id;

        let err = check_mask_indices(&tasks).unwrap_err();
        assert!(matches!(err, RecurError::DuplicateMask { mask_index: 0, .. }));
        assert_eq!(diagnose(&tasks).duplicate_masks, vec![(parent, 0)]);
    }

    #[test]
    fn test_series_mask_string_shows_gaps() {
        let tasks = family(&[
            (0, TaskStatus::Completed),
            (1, TaskStatus::Deleted),
            (3, TaskStatus::Pending),
        ]);

        let report = diagnose(&tasks);
        assert_eq!(report.total, 4);
        assert_eq!(report.series.len(), 1);
        assert_eq!(report.series[0].mask, "+X -");
        assert_eq!(report.series[0].next_mask, 4);
    }

    #[test]
    fn test_parent_without_children_reports_empty_series() {
        let tasks = family(&[]);
        let report = diagnose(&tasks);
        assert_eq!(report.series[0].next_mask, 0);
        assert!(report.series[0].mask.is_empty());
    }
}
