//! Lazy instance generation for recurring parents.
//!
//! Children are never created at add time. Each trigger walks the parent's
//! series forward from the latest existing child until enough pending
//! instances sit ahead of "now", or the parent's `until` is passed.

use crate::advance::advance;
use crate::types::{Period, Task, TaskStatus};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Upper bound on instances created for one parent in one pass. A short
/// period with a due date far in the past would otherwise catch up without
/// bound; the next trigger continues where this one stopped.
pub const MAX_INSTANCES_PER_PASS: usize = 10_000;

/// Copy a parent into a new pending child at the given position.
pub fn instantiate(
    parent: &Task,
    due: DateTime<Utc>,
    mask_index: u32,
    now: DateTime<Utc>,
) -> Task {
    Task {
        id: Uuid::new_v4(),
        description: parent.description.clone(),
        status: TaskStatus::Pending,
        project: parent.project.clone(),
        priority: parent.priority.clone(),
        tags: parent.tags.clone(),
        entry: now,
        modified: now,
        end: None,
        due: Some(due),
        until: parent.until,
        recur: parent.recur,
        parent_id: Some(parent.id),
        mask_index: Some(mask_index),
    }
}

/// Pending children whose due date is still ahead of `now`.
pub fn pending_ahead(children: &[Task], now: DateTime<Utc>) -> u32 {
    let count = children
        .iter()
        .filter(|c| c.status == TaskStatus::Pending && c.due.is_some_and(|d| d > now))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Next free mask index for a parent: one past the highest ever used.
pub fn next_mask_index(children: &[Task]) -> u32 {
    children
        .iter()
        .filter_map(|c| c.mask_index)
        .max()
        .map_or(0, |m| m + 1)
}

/// Generate the instances `parent` is missing.
///
/// `children` must be every existing child of `parent`, in any status.
/// Returns only the new tasks; the caller persists them. Calling this again
/// with the returned tasks added to `children` and the same `now` yields
/// nothing.
pub fn materialize(
    parent: &Task,
    children: &[Task],
    now: DateTime<Utc>,
    horizon: u32,
) -> Vec<Task> {
    let (Some(period), Some(first_due)) = (parent.recur, parent.due) else {
        return Vec::new();
    };

    let latest = children
        .iter()
        .filter(|c| c.mask_index.is_some())
        .max_by_key(|c| c.mask_index);
    let mut next_mask = next_mask_index(children);
    // A latest child without a due date cannot anchor the series; replay it
    // from the parent instead.
    let mut cursor = match latest {
        Some(child) => match child.due {
            Some(due) => Some(due),
            None => replay(first_due, &period, next_mask),
        },
        None => None,
    };
    let mut ahead = pending_ahead(children, now);
    let mut created = Vec::new();

    while ahead < horizon {
        let candidate = match cursor {
            None => first_due,
            Some(prev) => match advance(prev, &period) {
                Some(next) if next > prev => next,
                Some(_) => {
                    warn!(parent = %parent.id, %period, "period does not advance; stopping");
                    break;
                }
                None => break,
            },
        };

        if let Some(until) = parent.until {
            if candidate > until {
                debug!(parent = %parent.id, %candidate, %until, "until boundary reached");
                break;
            }
        }

        debug!(parent = %parent.id, mask_index = next_mask, due = %candidate, "generated instance");
        created.push(instantiate(parent, candidate, next_mask, now));
        next_mask += 1;
        cursor = Some(candidate);
        if candidate > now {
            ahead += 1;
        }

        if created.len() >= MAX_INSTANCES_PER_PASS {
            warn!(parent = %parent.id, "instance cap reached for this pass");
            break;
        }
    }

    created
}

/// Due date of the instance just before `next_mask`, recomputed from the parent.
fn replay(
    first_due: DateTime<Utc>,
    period: &Period,
    next_mask: u32,
) -> Option<DateTime<Utc>> {
    let mut due = first_due;
    for _ in 1..next_mask {
        due = advance(due, period)?;
    }
    Some(due)
}
