//! Command-level entry points.
//!
//! Every command runs inside one store transaction: generation, expiry and
//! propagation either all commit or none do. Reads trigger generation first,
//! so a listing always reflects the configured horizon.

use crate::clock::{Clock, resolve_date};
use crate::config::{Config, RecurrenceConfig, UntilPolicy};
use crate::db::{Database, TaskStore};
use crate::error::{RecurError, RecurResult};
use crate::format::{SortKey, sort_tasks};
use crate::gate;
use crate::integrity::{self, IntegrityReport};
use crate::materialize::materialize;
use crate::period;
use crate::propagate::{Confirm, Coordinator, FixedAnswer, PropagationOutcome};
use crate::types::{FieldEdit, Mutation, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

/// Shortest id prefix accepted when addressing a task.
pub const MIN_ID_PREFIX: usize = 4;

/// Raw, unparsed task fields as supplied on the command line.
///
/// For `modify`, an empty string clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct TaskArgs {
    pub description: Option<String>,
    pub due: Option<String>,
    pub recur: Option<String>,
    pub until: Option<String>,
    pub project: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// What one trigger pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerReport {
    pub generated: usize,
    pub expired: usize,
}

pub struct Engine {
    db: Database,
    config: Config,
    clock: Box<dyn Clock>,
    confirm: Box<dyn Confirm>,
}

impl Engine {
    pub fn new(
        db: Database,
        config: Config,
        clock: Box<dyn Clock>,
        confirm: Box<dyn Confirm>,
    ) -> Self {
        Self {
            db,
            config,
            clock,
            confirm,
        }
    }

    /// Open the database named by `config.store.db_path`.
    pub fn open(
        config: Config,
        clock: Box<dyn Clock>,
        confirm: Box<dyn Confirm>,
    ) -> RecurResult<Self> {
        config.ensure_db_dir()?;
        let db = Database::open(&config.store.db_path)?;
        Ok(Self::new(db, config, clock, confirm))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn set_confirm(&mut self, confirm: Box<dyn Confirm>) {
        self.confirm = confirm;
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a task. A recurring task is stored as a parent only.
    pub fn add(&mut self, description: &str, args: &TaskArgs) -> RecurResult<Task> {
        let description = description.trim();
        if description.is_empty() {
            return Err(RecurError::InvalidArgument(
                "a task needs a description".to_string(),
            ));
        }
        // Period first: a bad token must leave no trace.
        let recur = args.recur.as_deref().map(period::parse).transpose()?;

        let now = self.clock.now();
        let mut task = Task::new(description, now);
        task.recur = recur;
        task.due = args
            .due
            .as_deref()
            .map(|d| resolve_date(d, now))
            .transpose()?;
        task.until = args
            .until
            .as_deref()
            .map(|d| resolve_date(d, now))
            .transpose()?;
        if task.recur.is_some() && task.due.is_none() {
            return Err(RecurError::MissingDue);
        }
        task.project = non_empty(args.project.as_deref());
        task.priority = non_empty(args.priority.as_deref());
        task.tags = args.tags.clone().unwrap_or_default();

        self.db.with_tx(|conn| {
            conn.insert_task(&task)?;
            Ok::<_, RecurError>(())
        })?;
        info!(id = %task.id, recurring = task.recur.is_some(), "task added");
        Ok(task)
    }

    /// Pending tasks that are not recurring parents, after a trigger pass.
    pub fn list(&mut self, sort: SortKey) -> RecurResult<Vec<Task>> {
        let now = self.clock.now();
        let recurrence = &self.config.recurrence;
        // Commit the trigger even when nothing ends up listed.
        let mut tasks = self.db.with_tx(|conn| {
            run_trigger(conn, recurrence, now)?;
            Ok::<_, RecurError>(visible(conn.all_tasks()?))
        })?;
        if tasks.is_empty() {
            return Err(RecurError::NoMatch);
        }
        sort_tasks(&mut tasks, sort);
        Ok(tasks)
    }

    /// Number of tasks `list` would show.
    pub fn count(&mut self) -> RecurResult<usize> {
        let now = self.clock.now();
        let recurrence = &self.config.recurrence;
        self.db.with_tx(|conn| {
            run_trigger(conn, recurrence, now)?;
            Ok(visible(conn.all_tasks()?).len())
        })
    }

    /// Explicit trigger pass.
    pub fn gc(&mut self) -> RecurResult<TriggerReport> {
        let now = self.clock.now();
        let recurrence = &self.config.recurrence;
        self.db.with_tx(|conn| run_trigger(conn, recurrence, now))
    }

    /// Edit a task, offering to carry the edit to later instances.
    pub fn modify(&mut self, id: &str, args: &TaskArgs) -> RecurResult<PropagationOutcome> {
        let now = self.clock.now();
        let edit = field_edit(args, now)?;
        if edit.is_empty() {
            return Err(RecurError::InvalidArgument(
                "no fields to modify".to_string(),
            ));
        }
        self.propagate(id, &Mutation::Edit(edit), now)
    }

    /// Soft-delete a task, offering to delete later instances too.
    pub fn delete(&mut self, id: &str) -> RecurResult<PropagationOutcome> {
        let now = self.clock.now();
        self.propagate(id, &Mutation::Delete, now)
    }

    /// Mark one task completed. Never propagated.
    pub fn done(&mut self, id: &str) -> RecurResult<Task> {
        let now = self.clock.now();
        self.db.with_tx(|conn| {
            let mut task = resolve_id(conn, id)?;
            task.status = TaskStatus::Completed;
            task.end = Some(now);
            task.modified = now;
            conn.update_task(&task)?;
            info!(id = %task.id, "task completed");
            Ok(task)
        })
    }

    /// Integrity report over every stored task. Does not fail on
    /// violations; see [`IntegrityReport::into_result`].
    pub fn diag(&self) -> RecurResult<IntegrityReport> {
        let tasks = self.all_tasks()?;
        Ok(integrity::diagnose(&tasks))
    }

    /// Every stored task in any status, parents and children included.
    pub fn all_tasks(&self) -> RecurResult<Vec<Task>> {
        self.db.with_conn(|conn| Ok(conn.all_tasks()?))
    }

    /// Look up one task by full id or unique prefix.
    pub fn get(&self, id: &str) -> RecurResult<Task> {
        self.db.with_conn(|conn| resolve_id(conn, id))
    }

    fn propagate(
        &mut self,
        id: &str,
        mutation: &Mutation,
        now: DateTime<Utc>,
    ) -> RecurResult<PropagationOutcome> {
        let Engine {
            db, config, confirm, ..
        } = self;

        let mut auto = FixedAnswer(true);
        let confirm: &mut dyn Confirm = if config.confirmation {
            confirm.as_mut()
        } else {
            &mut auto
        };
        let recurrence = &config.recurrence;

        db.with_tx(|conn| {
            run_trigger(conn, recurrence, now)?;
            let on = resolve_id(conn, id)?;
            let siblings = match on.parent_id {
                Some(parent) => conn.children_of(&parent)?,
                None => Vec::new(),
            };

            let mut coordinator = Coordinator::new(confirm);
            let outcome = coordinator.propose(mutation, &on, &siblings, now)?;
            for task in &outcome.changed {
                conn.update_task(task)?;
            }
            integrity::debug_check(&conn.all_tasks()?)?;
            Ok(outcome)
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn edit_text(value: Option<&str>) -> Option<Option<String>> {
    value.map(|v| non_empty(Some(v)))
}

fn edit_date(value: Option<&str>, now: DateTime<Utc>) -> RecurResult<Option<Option<DateTime<Utc>>>> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("") => Ok(Some(None)),
        Some(expr) => Ok(Some(Some(resolve_date(expr, now)?))),
    }
}

fn field_edit(args: &TaskArgs, now: DateTime<Utc>) -> RecurResult<FieldEdit> {
    let recur = args.recur.as_deref().map(period::parse).transpose()?;
    Ok(FieldEdit {
        description: non_empty(args.description.as_deref()),
        project: edit_text(args.project.as_deref()),
        priority: edit_text(args.priority.as_deref()),
        tags: args.tags.clone(),
        due: edit_date(args.due.as_deref(), now)?,
        until: edit_date(args.until.as_deref(), now)?,
        recur,
    })
}

fn visible(tasks: Vec<Task>) -> Vec<Task> {
    tasks
        .into_iter()
        .filter(|t| t.status == TaskStatus::Pending && !t.is_recurring_parent())
        .collect()
}

/// Resolve a full id or an unambiguous prefix.
pub fn resolve_id<S: TaskStore + ?Sized>(store: &S, token: &str) -> RecurResult<Task> {
    let token = token.trim();
    if let Ok(id) = Uuid::parse_str(token) {
        return store
            .get_task(&id)?
            .ok_or_else(|| RecurError::TaskNotFound(token.to_string()));
    }
    if token.len() < MIN_ID_PREFIX {
        return Err(RecurError::TaskNotFound(token.to_string()));
    }

    let mut matches = store.find_by_prefix(token)?;
    match matches.len() {
        0 => Err(RecurError::TaskNotFound(token.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(RecurError::AmbiguousId(token.to_string())),
    }
}

/// One generation pass over every active parent, then the expiry pass.
pub fn run_trigger<S: TaskStore + ?Sized>(
    store: &S,
    config: &RecurrenceConfig,
    now: DateTime<Utc>,
) -> RecurResult<TriggerReport> {
    let mut report = TriggerReport::default();

    if gate::should_generate(config) {
        let horizon = gate::horizon_for(config);
        for parent in store.recurring_parents()? {
            let children = store.children_of(&parent.id)?;
            for child in materialize(&parent, &children, now, horizon) {
                store.insert_task(&child)?;
                report.generated += 1;
            }
        }
    } else {
        debug!("recurrence disabled; no instances generated");
    }

    if config.until_policy == UntilPolicy::Expire {
        for mut task in store.all_tasks()? {
            let past_until = task.until.is_some_and(|until| until < now);
            if task.status == TaskStatus::Pending && past_until {
                Mutation::Delete.apply(&mut task, now);
                store.update_task(&task)?;
                report.expired += 1;
            }
        }
        if report.expired > 0 {
            info!(count = report.expired, "expired tasks past their until date");
        }
    }

    if report.generated > 0 || report.expired > 0 {
        debug!(generated = report.generated, expired = report.expired, "trigger pass");
        integrity::debug_check(&store.all_tasks()?)?;
    }
    Ok(report)
}
