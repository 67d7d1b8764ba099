//! Integration tests for the recurrence engine.
//!
//! Each test drives an `Engine` over an in-memory SQLite database with a
//! fake clock and scripted confirmation answers.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use task_recur::clock::FakeClock;
use task_recur::config::{Config, UntilPolicy};
use task_recur::db::Database;
use task_recur::engine::{Engine, TaskArgs};
use task_recur::error::RecurError;
use task_recur::format::{SortField, SortKey};
use task_recur::integrity;
use task_recur::period::ParseError;
use task_recur::propagate::{PropagationState, ScriptedConfirm};
use task_recur::types::{Task, TaskStatus};

/// Monday 2026-10-19 09:00 UTC.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

/// Helper to create an engine over a fresh in-memory database.
fn setup(config: Config) -> (Engine, FakeClock) {
    let clock = FakeClock::new(start());
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let engine = Engine::new(
        db,
        config,
        Box::new(clock.clone()),
        Box::new(ScriptedConfirm::default()),
    );
    (engine, clock)
}

fn with_limit(limit: u32) -> Config {
    let mut config = Config::default();
    config.recurrence.limit = limit;
    config
}

fn recurring(due: &str, recur: &str) -> TaskArgs {
    TaskArgs {
        due: Some(due.to_string()),
        recur: Some(recur.to_string()),
        ..Default::default()
    }
}

/// Children of every parent, ordered by mask index.
fn children(engine: &Engine) -> Vec<Task> {
    let mut kids: Vec<Task> = engine
        .all_tasks()
        .expect("Failed to read tasks")
        .into_iter()
        .filter(|t| t.parent_id.is_some())
        .collect();
    kids.sort_by_key(|t| t.mask_index);
    kids
}

fn pending_children(engine: &Engine) -> usize {
    children(engine)
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .count()
}

mod ordering_tests {
    use super::*;

    fn add_three(engine: &mut Engine) {
        for (desc, period) in [("monthly", "monthly"), ("daily", "daily"), ("weekly", "weekly")] {
            engine
                .add(desc, &recurring("now+1h", period))
                .expect("Failed to add task");
        }
    }

    #[test]
    fn ascending_recur_puts_shortest_period_first() {
        let (mut engine, _clock) = setup(Config::default());
        add_three(&mut engine);

        let listed = engine
            .list(SortKey::new(SortField::Recur, false))
            .expect("Failed to list");

        let order: Vec<_> = listed.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["daily", "weekly", "monthly"]);
    }

    #[test]
    fn descending_recur_reverses_order() {
        let (mut engine, _clock) = setup(Config::default());
        add_three(&mut engine);

        let listed = engine
            .list(SortKey::new(SortField::Recur, true))
            .expect("Failed to list");

        let order: Vec<_> = listed.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["monthly", "weekly", "daily"]);
    }
}

mod limit_tests {
    use super::*;

    #[test]
    fn default_limit_keeps_one_pending_instance() {
        let (mut engine, _clock) = setup(Config::default());
        engine
            .add("bins", &recurring("now+1h", "weekly"))
            .expect("Failed to add task");

        for _ in 0..3 {
            assert_eq!(engine.list(SortKey::default()).expect("Failed to list").len(), 1);
        }
        assert_eq!(pending_children(&engine), 1);
        assert_eq!(engine.all_tasks().unwrap().len(), 2);
    }

    #[test]
    fn limit_four_keeps_four_pending_instances() {
        let (mut engine, _clock) = setup(with_limit(4));
        engine
            .add("bins", &recurring("now+1h", "weekly"))
            .expect("Failed to add task");

        let listed = engine.list(SortKey::default()).expect("Failed to list");

        assert_eq!(listed.len(), 4);
        assert_eq!(pending_children(&engine), 4);
        let masks: Vec<_> = children(&engine).iter().filter_map(|t| t.mask_index).collect();
        assert_eq!(masks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn completing_an_instance_generates_the_next() {
        let (mut engine, _clock) = setup(Config::default());
        engine
            .add("bins", &recurring("now+1h", "weekly"))
            .expect("Failed to add task");
        let first = engine.list(SortKey::default()).unwrap().remove(0);

        engine.done(&first.id.to_string()).expect("Failed to complete");
        let listed = engine.list(SortKey::default()).unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mask_index, Some(1));
        assert_eq!(listed[0].due, first.due.map(|d| d + Duration::weeks(1)));
    }
}

mod disable_tests {
    use super::*;

    #[test]
    fn disabled_recurrence_never_generates() {
        let mut config = Config::default();
        config
            .apply_overrides(["recurrence=no"])
            .expect("Failed to apply override");
        let (mut engine, clock) = setup(config);
        engine
            .add("floss", &recurring("now+1min", "daily"))
            .expect("Failed to add task");

        for _ in 0..3 {
            assert!(matches!(
                engine.list(SortKey::default()),
                Err(RecurError::NoMatch)
            ));
            assert_eq!(engine.count().unwrap(), 0);
            assert_eq!(engine.gc().unwrap().generated, 0);
            clock.advance("+1d").unwrap();
        }

        assert_eq!(engine.all_tasks().unwrap().len(), 1);
    }

    #[test]
    fn no_match_exits_with_failure_code() {
        let (mut engine, _clock) = setup(Config::default());
        let err = engine.list(SortKey::default()).unwrap_err();
        assert_eq!(err.to_string(), "No matches.");
        assert_ne!(err.exit_code(), 0);
    }
}

mod weekday_tests {
    use super::*;

    #[test]
    fn friday_instance_is_followed_by_monday() {
        let (mut engine, _clock) = setup(with_limit(2));
        engine
            .add("stand-up", &recurring("friday", "weekdays"))
            .expect("Failed to add task");
        engine.gc().expect("Failed to run gc");

        let kids = children(&engine);
        assert_eq!(kids.len(), 2);
        let first = kids[0].due.unwrap();
        let second = kids[1].due.unwrap();
        assert_eq!(first.weekday(), Weekday::Fri);
        assert_eq!(second.weekday(), Weekday::Mon);
        assert_eq!(second - first, Duration::days(3));
    }

    #[test]
    fn weekdays_series_never_lands_on_weekend() {
        let (mut engine, _clock) = setup(with_limit(12));
        engine
            .add("stand-up", &recurring("today", "weekdays"))
            .expect("Failed to add task");
        engine.gc().expect("Failed to run gc");

        let kids = children(&engine);
        assert!(kids.len() >= 12);
        for kid in kids {
            let day = kid.due.unwrap().weekday();
            assert!(day != Weekday::Sat && day != Weekday::Sun);
        }
    }
}

mod until_tests {
    use super::*;

    fn hourly_until() -> TaskArgs {
        TaskArgs {
            due: Some("now+1minute".to_string()),
            recur: Some("PT1H".to_string()),
            until: Some("now+125minutes".to_string()),
            ..Default::default()
        }
    }

    fn offsets(engine: &Engine) -> Vec<i64> {
        children(engine)
            .iter()
            .filter_map(|t| t.due)
            .map(|d| (d - start()).num_minutes())
            .collect()
    }

    #[test]
    fn gate_policy_stops_at_until_and_keeps_instances() {
        let mut config = with_limit(10);
        config.recurrence.until_policy = UntilPolicy::Gate;
        let (mut engine, clock) = setup(config);
        engine.add("stretch", &hourly_until()).expect("Failed to add task");

        engine.gc().expect("Failed to run gc");
        assert_eq!(offsets(&engine), vec![1, 61, 121]);

        clock.advance("+3h").unwrap();
        assert_eq!(engine.gc().unwrap().generated, 0);
        assert_eq!(offsets(&engine), vec![1, 61, 121]);
        // Elapsed instances stay visible under the gate policy.
        assert_eq!(engine.list(SortKey::default()).unwrap().len(), 3);
    }

    #[test]
    fn gate_policy_with_default_limit_follows_the_clock() {
        let (mut engine, clock) = setup(Config::default());
        engine.add("stretch", &hourly_until()).expect("Failed to add task");

        engine.gc().unwrap();
        for _ in 0..3 {
            clock.advance("+1h").unwrap();
            engine.gc().unwrap();
        }

        assert_eq!(offsets(&engine), vec![1, 61, 121]);
    }

    #[test]
    fn expire_policy_deletes_instances_past_until() {
        let mut config = with_limit(10);
        config.recurrence.until_policy = UntilPolicy::Expire;
        let (mut engine, clock) = setup(config);
        engine.add("stretch", &hourly_until()).expect("Failed to add task");

        engine.gc().expect("Failed to run gc");
        assert_eq!(offsets(&engine), vec![1, 61, 121]);

        clock.advance("+3h").unwrap();
        let report = engine.gc().unwrap();
        assert_eq!(report.generated, 0);
        assert!(report.expired >= 3);
        assert_eq!(pending_children(&engine), 0);
        assert!(matches!(
            engine.list(SortKey::default()),
            Err(RecurError::NoMatch)
        ));
    }
}

mod propagation_tests {
    use super::*;

    /// Weekly series with masks 0..=3 generated and mask 1 completed.
    fn series() -> (Engine, FakeClock, Vec<Task>) {
        let (mut engine, clock) = setup(with_limit(4));
        engine
            .add("water plants", &recurring("now+1h", "weekly"))
            .expect("Failed to add task");
        engine.gc().expect("Failed to run gc");
        let kids = children(&engine);
        engine.done(&kids[1].id.to_string()).expect("Failed to complete");
        (engine, clock, kids)
    }

    fn rename(to: &str) -> TaskArgs {
        TaskArgs {
            description: Some(to.to_string()),
            ..Default::default()
        }
    }

    fn assert_no_duplicates(engine: &Engine) {
        let all = engine.all_tasks().unwrap();
        integrity::check_no_duplicate_ids(&all).expect("duplicate ids");
        assert!(engine.diag().unwrap().is_ok());
    }

    #[test]
    fn declined_edit_changes_only_that_instance() {
        let (mut engine, _clock, kids) = series();
        engine.set_confirm(Box::new(ScriptedConfirm::new([false])));

        let outcome = engine
            .modify(&kids[2].id.to_string(), &rename("mist plants"))
            .expect("Failed to modify");

        assert_eq!(outcome.state, PropagationState::Rejected);
        assert_eq!(outcome.changed.len(), 1);
        let after = children(&engine);
        let renamed: Vec<_> = after
            .iter()
            .filter(|t| t.description == "mist plants")
            .map(|t| t.id)
            .collect();
        assert_eq!(renamed, vec![kids[2].id]);
        assert_no_duplicates(&engine);
    }

    #[test]
    fn confirmed_edit_reaches_later_pending_siblings_only() {
        let (mut engine, _clock, kids) = series();
        engine.set_confirm(Box::new(ScriptedConfirm::new([true])));

        let outcome = engine
            .modify(&kids[2].id.to_string(), &rename("mist plants"))
            .expect("Failed to modify");

        assert_eq!(outcome.state, PropagationState::Applied);
        let after = children(&engine);
        for task in &after {
            let mask = task.mask_index.unwrap();
            if mask >= 2 {
                assert_eq!(task.description, "mist plants", "mask {}", mask);
            } else {
                assert_eq!(task.description, "water plants", "mask {}", mask);
            }
        }
        assert_eq!(after[1].status, TaskStatus::Completed);
        assert_no_duplicates(&engine);
    }

    #[test]
    fn confirmed_delete_spares_earlier_and_completed() {
        let (mut engine, _clock, kids) = series();
        engine.set_confirm(Box::new(ScriptedConfirm::new([true])));

        engine
            .delete(&kids[0].id.to_string())
            .expect("Failed to delete");

        let after = children(&engine);
        assert_eq!(after[0].status, TaskStatus::Deleted);
        assert_eq!(after[1].status, TaskStatus::Completed);
        assert!(after[2..].iter().all(|t| t.status == TaskStatus::Deleted));
        assert_no_duplicates(&engine);
    }

    #[test]
    fn decline_then_confirm_keeps_ids_unique() {
        let (mut engine, clock, kids) = series();
        engine.set_confirm(Box::new(ScriptedConfirm::new([false, true])));

        engine
            .delete(&kids[2].id.to_string())
            .expect("Failed to delete");
        clock.advance("+1w").unwrap();
        engine
            .modify(&kids[3].id.to_string(), &rename("repot"))
            .expect("Failed to modify");
        engine.gc().unwrap();

        assert_no_duplicates(&engine);
        let masks: Vec<_> = children(&engine).iter().filter_map(|t| t.mask_index).collect();
        let mut sorted = masks.clone();
        sorted.dedup();
        assert_eq!(masks, sorted);
    }

    #[test]
    fn standalone_task_is_edited_without_prompt() {
        let (mut engine, _clock) = setup(Config::default());
        let task = engine.add("dentist", &TaskArgs::default()).unwrap();

        let outcome = engine
            .modify(&task.id.to_string(), &rename("orthodontist"))
            .expect("Failed to modify");

        assert_eq!(outcome.state, PropagationState::Applied);
        assert_eq!(engine.get(&task.id.to_string()).unwrap().description, "orthodontist");
    }
}

mod parse_rejection_tests {
    use super::*;

    #[test]
    fn bare_integer_period_is_rejected_without_state_change() {
        let (mut engine, _clock) = setup(Config::default());

        let err = engine
            .add("anything", &recurring("tomorrow", "2"))
            .unwrap_err();

        assert!(matches!(err, RecurError::Parse(ParseError::Unsupported(_))));
        assert_eq!(err.to_string(), "the duration value '2' is not supported");
        assert!(engine.all_tasks().unwrap().is_empty());
    }

    #[test]
    fn bare_integer_in_modify_leaves_task_alone() {
        let (mut engine, _clock) = setup(Config::default());
        let task = engine
            .add("bins", &recurring("tomorrow", "weekly"))
            .unwrap();

        let args = TaskArgs {
            recur: Some("7".to_string()),
            ..Default::default()
        };
        assert!(engine.modify(&task.id.to_string(), &args).is_err());
        assert_eq!(engine.get(&task.id.to_string()).unwrap(), task);
    }
}
