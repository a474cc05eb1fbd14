use chrono::{TimeZone, Utc};
use eventlog_core::db::migrations::latest_version;
use eventlog_core::db::open_db_in_memory;
use eventlog_core::{
    ActionType, EventPatch, EventRepository, EventStatus, EventValidationError, NewEvent,
    RepoError, SqliteEventRepository, StatusFilter, StatusTransition, DEFAULT_PRIORITY,
};
use rusqlite::Connection;

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn insert_and_get_applies_defaults() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    let id = repo.insert_event(&NewEvent::new("water plants")).unwrap();
    let event = repo.get_event(id).unwrap().unwrap();

    assert_eq!(event.title, "water plants");
    assert_eq!(event.description, "");
    assert_eq!(event.priority, DEFAULT_PRIORITY);
    assert_eq!(event.status, EventStatus::Active);
    assert_eq!(event.time_hint, None);
    assert_eq!(event.due_at, event.created_at);
    assert_eq!(event.last_modified, event.created_at);
}

#[test]
fn insert_keeps_supplied_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    let input = NewEvent {
        title: "dentist".to_string(),
        description: Some("bring insurance card".to_string()),
        due_at: Some("2024-06-01 09:30".to_string()),
        time_hint: Some("morning".to_string()),
        priority: Some(1),
    };
    let id = repo.insert_event(&input).unwrap();
    let event = repo.get_event(id).unwrap().unwrap();

    assert_eq!(event.description, "bring insurance card");
    assert_eq!(event.time_hint.as_deref(), Some("morning"));
    assert_eq!(event.priority, 1);
    assert_eq!(
        event.due_at,
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
    );
}

#[test]
fn insert_rejects_empty_title_and_bad_due_date_without_persisting() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

        let empty = repo.insert_event(&NewEvent::new("")).unwrap_err();
        assert!(matches!(
            empty,
            RepoError::Validation(EventValidationError::EmptyTitle)
        ));

        let bad_due = repo
            .insert_event(&NewEvent::new("x").with_due_at("someday maybe"))
            .unwrap_err();
        assert!(matches!(
            bad_due,
            RepoError::Validation(EventValidationError::InvalidDueDate(_))
        ));
    }
    assert_eq!(count_rows(&conn, "events"), 0);
}

#[test]
fn ids_are_not_reused_after_purge() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    let first = repo.insert_event(&NewEvent::new("first")).unwrap();
    repo.purge_event(first).unwrap();
    let second = repo.insert_event(&NewEvent::new("second")).unwrap();
    assert!(second > first);
}

#[test]
fn get_missing_event_returns_none() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    assert!(repo.get_event(404).unwrap().is_none());
}

#[test]
fn list_orders_by_due_at_and_filters_by_status() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    let late = repo
        .insert_event(&NewEvent::new("late").with_due_at("2024-09-01"))
        .unwrap();
    let early = repo
        .insert_event(&NewEvent::new("early").with_due_at("2024-01-01"))
        .unwrap();
    let middle = repo
        .insert_event(&NewEvent::new("middle").with_due_at("2024-05-01T12:00:00+02:00"))
        .unwrap();
    repo.soft_delete_event(middle).unwrap();

    let active: Vec<_> = repo
        .list_events(StatusFilter::default())
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(active, vec![early, late]);

    let all: Vec<_> = repo
        .list_events(StatusFilter::All)
        .unwrap()
        .into_iter()
        .map(|event| event.id)
        .collect();
    assert_eq!(all, vec![early, middle, late]);

    let deleted = repo
        .list_events(StatusFilter::Only(EventStatus::Deleted))
        .unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, middle);
}

#[test]
fn update_applies_only_present_fields_and_bumps_last_modified() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    let input = NewEvent {
        title: "draft".to_string(),
        description: Some("keep me".to_string()),
        priority: Some(3),
        ..NewEvent::default()
    };
    let id = repo.insert_event(&input).unwrap();
    let before = repo.get_event(id).unwrap().unwrap();

    let patch = EventPatch {
        title: Some("final".to_string()),
        due_at: Some("2025-02-03T04:05:06Z".to_string()),
        ..EventPatch::default()
    };
    let updated = repo.update_event(id, &patch).unwrap();

    assert_eq!(updated.title, "final");
    assert_eq!(updated.description, "keep me");
    assert_eq!(updated.priority, 3);
    assert_eq!(
        updated.due_at,
        Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap()
    );
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.last_modified >= before.last_modified);
}

#[test]
fn update_with_empty_patch_still_bumps_last_modified() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        repo.insert_event(&NewEvent::new("touch me")).unwrap()
    };
    conn.execute(
        "UPDATE events SET last_modified = '2000-01-01T00:00:00.000000Z' WHERE id = ?1;",
        [id],
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let updated = repo.update_event(id, &EventPatch::default()).unwrap();
    assert!(updated.last_modified > Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(updated.title, "touch me");
}

#[test]
fn last_modified_never_moves_backwards() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        repo.insert_event(&NewEvent::new("clock skew")).unwrap()
    };
    conn.execute(
        "UPDATE events SET last_modified = '2999-01-01T00:00:00.000000Z' WHERE id = ?1;",
        [id],
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let patch = EventPatch {
        priority: Some(5),
        ..EventPatch::default()
    };
    let updated = repo.update_event(id, &patch).unwrap();
    assert_eq!(
        updated.last_modified,
        Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap()
    );
}

#[test]
fn update_rejects_empty_title_and_bad_due_date_leaving_row_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let id = repo.insert_event(&NewEvent::new("stable")).unwrap();
    let before = repo.get_event(id).unwrap().unwrap();

    let empty_title = EventPatch {
        title: Some("   ".to_string()),
        ..EventPatch::default()
    };
    assert!(matches!(
        repo.update_event(id, &empty_title).unwrap_err(),
        RepoError::Validation(EventValidationError::EmptyTitle)
    ));

    let bad_due = EventPatch {
        title: Some("changed".to_string()),
        due_at: Some("the 45th of Smarch".to_string()),
        ..EventPatch::default()
    };
    assert!(matches!(
        repo.update_event(id, &bad_due).unwrap_err(),
        RepoError::Validation(EventValidationError::InvalidDueDate(_))
    ));

    assert_eq!(repo.get_event(id).unwrap().unwrap(), before);
}

#[test]
fn update_missing_event_returns_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let patch = EventPatch {
        priority: Some(1),
        ..EventPatch::default()
    };
    assert!(matches!(
        repo.update_event(77, &patch).unwrap_err(),
        RepoError::NotFound(77)
    ));
}

#[test]
fn insert_action_appends_without_lifecycle_checks() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let id = repo.insert_event(&NewEvent::new("raw history")).unwrap();

    let first = repo
        .insert_action(id, ActionType::Reopen, Some("imported"))
        .unwrap();
    let second = repo.insert_action(id, ActionType::Reopen, None).unwrap();
    assert!(second > first);

    let actions = repo.list_actions(id).unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].id, second);
    assert_eq!(actions[1].comment.as_deref(), Some("imported"));
    assert_eq!(repo.get_event(id).unwrap().unwrap().status, EventStatus::Active);
}

#[test]
fn action_operations_on_missing_event_return_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();

    assert!(matches!(
        repo.insert_action(5, ActionType::Complete, None).unwrap_err(),
        RepoError::NotFound(5)
    ));
    assert!(matches!(
        repo.list_actions(5).unwrap_err(),
        RepoError::NotFound(5)
    ));
}

#[test]
fn list_actions_orders_by_action_time_not_insertion_order() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        repo.insert_event(&NewEvent::new("history")).unwrap()
    };
    for (comment, at) in [
        ("a", "2024-01-02T00:00:00.000000Z"),
        ("b", "2024-01-03T00:00:00.000000Z"),
        ("c", "2024-01-01T00:00:00.000000Z"),
    ] {
        conn.execute(
            "INSERT INTO event_actions (event_id, action_type, action_time, comment)
             VALUES (?1, 'complete', ?2, ?3);",
            rusqlite::params![id, at, comment],
        )
        .unwrap();
    }

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let comments: Vec<_> = repo
        .list_actions(id)
        .unwrap()
        .into_iter()
        .map(|action| action.comment.unwrap())
        .collect();
    assert_eq!(comments, vec!["b", "a", "c"]);
}

#[test]
fn transition_status_flips_status_and_records_action_atomically() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let id = repo.insert_event(&NewEvent::new("transition")).unwrap();

    let transition = StatusTransition {
        from: EventStatus::Active,
        to: EventStatus::Completed,
        action_type: ActionType::Complete,
        comment: Some("done"),
    };
    let event = repo.transition_status(id, &transition).unwrap();
    assert_eq!(event.status, EventStatus::Completed);

    let err = repo.transition_status(id, &transition).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Conflict {
            event_id,
            expected: EventStatus::Active,
            actual: EventStatus::Completed,
        } if event_id == id
    ));

    let actions = repo.list_actions(id).unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, ActionType::Complete);
    assert_eq!(actions[0].action_time, event.last_modified);
}

#[test]
fn transition_status_rolls_back_when_action_insert_fails() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        repo.insert_event(&NewEvent::new("rollback")).unwrap()
    };
    conn.execute_batch(
        "CREATE TRIGGER fail_action_insert BEFORE INSERT ON event_actions
         BEGIN SELECT RAISE(ABORT, 'simulated storage failure'); END;",
    )
    .unwrap();

    {
        let mut repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let err = repo
            .transition_status(
                id,
                &StatusTransition {
                    from: EventStatus::Active,
                    to: EventStatus::Completed,
                    action_type: ActionType::Complete,
                    comment: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, RepoError::Db(_)));
        assert_eq!(
            repo.get_event(id).unwrap().unwrap().status,
            EventStatus::Active
        );
    }
    assert_eq!(count_rows(&conn, "event_actions"), 0);
}

#[test]
fn soft_delete_keeps_row_and_missing_id_is_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let id = repo.insert_event(&NewEvent::new("to delete")).unwrap();

    repo.soft_delete_event(id).unwrap();
    repo.soft_delete_event(id).unwrap();
    assert_eq!(
        repo.get_event(id).unwrap().unwrap().status,
        EventStatus::Deleted
    );
    assert!(matches!(
        repo.soft_delete_event(id + 1).unwrap_err(),
        RepoError::NotFound(_)
    ));
}

#[test]
fn purge_cascades_action_history() {
    let mut conn = open_db_in_memory().unwrap();
    let (kept, purged) = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let kept = repo.insert_event(&NewEvent::new("kept")).unwrap();
        let purged = repo.insert_event(&NewEvent::new("purged")).unwrap();
        repo.insert_action(kept, ActionType::Complete, None).unwrap();
        repo.insert_action(purged, ActionType::Complete, None).unwrap();
        repo.insert_action(purged, ActionType::Reopen, None).unwrap();

        repo.purge_event(purged).unwrap();
        assert!(repo.get_event(purged).unwrap().is_none());
        assert!(matches!(
            repo.purge_event(purged).unwrap_err(),
            RepoError::NotFound(_)
        ));
        (kept, purged)
    };

    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM event_actions WHERE event_id = ?1;",
            [purged],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);

    let kept_actions: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM event_actions WHERE event_id = ?1;",
            [kept],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(kept_actions, 1);
    assert_eq!(count_rows(&conn, "event_actions"), 1);
}

#[test]
fn update_refuses_to_move_deleted_event_out_of_deleted() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    let id = repo.insert_event(&NewEvent::new("archived")).unwrap();
    repo.soft_delete_event(id).unwrap();
    let before = repo.get_event(id).unwrap().unwrap();

    for target in [EventStatus::Active, EventStatus::Completed] {
        let patch = EventPatch {
            title: Some("revived".to_string()),
            status: Some(target),
            ..EventPatch::default()
        };
        assert!(matches!(
            repo.update_event(id, &patch).unwrap_err(),
            RepoError::DeletedIsTerminal(event_id) if event_id == id
        ));
    }
    assert_eq!(repo.get_event(id).unwrap().unwrap(), before);

    let keep_deleted = EventPatch {
        title: Some("still archived".to_string()),
        status: Some(EventStatus::Deleted),
        ..EventPatch::default()
    };
    let updated = repo.update_event(id, &keep_deleted).unwrap();
    assert_eq!(updated.status, EventStatus::Deleted);
    assert_eq!(updated.title, "still archived");
}

#[test]
fn schema_rejects_action_row_updates_and_created_at_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
        let id = repo.insert_event(&NewEvent::new("immutable")).unwrap();
        repo.insert_action(id, ActionType::Complete, Some("original"))
            .unwrap();
        id
    };

    assert!(conn
        .execute("UPDATE event_actions SET comment = 'rewritten';", [])
        .is_err());
    assert!(conn
        .execute(
            "UPDATE events SET created_at = '1999-01-01T00:00:00.000000Z' WHERE id = ?1;",
            [id],
        )
        .is_err());
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    match SqliteEventRepository::try_new(&mut conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_required_tables_or_columns() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();
    assert!(matches!(
        SqliteEventRepository::try_new(&mut conn),
        Err(RepoError::MissingRequiredTable("events"))
    ));

    conn.execute_batch(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            due_at TEXT NOT NULL,
            priority INTEGER NOT NULL,
            status TEXT NOT NULL,
            last_modified TEXT NOT NULL
        );",
    )
    .unwrap();
    assert!(matches!(
        SqliteEventRepository::try_new(&mut conn),
        Err(RepoError::MissingRequiredColumn {
            table: "events",
            column: "time_hint"
        })
    ));
}

#[test]
fn malformed_persisted_status_is_reported_as_invalid_data() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         INSERT INTO events (title, created_at, due_at, status, last_modified)
         VALUES ('legacy', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z',
                 'archived', '2024-01-01T00:00:00.000000Z');
         PRAGMA ignore_check_constraints = OFF;",
    )
    .unwrap();

    let repo = SqliteEventRepository::try_new(&mut conn).unwrap();
    assert!(matches!(
        repo.list_events(StatusFilter::All).unwrap_err(),
        RepoError::InvalidData(_)
    ));
}
