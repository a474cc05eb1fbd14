//! Event store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide durable CRUD over `events` and append-only writes to
//!   `event_actions`.
//! - Run the status read-check-write of lifecycle transitions and of
//!   partial updates as one `IMMEDIATE` transaction.
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - Every mutation bumps `last_modified` with `MAX(previous, now)`.
//! - Action rows are only ever inserted; the schema rejects updates.
//! - `deleted` is terminal: no update moves a row out of it.
//! - Read paths reject malformed persisted rows instead of masking them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::action::{ActionId, ActionType, EventAction};
use crate::model::event::{
    Event, EventId, EventPatch, EventStatus, EventValidationError, NewEvent, StatusFilter,
    DEFAULT_PRIORITY,
};
use crate::model::timestamp::{self, Timestamp};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const EVENT_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    created_at,
    due_at,
    time_hint,
    priority,
    status,
    last_modified
FROM events";

const ACTION_SELECT_SQL: &str = "SELECT
    id,
    event_id,
    action_type,
    action_time,
    comment
FROM event_actions";

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "events",
        &[
            "id",
            "title",
            "description",
            "created_at",
            "due_at",
            "time_hint",
            "priority",
            "status",
            "last_modified",
        ],
    ),
    (
        "event_actions",
        &["id", "event_id", "action_type", "action_time", "comment"],
    ),
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Event store error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EventValidationError),
    Db(DbError),
    NotFound(EventId),
    /// Stored status did not match the transition precondition.
    Conflict {
        event_id: EventId,
        expected: EventStatus,
        actual: EventStatus,
    },
    /// Update tried to move a `deleted` event to another status.
    DeletedIsTerminal(EventId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::Conflict {
                event_id,
                expected,
                actual,
            } => write!(
                f,
                "event {event_id} is `{actual}`, transition requires `{expected}`"
            ),
            Self::DeletedIsTerminal(id) => {
                write!(f, "event {id} is `deleted` and its status cannot change")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with db::open_db"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Audited status change applied by [`EventRepository::transition_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition<'a> {
    pub from: EventStatus,
    pub to: EventStatus,
    pub action_type: ActionType,
    pub comment: Option<&'a str>,
}

/// Repository interface for the event store.
pub trait EventRepository {
    /// Inserts a new `active` event and returns its id.
    fn insert_event(&self, input: &NewEvent) -> RepoResult<EventId>;
    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>>;
    /// Lists events ordered by `due_at ASC, id ASC`.
    fn list_events(&self, filter: StatusFilter) -> RepoResult<Vec<Event>>;
    /// Applies only the fields present in `patch`.
    ///
    /// Fails with `DeletedIsTerminal` when `patch.status` would move a
    /// `deleted` event to another status.
    fn update_event(&self, id: EventId, patch: &EventPatch) -> RepoResult<Event>;
    /// Appends one action row. Does not check lifecycle legality.
    fn insert_action(
        &self,
        event_id: EventId,
        action_type: ActionType,
        comment: Option<&str>,
    ) -> RepoResult<ActionId>;
    /// Lists actions ordered by `action_time DESC, id DESC`.
    fn list_actions(&self, event_id: EventId) -> RepoResult<Vec<EventAction>>;
    /// Flips status and appends the matching action row atomically.
    fn transition_status(
        &mut self,
        id: EventId,
        transition: &StatusTransition<'_>,
    ) -> RepoResult<Event>;
    fn soft_delete_event(&self, id: EventId) -> RepoResult<()>;
    /// Removes the row; its actions go with it through the FK cascade.
    fn purge_event(&self, id: EventId) -> RepoResult<()>;
}

/// SQLite-backed event store.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the schema
    ///   does not have the expected shape.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn insert_event(&self, input: &NewEvent) -> RepoResult<EventId> {
        input.validate()?;
        let now = timestamp::now();
        let due_at = input.resolve_due_at(now)?;
        let now_text = timestamp::to_storage(&now);

        self.conn.execute(
            "INSERT INTO events (
                title,
                description,
                created_at,
                due_at,
                time_hint,
                priority,
                status,
                last_modified
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?3);",
            params![
                input.title.as_str(),
                input.description.as_deref().unwrap_or(""),
                now_text.as_str(),
                timestamp::to_storage(&due_at),
                input.time_hint.as_deref(),
                input.priority.unwrap_or(DEFAULT_PRIORITY),
                EventStatus::Active.as_str(),
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_event(&self, id: EventId) -> RepoResult<Option<Event>> {
        load_event(self.conn, id)
    }

    fn list_events(&self, filter: StatusFilter) -> RepoResult<Vec<Event>> {
        let mut sql = String::from(EVENT_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();

        if let StatusFilter::Only(status) = filter {
            sql.push_str(" WHERE status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY due_at ASC, id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }

        Ok(events)
    }

    fn update_event(&self, id: EventId, patch: &EventPatch) -> RepoResult<Event> {
        patch.validate()?;
        let now = timestamp::now();
        let due_at = patch.resolve_due_at(now)?;

        let mut assignments: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(title) = patch.title.as_ref() {
            assignments.push("title = ?");
            bind_values.push(Value::Text(title.clone()));
        }
        if let Some(description) = patch.description.as_ref() {
            assignments.push("description = ?");
            bind_values.push(Value::Text(description.clone()));
        }
        if let Some(due_at) = due_at {
            assignments.push("due_at = ?");
            bind_values.push(Value::Text(timestamp::to_storage(&due_at)));
        }
        if let Some(time_hint) = patch.time_hint.as_ref() {
            assignments.push("time_hint = ?");
            bind_values.push(Value::Text(time_hint.clone()));
        }
        if let Some(priority) = patch.priority {
            assignments.push("priority = ?");
            bind_values.push(Value::Integer(priority));
        }
        if let Some(status) = patch.status {
            assignments.push("status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        assignments.push("last_modified = MAX(last_modified, ?)");
        bind_values.push(Value::Text(timestamp::to_storage(&now)));
        bind_values.push(Value::Integer(id));

        // Immediate: the status check and the write must see the same row.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let actual = load_status(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        if actual == EventStatus::Deleted
            && patch
                .status
                .is_some_and(|target| target != EventStatus::Deleted)
        {
            return Err(RepoError::DeletedIsTerminal(id));
        }

        let sql = format!("UPDATE events SET {} WHERE id = ?;", assignments.join(", "));
        let changed = tx.execute(&sql, params_from_iter(bind_values))?;
        if changed != 1 {
            return Err(RepoError::InvalidData(format!(
                "update for event {id} touched {changed} rows"
            )));
        }

        let event = load_event(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;

        Ok(event)
    }

    fn insert_action(
        &self,
        event_id: EventId,
        action_type: ActionType,
        comment: Option<&str>,
    ) -> RepoResult<ActionId> {
        if !event_exists(self.conn, event_id)? {
            return Err(RepoError::NotFound(event_id));
        }
        append_action(self.conn, event_id, action_type, comment, &timestamp::now())
    }

    fn list_actions(&self, event_id: EventId) -> RepoResult<Vec<EventAction>> {
        if !event_exists(self.conn, event_id)? {
            return Err(RepoError::NotFound(event_id));
        }

        let mut stmt = self.conn.prepare(&format!(
            "{ACTION_SELECT_SQL}
             WHERE event_id = ?1
             ORDER BY action_time DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([event_id])?;
        let mut actions = Vec::new();
        while let Some(row) = rows.next()? {
            actions.push(parse_action_row(row)?);
        }

        Ok(actions)
    }

    fn transition_status(
        &mut self,
        id: EventId,
        transition: &StatusTransition<'_>,
    ) -> RepoResult<Event> {
        // Immediate: take the write lock before reading status so a concurrent
        // writer observes the post-transition state.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let actual = load_status(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        if actual != transition.from {
            return Err(RepoError::Conflict {
                event_id: id,
                expected: transition.from,
                actual,
            });
        }

        let now = timestamp::now();
        let changed = tx.execute(
            "UPDATE events
             SET
                status = ?1,
                last_modified = MAX(last_modified, ?2)
             WHERE id = ?3
               AND status = ?4;",
            params![
                transition.to.as_str(),
                timestamp::to_storage(&now),
                id,
                transition.from.as_str(),
            ],
        )?;
        if changed != 1 {
            return Err(RepoError::InvalidData(format!(
                "status update for event {id} touched {changed} rows"
            )));
        }

        append_action(&tx, id, transition.action_type, transition.comment, &now)?;
        let event = load_event(&tx, id)?.ok_or(RepoError::NotFound(id))?;
        tx.commit()?;

        Ok(event)
    }

    fn soft_delete_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE events
             SET
                status = ?1,
                last_modified = MAX(last_modified, ?2)
             WHERE id = ?3;",
            params![
                EventStatus::Deleted.as_str(),
                timestamp::to_storage(&timestamp::now()),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn purge_event(&self, id: EventId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }
}

fn load_event(conn: &Connection, id: EventId) -> RepoResult<Option<Event>> {
    let mut stmt = conn.prepare(&format!("{EVENT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_event_row(row)?));
    }

    Ok(None)
}

fn load_status(conn: &Connection, id: EventId) -> RepoResult<Option<EventStatus>> {
    let status_text: Option<String> = conn
        .query_row("SELECT status FROM events WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .optional()?;

    status_text
        .map(|value| parse_status_column(&value))
        .transpose()
}

fn event_exists(conn: &Connection, id: EventId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn append_action(
    conn: &Connection,
    event_id: EventId,
    action_type: ActionType,
    comment: Option<&str>,
    action_time: &Timestamp,
) -> RepoResult<ActionId> {
    conn.execute(
        "INSERT INTO event_actions (
            event_id,
            action_type,
            action_time,
            comment
        ) VALUES (?1, ?2, ?3, ?4);",
        params![
            event_id,
            action_type.as_str(),
            timestamp::to_storage(action_time),
            comment,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<Event> {
    let status_text: String = row.get("status")?;
    let title: String = row.get("title")?;
    if title.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "empty title in events.title".to_string(),
        ));
    }

    Ok(Event {
        id: row.get("id")?,
        title,
        description: row
            .get::<_, Option<String>>("description")?
            .unwrap_or_default(),
        created_at: parse_timestamp_column(row, "events.created_at", "created_at")?,
        due_at: parse_timestamp_column(row, "events.due_at", "due_at")?,
        time_hint: row.get("time_hint")?,
        priority: row.get("priority")?,
        status: parse_status_column(&status_text)?,
        last_modified: parse_timestamp_column(row, "events.last_modified", "last_modified")?,
    })
}

fn parse_action_row(row: &Row<'_>) -> RepoResult<EventAction> {
    let type_text: String = row.get("action_type")?;
    let action_type = ActionType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid action type `{type_text}` in event_actions.action_type"
        ))
    })?;

    Ok(EventAction {
        id: row.get("id")?,
        event_id: row.get("event_id")?,
        action_type,
        action_time: parse_timestamp_column(row, "event_actions.action_time", "action_time")?,
        comment: row.get("comment")?,
    })
}

fn parse_status_column(value: &str) -> RepoResult<EventStatus> {
    value.parse().map_err(|_| {
        RepoError::InvalidData(format!("invalid status `{value}` in events.status"))
    })
}

fn parse_timestamp_column(
    row: &Row<'_>,
    qualified: &str,
    column: &str,
) -> RepoResult<Timestamp> {
    let text: String = row.get(column)?;
    timestamp::from_storage(&text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid timestamp `{text}` in {qualified}"))
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 =
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in REQUIRED_COLUMNS {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
