//! Append-only action log over the `recompletion_log` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::host::{CourseId, LogAction, LogEntry, LogStore, Timestamp, UserId};

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<(CourseId, UserId, String, Timestamp)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_entry(
    (course_id, user_id, action, time): (CourseId, UserId, String, Timestamp),
) -> Result<LogEntry, DatabaseError> {
    let action = LogAction::parse(&action).ok_or_else(|| DatabaseError::InvalidRow {
        table: "recompletion_log",
        reason: format!("unknown action '{}'", action),
    })?;
    Ok(LogEntry::new(course_id, user_id, action, time))
}

pub fn insert(db: &Database, entry: &LogEntry) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO recompletion_log (course, userid, action, time) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.course_id,
                entry.user_id,
                entry.action.as_str(),
                entry.time
            ],
        )?;
        Ok(())
    })
}

/// Whether an entry exists at or after `since`.
pub fn exists_since(
    db: &Database,
    course: CourseId,
    user: UserId,
    action: LogAction,
    since: Timestamp,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM recompletion_log
             WHERE course = ?1 AND userid = ?2 AND action = ?3 AND time >= ?4",
            params![course, user, action.as_str(), since],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Every entry of a course, oldest first.
pub fn find_by_course(db: &Database, course: CourseId) -> Result<Vec<LogEntry>, DatabaseError> {
    let raw = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT course, userid, action, time FROM recompletion_log
             WHERE course = ?1 ORDER BY time, id",
        )?;
        let rows = stmt
            .query_map(params![course], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    raw.into_iter().map(into_entry).collect()
}

pub fn count_by_action(
    db: &Database,
    course: CourseId,
    action: LogAction,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM recompletion_log WHERE course = ?1 AND action = ?2",
            params![course, action.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

impl LogStore for Database {
    fn append(&self, entry: &LogEntry) -> Result<(), DatabaseError> {
        insert(self, entry)
    }

    fn logged_since(
        &self,
        course: CourseId,
        user: UserId,
        action: LogAction,
        since: Timestamp,
    ) -> Result<bool, DatabaseError> {
        exists_since(self, course, user, action, since)
    }

    fn course_entries(&self, course: CourseId) -> Result<Vec<LogEntry>, DatabaseError> {
        find_by_course(self, course)
    }
}
