//! Completion archive over the `recompletion_completion_archive` table.

use rusqlite::params;
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::host::{ArchiveStore, CompletionRecord, CourseId, Timestamp, UserId};

/// An archived completion row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedCompletion {
    pub id: i64,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub time_enrolled: Option<Timestamp>,
    pub time_started: Option<Timestamp>,
    pub time_completed: Option<Timestamp>,
    pub archived_at: Timestamp,
}

/// Copies a completion record into the archive. Returns the new row id.
pub fn insert(
    db: &Database,
    record: &CompletionRecord,
    archived_at: Timestamp,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO recompletion_completion_archive
             (userid, course, timeenrolled, timestarted, timecompleted, archivedat)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user_id,
                record.course_id,
                record.time_enrolled,
                record.time_started,
                record.time_completed,
                archived_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// Archived completions of a user in a course, oldest first.
pub fn find_by_user(
    db: &Database,
    user: UserId,
    course: CourseId,
) -> Result<Vec<ArchivedCompletion>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, userid, course, timeenrolled, timestarted, timecompleted, archivedat
             FROM recompletion_completion_archive
             WHERE userid = ?1 AND course = ?2
             ORDER BY archivedat, id",
        )?;
        let rows = stmt
            .query_map(params![user, course], |row| {
                Ok(ArchivedCompletion {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    course_id: row.get(2)?,
                    time_enrolled: row.get(3)?,
                    time_started: row.get(4)?,
                    time_completed: row.get(5)?,
                    archived_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn count_by_course(db: &Database, course: CourseId) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM recompletion_completion_archive WHERE course = ?1",
            params![course],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

impl ArchiveStore for Database {
    fn archive_completion(
        &self,
        record: &CompletionRecord,
        archived_at: Timestamp,
    ) -> Result<(), DatabaseError> {
        insert(self, record, archived_at).map(|_| ())
    }
}
