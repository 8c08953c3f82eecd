//! Course configuration repository over the `recompletion_config` table.

use rusqlite::params;

use super::{Database, DatabaseError};
use crate::config::keys;
use crate::host::{ConfigStore, CourseId};

/// All name/value rows of a course, ordered by name.
pub fn find_by_course(
    db: &Database,
    course: CourseId,
) -> Result<Vec<(String, String)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT name, value FROM recompletion_config WHERE course = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![course], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Inserts or updates a single row.
pub fn upsert(
    db: &Database,
    course: CourseId,
    name: &str,
    value: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO recompletion_config (course, name, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(course, name) DO UPDATE SET value = excluded.value",
            params![course, name, value],
        )?;
        Ok(())
    })
}

/// Replaces every row of the course in one transaction.
pub fn replace_course(
    db: &Database,
    course: CourseId,
    pairs: &[(String, String)],
) -> Result<(), DatabaseError> {
    db.with_transaction(|tx| {
        tx.execute(
            "DELETE FROM recompletion_config WHERE course = ?1",
            params![course],
        )?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO recompletion_config (course, name, value)
             VALUES (?1, ?2, ?3)",
        )?;
        for (name, value) in pairs {
            stmt.execute(params![course, name, value])?;
        }
        Ok(())
    })
}

/// Courses whose stored recompletion type is set.
pub fn find_enabled_courses(db: &Database) -> Result<Vec<CourseId>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT course FROM recompletion_config
             WHERE name = ?1 AND TRIM(value) NOT IN ('', '0', 'disabled')
             ORDER BY course",
        )?;
        let courses = stmt
            .query_map(params![keys::RECOMPLETION_TYPE], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(courses)
    })
}

impl ConfigStore for Database {
    fn load_course_config(
        &self,
        course: CourseId,
    ) -> Result<Vec<(String, String)>, DatabaseError> {
        find_by_course(self, course)
    }

    fn replace_course_config(
        &self,
        course: CourseId,
        pairs: &[(String, String)],
    ) -> Result<(), DatabaseError> {
        replace_course(self, course, pairs)
    }

    fn set_course_value(
        &self,
        course: CourseId,
        name: &str,
        value: &str,
    ) -> Result<(), DatabaseError> {
        upsert(self, course, name, value)
    }

    fn enabled_courses(&self) -> Result<Vec<CourseId>, DatabaseError> {
        find_enabled_courses(self)
    }
}
