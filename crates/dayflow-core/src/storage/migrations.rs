//! Database schema migrations for dayflow.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);
    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: initial schema.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            id                  TEXT PRIMARY KEY,
            title               TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            priority            TEXT NOT NULL DEFAULT 'medium',
            due_date            TEXT,
            is_hard_due         INTEGER NOT NULL DEFAULT 0,
            estimated_minutes   INTEGER,
            estimated_hours     INTEGER,
            is_completed        INTEGER NOT NULL DEFAULT 0,
            completed_at        TEXT,
            snoozed_until       TEXT,
            backlog_date        TEXT,
            start_at            TEXT,
            dependencies        TEXT NOT NULL DEFAULT '[]',
            project_id          TEXT,
            project_owner       TEXT,
            created_by          TEXT,
            assigned_to         TEXT,
            assigned_team       TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS break_policies (
            id                  TEXT PRIMARY KEY,
            owner_user          TEXT,
            owner_team          TEXT,
            focus_minutes       INTEGER NOT NULL DEFAULT 25,
            break_minutes       INTEGER NOT NULL DEFAULT 5,
            long_break_minutes  INTEGER NOT NULL DEFAULT 15,
            cycle_count         INTEGER NOT NULL DEFAULT 4,
            active              INTEGER NOT NULL DEFAULT 1,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS availability_templates (
            id          TEXT PRIMARY KEY,
            owner_user  TEXT,
            owner_team  TEXT,
            day_of_week INTEGER NOT NULL,
            start_time  TEXT NOT NULL,
            end_time    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS calendar_events (
            id          TEXT PRIMARY KEY,
            owner_user  TEXT,
            owner_team  TEXT,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            start_at    TEXT NOT NULL,
            end_at      TEXT NOT NULL,
            is_busy     INTEGER NOT NULL DEFAULT 1,
            source      TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS time_blocks (
            id          TEXT PRIMARY KEY,
            owner_user  TEXT,
            owner_team  TEXT,
            task_id     TEXT,
            title       TEXT NOT NULL,
            start_at    TEXT NOT NULL,
            end_at      TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'planned',
            is_break    INTEGER NOT NULL DEFAULT 0,
            source      TEXT NOT NULL DEFAULT 'auto',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS work_goals (
            id                  TEXT PRIMARY KEY,
            owner_user          TEXT,
            owner_team          TEXT,
            name                TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            project_id          TEXT,
            target_date         TEXT,
            is_active           INTEGER NOT NULL DEFAULT 1,
            progress_percentage REAL NOT NULL DEFAULT 0,
            total_tasks         INTEGER NOT NULL DEFAULT 0,
            completed_tasks     INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_reviews (
            id                  TEXT PRIMARY KEY,
            owner_user          TEXT NOT NULL,
            date                TEXT NOT NULL,
            summary             TEXT NOT NULL DEFAULT '',
            mood                TEXT NOT NULL DEFAULT '',
            highlights          TEXT NOT NULL DEFAULT '',
            lessons             TEXT NOT NULL DEFAULT '',
            tomorrow_top3       TEXT NOT NULL DEFAULT '[]',
            tasks_planned       INTEGER NOT NULL DEFAULT 0,
            tasks_completed     INTEGER NOT NULL DEFAULT 0,
            completion_rate     REAL NOT NULL DEFAULT 0,
            focus_time_minutes  INTEGER NOT NULL DEFAULT 0,
            break_time_minutes  INTEGER NOT NULL DEFAULT 0,
            productivity_score  REAL NOT NULL DEFAULT 0,
            current_streak      INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            UNIQUE(owner_user, date)
        );

        CREATE TABLE IF NOT EXISTS productivity_insights (
            id               TEXT PRIMARY KEY,
            owner_user       TEXT NOT NULL,
            insight_type     TEXT NOT NULL,
            data             TEXT NOT NULL DEFAULT '{}',
            confidence_score REAL NOT NULL DEFAULT 0,
            sample_size      INTEGER NOT NULL DEFAULT 0,
            valid_from       TEXT NOT NULL,
            valid_until      TEXT NOT NULL,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            UNIQUE(owner_user, insight_type)
        );

        CREATE TABLE IF NOT EXISTS team_members (
            user_id TEXT PRIMARY KEY,
            team_id TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_is_completed ON tasks(is_completed);
        CREATE INDEX IF NOT EXISTS idx_tasks_due_date ON tasks(due_date);
        CREATE INDEX IF NOT EXISTS idx_tasks_assigned_to ON tasks(assigned_to);
        CREATE INDEX IF NOT EXISTS idx_events_start ON calendar_events(start_at);
        CREATE INDEX IF NOT EXISTS idx_events_end ON calendar_events(end_at);
        CREATE INDEX IF NOT EXISTS idx_blocks_start ON time_blocks(start_at);
        CREATE INDEX IF NOT EXISTS idx_blocks_status ON time_blocks(status);
        CREATE INDEX IF NOT EXISTS idx_blocks_task ON time_blocks(task_id);
        CREATE INDEX IF NOT EXISTS idx_reviews_user_date ON daily_reviews(owner_user, date);
        CREATE INDEX IF NOT EXISTS idx_templates_owner_day
            ON availability_templates(owner_user, owner_team, day_of_week);",
    )?;
    set_schema_version(conn, 1)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 1);
    }

    #[test]
    fn tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN (
                    'tasks', 'break_policies', 'availability_templates', 'calendar_events',
                    'time_blocks', 'work_goals', 'daily_reviews', 'productivity_insights',
                    'team_members'
                )",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 9);
    }
}
