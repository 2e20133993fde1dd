use std::str::FromStr;
use std::time::Duration;

use ideaboard_shared::{
    Author, Comment, CommentWithAuthor, Idea, IdeaWithStats, ModelError, Profile,
};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Row};

use crate::error::ApiError;
use crate::DbPool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open_pool(database_url: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_url).with_init(init_connection);
    r2d2::Pool::new(manager)
}

/// Cascading deletes rely on foreign keys, which SQLite enables per connection.
/// WAL lets readers run beside the single writer; writers queue on the busy
/// timeout instead of failing with `SQLITE_BUSY`.
fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // Answers with the resulting mode; in-memory databases stay on "memory".
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

#[cfg(test)]
pub fn memory_pool() -> DbPool {
    // A single connection keeps every checkout on the same in-memory database.
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    r2d2::Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .expect("in-memory pool")
}

/// Runs `f` on a pooled connection off the async executor.
pub async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, ApiError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

pub fn run_migrations(pool: &DbPool) -> Result<(), ApiError> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS profiles (
            id          BLOB PRIMARY KEY,
            username    TEXT,
            avatar      TEXT,
            role        TEXT NOT NULL DEFAULT 'user'
                        CHECK (role IN ('user', 'super_admin')),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ideas (
            id          BLOB PRIMARY KEY,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            title       TEXT NOT NULL,
            content     TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'planning'
                        CHECK (status IN ('planning', 'in_progress', 'completed', 'abandoned')),
            visibility  TEXT NOT NULL DEFAULT 'public'
                        CHECK (visibility IN ('public', 'private')),
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ideas_user ON ideas(user_id);

        CREATE TABLE IF NOT EXISTS idea_votes (
            idea_id     BLOB NOT NULL REFERENCES ideas(id) ON DELETE CASCADE,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            vote_type   TEXT NOT NULL CHECK (vote_type IN ('up', 'down')),
            created_at  TEXT NOT NULL,
            PRIMARY KEY (idea_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id          BLOB PRIMARY KEY,
            idea_id     BLOB NOT NULL REFERENCES ideas(id) ON DELETE CASCADE,
            user_id     BLOB NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
            parent_id   BLOB REFERENCES comments(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_comments_idea ON comments(idea_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_id);

        CREATE VIEW IF NOT EXISTS ideas_with_stats AS
        SELECT i.id, i.user_id, i.title, i.content, i.status, i.visibility,
               i.created_at, i.updated_at,
               p.username AS author_username,
               p.avatar   AS author_avatar,
               (SELECT COUNT(*) FROM idea_votes v
                 WHERE v.idea_id = i.id AND v.vote_type = 'up')   AS upvotes,
               (SELECT COUNT(*) FROM idea_votes v
                 WHERE v.idea_id = i.id AND v.vote_type = 'down') AS downvotes,
               (SELECT COUNT(*) FROM comments c
                 WHERE c.idea_id = i.id)                          AS comment_count
        FROM ideas i
        LEFT JOIN profiles p ON p.id = i.user_id;
        ",
    )?;

    Ok(())
}

/// Reads a text column into one of the model's closed enums.
pub fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ModelError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: ModelError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ── Row mappers ──
//
// Each expects the column order of the matching `*_COLUMNS` constant.

pub const IDEA_STATS_COLUMNS: &str = "id, user_id, title, content, status, visibility, \
     created_at, updated_at, author_username, author_avatar, upvotes, downvotes, comment_count";

pub fn idea_with_stats(row: &Row<'_>) -> rusqlite::Result<IdeaWithStats> {
    Ok(IdeaWithStats {
        idea: Idea {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            status: parse_column(row, 4)?,
            visibility: parse_column(row, 5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        },
        author_username: row.get(8)?,
        author_avatar: row.get(9)?,
        upvotes: row.get(10)?,
        downvotes: row.get(11)?,
        comment_count: row.get(12)?,
    })
}

pub const PROFILE_COLUMNS: &str = "id, username, avatar, role, created_at, updated_at";

pub fn profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        avatar: row.get(2)?,
        role: parse_column(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub const COMMENT_COLUMNS: &str = "c.id, c.idea_id, c.user_id, c.parent_id, c.content, \
     c.created_at, c.updated_at, p.username, p.avatar";

pub fn comment_with_author(row: &Row<'_>) -> rusqlite::Result<CommentWithAuthor> {
    Ok(CommentWithAuthor {
        comment: Comment {
            id: row.get(0)?,
            idea_id: row.get(1)?,
            user_id: row.get(2)?,
            parent_id: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        },
        author: Author {
            username: row.get(7)?,
            avatar: row.get(8)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaboard_shared::{IdeaStatus, Role};

    #[test]
    fn migrations_are_idempotent() {
        let pool = memory_pool();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let on: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn comment_parent_key_does_not_cascade() {
        let pool = memory_pool();
        run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        let on_delete: String = conn
            .query_row(
                "SELECT on_delete FROM pragma_foreign_key_list('comments')
                 WHERE \"from\" = 'parent_id'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(on_delete, "NO ACTION");
    }

    #[test]
    fn enum_columns_fail_fast_on_unknown_text() {
        let conn = Connection::open_in_memory().unwrap();
        let ok: IdeaStatus = conn
            .query_row("SELECT 'in_progress'", [], |row| parse_column(row, 0))
            .unwrap();
        assert_eq!(ok, IdeaStatus::InProgress);

        let bad = conn.query_row("SELECT 'moderator'", [], |row| parse_column::<Role>(row, 0));
        assert!(matches!(bad, Err(rusqlite::Error::FromSqlConversionFailure(0, _, _))));
    }
}
