use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use ideaboard_shared::{
    build_comment_tree, validate_text, Comment, CommentThread, CommentWithAuthor, CreateComment,
};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::{auth, db, error::ApiError, ideas, profiles, AppState};

// ── Store ──

/// All comments of an idea, oldest first.
pub fn list_for_idea(
    conn: &Connection,
    idea_id: Uuid,
) -> Result<Vec<CommentWithAuthor>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}
         FROM comments c
         LEFT JOIN profiles p ON p.id = c.user_id
         WHERE c.idea_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
        db::COMMENT_COLUMNS
    ))?;
    let comments = stmt
        .query_map([idea_id], db::comment_with_author)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn fetch_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentWithAuthor>, ApiError> {
    let comment = conn
        .query_row(
            &format!(
                "SELECT {} FROM comments c LEFT JOIN profiles p ON p.id = c.user_id
                 WHERE c.id = ?1",
                db::COMMENT_COLUMNS
            ),
            [id],
            db::comment_with_author,
        )
        .optional()?;
    Ok(comment)
}

/// A reply must point at a comment on the same idea.
fn check_parent(conn: &Connection, idea_id: Uuid, parent_id: Uuid) -> Result<(), ApiError> {
    let parent_idea: Option<Uuid> = conn
        .query_row(
            "SELECT idea_id FROM comments WHERE id = ?1",
            [parent_id],
            |row| row.get(0),
        )
        .optional()?;

    match parent_idea {
        Some(owner) if owner == idea_id => Ok(()),
        Some(_) => Err(ApiError::BadRequest(
            "parent comment belongs to another idea".into(),
        )),
        None => Err(ApiError::BadRequest("parent comment does not exist".into())),
    }
}

pub fn insert_comment(
    conn: &Connection,
    idea_id: Uuid,
    user_id: Uuid,
    payload: CreateComment,
) -> Result<Comment, ApiError> {
    let content = validate_text("content", &payload.content)?;
    if let Some(parent_id) = payload.parent_id {
        check_parent(conn, idea_id, parent_id)?;
    }

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        idea_id,
        user_id,
        parent_id: payload.parent_id,
        content,
        created_at: now,
        updated_at: now,
    };
    conn.execute(
        "INSERT INTO comments (id, idea_id, user_id, parent_id, content, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            comment.id,
            comment.idea_id,
            comment.user_id,
            comment.parent_id,
            comment.content,
            comment.created_at,
            comment.updated_at
        ],
    )?;
    Ok(comment)
}

/// Deletes the comment if `user_id` wrote it. Replies below it are removed
/// with it. Returns the number of comments removed.
pub fn delete_comment(conn: &Connection, id: Uuid, user_id: Uuid) -> Result<usize, ApiError> {
    let author: Option<Uuid> = conn
        .query_row("SELECT user_id FROM comments WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    match author {
        None => return Err(ApiError::NotFound("comment")),
        Some(author) if author != user_id => return Err(ApiError::Forbidden),
        Some(_) => {}
    }

    // One statement for the whole subtree; the parent key does not cascade, so
    // thread depth is not bounded by SQLite's trigger recursion limit.
    let removed = conn.execute(
        "DELETE FROM comments WHERE id IN (
             WITH RECURSIVE subtree(id) AS (
                 SELECT ?1
                 UNION ALL
                 SELECT c.id FROM comments c JOIN subtree s ON c.parent_id = s.id
             )
             SELECT id FROM subtree
         )",
        [id],
    )?;
    Ok(removed)
}

// ── Handlers ──

/// GET /api/ideas/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(idea_id): Path<Uuid>,
) -> Result<Json<CommentThread>, ApiError> {
    let viewer = auth::extract_viewer(&headers, &state);

    let rows = db::with_conn(&state.db, move |conn| {
        ideas::fetch_readable(conn, idea_id, viewer)?;
        list_for_idea(conn, idea_id)
    })
    .await?;

    let forest = build_comment_tree(rows);
    if !forest.orphans.is_empty() {
        tracing::warn!(
            %idea_id,
            orphans = ?forest.orphans,
            "comments with unresolvable parents left out of the thread"
        );
    }

    Ok(Json(CommentThread::from_forest(&forest)))
}

/// POST /api/ideas/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(idea_id): Path<Uuid>,
    Json(payload): Json<CreateComment>,
) -> Result<(StatusCode, Json<CommentWithAuthor>), ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let comment = db::with_conn(&state.db, move |conn| {
        profiles::ensure_profile(conn, viewer.user_id)?;
        ideas::fetch_readable(conn, idea_id, Some(viewer))?;
        let comment = insert_comment(conn, idea_id, viewer.user_id, payload)?;
        tracing::info!(
            comment_id = %comment.id,
            %idea_id,
            parent_id = ?comment.parent_id,
            "comment created"
        );
        fetch_comment(conn, comment.id)?.ok_or(ApiError::NotFound("comment"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// DELETE /api/comments/{id}
pub async fn remove_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    db::with_conn(&state.db, move |conn| {
        let removed = delete_comment(conn, id, viewer.user_id)?;
        tracing::info!(comment_id = %id, removed, "comment deleted");
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaboard_shared::CreateIdea;

    type Conn = r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>;

    fn setup() -> (Conn, Uuid, Uuid) {
        let pool = db::memory_pool();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        let user = Uuid::new_v4();
        profiles::ensure_profile(&conn, user).unwrap();
        let idea = new_idea(&conn, user);
        (conn, user, idea)
    }

    fn new_idea(conn: &Connection, user: Uuid) -> Uuid {
        ideas::insert_idea(
            conn,
            user,
            CreateIdea {
                title: "Idea".into(),
                content: "Body".into(),
                status: Default::default(),
                visibility: Default::default(),
            },
        )
        .unwrap()
        .id
    }

    fn post(conn: &Connection, idea: Uuid, user: Uuid, parent: Option<Uuid>, text: &str) -> Uuid {
        insert_comment(
            conn,
            idea,
            user,
            CreateComment {
                content: text.into(),
                parent_id: parent,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn rows_come_back_in_creation_order() {
        let (conn, user, idea) = setup();
        let a = post(&conn, idea, user, None, "a");
        let b = post(&conn, idea, user, Some(a), "b");
        let c = post(&conn, idea, user, None, "c");

        let ids: Vec<Uuid> = list_for_idea(&conn, idea)
            .unwrap()
            .into_iter()
            .map(|c| c.comment.id)
            .collect();
        assert_eq!(ids, vec![a, b, c]);

        let forest = build_comment_tree(list_for_idea(&conn, idea).unwrap());
        assert_eq!(forest.roots.len(), 2);
        assert_eq!(forest.total(), 3);
    }

    #[test]
    fn blank_comment_is_rejected() {
        let (conn, user, idea) = setup();
        let err = insert_comment(
            &conn,
            idea,
            user,
            CreateComment {
                content: "  ".into(),
                parent_id: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Invalid(_)));
    }

    #[test]
    fn reply_to_another_ideas_comment_is_rejected() {
        let (conn, user, idea) = setup();
        let other = new_idea(&conn, user);
        let foreign = post(&conn, other, user, None, "elsewhere");

        let err = insert_comment(
            &conn,
            idea,
            user,
            CreateComment {
                content: "reply".into(),
                parent_id: Some(foreign),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn deleting_a_comment_removes_its_replies() {
        let (conn, user, idea) = setup();
        let root = post(&conn, idea, user, None, "root");
        let reply = post(&conn, idea, user, Some(root), "reply");
        post(&conn, idea, user, Some(reply), "nested");
        let keep = post(&conn, idea, user, None, "other");

        assert_eq!(delete_comment(&conn, root, user).unwrap(), 3);
        let left: Vec<Uuid> = list_for_idea(&conn, idea)
            .unwrap()
            .into_iter()
            .map(|c| c.comment.id)
            .collect();
        assert_eq!(left, vec![keep]);
    }

    #[test]
    fn only_the_author_may_delete() {
        let (conn, user, idea) = setup();
        let id = post(&conn, idea, user, None, "mine");
        let stranger = Uuid::new_v4();

        assert!(matches!(delete_comment(&conn, id, stranger), Err(ApiError::Forbidden)));
        assert!(matches!(
            delete_comment(&conn, Uuid::new_v4(), user),
            Err(ApiError::NotFound("comment"))
        ));
    }

    #[test]
    fn deleting_the_idea_removes_comments() {
        let (conn, user, idea) = setup();
        let root = post(&conn, idea, user, None, "root");
        post(&conn, idea, user, Some(root), "reply");

        ideas::delete_idea(&conn, idea).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn deleting_a_deep_thread_removes_every_level() {
        let (conn, user, idea) = setup();
        let root = post(&conn, idea, user, None, "root");
        let mut parent = root;
        for n in 0..1500 {
            parent = post(&conn, idea, user, Some(parent), &format!("reply {n}"));
        }
        let keep = post(&conn, idea, user, None, "other");

        assert_eq!(delete_comment(&conn, root, user).unwrap(), 1501);
        let left: Vec<Uuid> = list_for_idea(&conn, idea)
            .unwrap()
            .into_iter()
            .map(|c| c.comment.id)
            .collect();
        assert_eq!(left, vec![keep]);
    }

    #[test]
    fn markdown_is_stored_verbatim() {
        let (conn, user, idea) = setup();
        let text = "> quoted\n\nif a < b && c > d { `x<T>` }";
        let id = post(&conn, idea, user, None, text);

        let stored = fetch_comment(&conn, id).unwrap().unwrap();
        assert_eq!(stored.comment.content, text);
    }
}
