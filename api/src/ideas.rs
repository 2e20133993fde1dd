use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use ideaboard_shared::{
    validate_text, validate_title, CreateIdea, Idea, IdeaSort, IdeaTab, IdeaView, IdeaWithStats,
    UpdateIdea, VoteType,
};
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{self, Viewer},
    db,
    error::ApiError,
    profiles, votes, AppState,
};

// ── Query params ──

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    sort: IdeaSort,
}

#[derive(Deserialize)]
pub struct MineParams {
    #[serde(default)]
    tab: IdeaTab,
}

// ── Store ──

fn order_clause(sort: IdeaSort) -> &'static str {
    match sort {
        IdeaSort::CreatedAt => "created_at DESC",
        IdeaSort::UpdatedAt => "updated_at DESC",
        IdeaSort::Score => "(upvotes - downvotes) DESC, created_at DESC",
        IdeaSort::CommentCount => "comment_count DESC, created_at DESC",
    }
}

pub fn fetch_with_stats(conn: &Connection, id: Uuid) -> Result<Option<IdeaWithStats>, ApiError> {
    let idea = conn
        .query_row(
            &format!(
                "SELECT {} FROM ideas_with_stats WHERE id = ?1",
                db::IDEA_STATS_COLUMNS
            ),
            [id],
            db::idea_with_stats,
        )
        .optional()?;
    Ok(idea)
}

/// Loads an idea the viewer is allowed to see. Private ideas of other users
/// are reported as missing.
pub fn fetch_readable(
    conn: &Connection,
    id: Uuid,
    viewer: Option<Viewer>,
) -> Result<IdeaWithStats, ApiError> {
    fetch_with_stats(conn, id)?
        .filter(|stats| stats.idea.is_readable_by(viewer.map(|v| v.user_id)))
        .ok_or(ApiError::NotFound("idea"))
}

/// Loads an idea for a write by `viewer`, who must own it.
fn fetch_owned(conn: &Connection, id: Uuid, viewer: Viewer) -> Result<IdeaWithStats, ApiError> {
    let stats = fetch_readable(conn, id, Some(viewer))?;
    if stats.idea.user_id != viewer.user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(stats)
}

pub fn list_public(conn: &Connection, sort: IdeaSort) -> Result<Vec<IdeaWithStats>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ideas_with_stats WHERE visibility = 'public' ORDER BY {}",
        db::IDEA_STATS_COLUMNS,
        order_clause(sort)
    ))?;
    let ideas = stmt
        .query_map([], db::idea_with_stats)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ideas)
}

pub fn list_owned(
    conn: &Connection,
    owner: Uuid,
    tab: IdeaTab,
) -> Result<Vec<IdeaWithStats>, ApiError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ideas_with_stats
         WHERE user_id = ?1 AND (?2 IS NULL OR visibility = ?2)
         ORDER BY created_at DESC",
        db::IDEA_STATS_COLUMNS
    ))?;
    let visibility = tab.visibility().map(|v| v.as_str());
    let ideas = stmt
        .query_map(rusqlite::params![owner, visibility], db::idea_with_stats)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ideas)
}

pub fn insert_idea(conn: &Connection, owner: Uuid, payload: CreateIdea) -> Result<Idea, ApiError> {
    let title = validate_title(&payload.title)?;
    let content = validate_text("content", &payload.content)?;
    let now = Utc::now();
    let idea = Idea {
        id: Uuid::new_v4(),
        user_id: owner,
        title,
        content,
        status: payload.status,
        visibility: payload.visibility,
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO ideas (id, user_id, title, content, status, visibility, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            idea.id,
            idea.user_id,
            idea.title,
            idea.content,
            idea.status.as_str(),
            idea.visibility.as_str(),
            idea.created_at,
            idea.updated_at
        ],
    )?;
    Ok(idea)
}

pub fn update_idea(conn: &Connection, current: &Idea, changes: UpdateIdea) -> Result<(), ApiError> {
    let title = match changes.title {
        Some(t) => validate_title(&t)?,
        None => current.title.clone(),
    };
    let content = match changes.content {
        Some(c) => validate_text("content", &c)?,
        None => current.content.clone(),
    };
    let status = changes.status.unwrap_or(current.status);
    let visibility = changes.visibility.unwrap_or(current.visibility);

    conn.execute(
        "UPDATE ideas SET title = ?2, content = ?3, status = ?4, visibility = ?5, updated_at = ?6
         WHERE id = ?1",
        rusqlite::params![
            current.id,
            title,
            content,
            status.as_str(),
            visibility.as_str(),
            Utc::now()
        ],
    )?;
    Ok(())
}

/// Votes and comments go with the idea through `ON DELETE CASCADE`.
pub fn delete_idea(conn: &Connection, id: Uuid) -> Result<(), ApiError> {
    conn.execute("DELETE FROM ideas WHERE id = ?1", [id])?;
    Ok(())
}

fn with_viewer_votes(
    ideas: Vec<IdeaWithStats>,
    user_votes: &HashMap<Uuid, VoteType>,
) -> Vec<IdeaView> {
    ideas
        .into_iter()
        .map(|stats| {
            let user_vote = user_votes.get(&stats.idea.id).copied();
            IdeaView::new(stats, user_vote)
        })
        .collect()
}

// ── Handlers ──

/// GET /api/ideas?sort=score
pub async fn list_ideas(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<IdeaView>>, ApiError> {
    let viewer = auth::extract_viewer(&headers, &state);

    let ideas = db::with_conn(&state.db, move |conn| {
        let ideas = list_public(conn, params.sort)?;
        let user_votes = match viewer {
            Some(v) => {
                let ids: Vec<Uuid> = ideas.iter().map(|i| i.idea.id).collect();
                votes::user_votes(conn, v.user_id, &ids)?
            }
            None => HashMap::new(),
        };
        Ok(with_viewer_votes(ideas, &user_votes))
    })
    .await?;

    Ok(Json(ideas))
}

/// GET /api/my/ideas?tab=private
pub async fn my_ideas(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<MineParams>,
) -> Result<Json<Vec<IdeaView>>, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let ideas = db::with_conn(&state.db, move |conn| {
        let ideas = list_owned(conn, viewer.user_id, params.tab)?;
        let ids: Vec<Uuid> = ideas.iter().map(|i| i.idea.id).collect();
        let user_votes = votes::user_votes(conn, viewer.user_id, &ids)?;
        Ok(with_viewer_votes(ideas, &user_votes))
    })
    .await?;

    Ok(Json(ideas))
}

/// POST /api/ideas
pub async fn create_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateIdea>,
) -> Result<(StatusCode, Json<IdeaView>), ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let view = db::with_conn(&state.db, move |conn| {
        profiles::ensure_profile(conn, viewer.user_id)?;
        let idea = insert_idea(conn, viewer.user_id, payload)?;
        tracing::info!(idea_id = %idea.id, user_id = %viewer.user_id, "idea created");
        let stats = fetch_with_stats(conn, idea.id)?.ok_or(ApiError::NotFound("idea"))?;
        Ok(IdeaView::new(stats, None))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/ideas/{id}
pub async fn get_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<IdeaView>, ApiError> {
    let viewer = auth::extract_viewer(&headers, &state);

    let view = db::with_conn(&state.db, move |conn| {
        let stats = fetch_readable(conn, id, viewer)?;
        let user_vote = match viewer {
            Some(v) => votes::user_vote(conn, id, v.user_id)?,
            None => None,
        };
        Ok(IdeaView::new(stats, user_vote))
    })
    .await?;

    Ok(Json(view))
}

/// PUT /api/ideas/{id}
pub async fn edit_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateIdea>,
) -> Result<Json<IdeaView>, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let view = db::with_conn(&state.db, move |conn| {
        let current = fetch_owned(conn, id, viewer)?;
        update_idea(conn, &current.idea, payload)?;
        let stats = fetch_with_stats(conn, id)?.ok_or(ApiError::NotFound("idea"))?;
        let user_vote = votes::user_vote(conn, id, viewer.user_id)?;
        Ok(IdeaView::new(stats, user_vote))
    })
    .await?;

    Ok(Json(view))
}

/// DELETE /api/ideas/{id}
pub async fn remove_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    db::with_conn(&state.db, move |conn| {
        fetch_owned(conn, id, viewer)?;
        delete_idea(conn, id)?;
        tracing::info!(idea_id = %id, "idea deleted");
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaboard_shared::{IdeaStatus, Visibility};

    const TITLE: &str = "Tom & Jerry";
    const MARKDOWN: &str = "> quoted\n\nif a < b && c > d { `x<T>` }";

    fn setup() -> (r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, Uuid) {
        let pool = db::memory_pool();
        db::run_migrations(&pool).unwrap();
        let conn = pool.get().unwrap();
        let user = Uuid::new_v4();
        profiles::ensure_profile(&conn, user).unwrap();
        (conn, user)
    }

    fn create(conn: &Connection, user: Uuid, title: &str, content: &str) -> Idea {
        insert_idea(
            conn,
            user,
            CreateIdea {
                title: title.into(),
                content: content.into(),
                status: Default::default(),
                visibility: Default::default(),
            },
        )
        .unwrap()
    }

    #[test]
    fn title_and_markdown_are_stored_verbatim() {
        let (conn, user) = setup();
        let idea = create(&conn, user, TITLE, MARKDOWN);

        let stored = fetch_with_stats(&conn, idea.id).unwrap().unwrap();
        assert_eq!(stored.idea.title, TITLE);
        assert_eq!(stored.idea.content, MARKDOWN);
    }

    #[test]
    fn update_keeps_markdown_and_untouched_fields() {
        let (conn, user) = setup();
        let idea = create(&conn, user, "Plain", "Body");

        update_idea(
            &conn,
            &idea,
            UpdateIdea {
                title: None,
                content: Some(MARKDOWN.into()),
                status: Some(IdeaStatus::InProgress),
                visibility: None,
            },
        )
        .unwrap();

        let stored = fetch_with_stats(&conn, idea.id).unwrap().unwrap().idea;
        assert_eq!(stored.title, "Plain");
        assert_eq!(stored.content, MARKDOWN);
        assert_eq!(stored.status, IdeaStatus::InProgress);
        assert_eq!(stored.visibility, Visibility::Public);
    }

    #[test]
    fn private_ideas_stay_out_of_the_public_list() {
        let (conn, user) = setup();
        let public = create(&conn, user, "Open", "Body");
        let hidden = create(&conn, user, "Secret", "Body");
        update_idea(
            &conn,
            &hidden,
            UpdateIdea {
                title: None,
                content: None,
                status: None,
                visibility: Some(Visibility::Private),
            },
        )
        .unwrap();

        let listed: Vec<Uuid> = list_public(&conn, IdeaSort::CreatedAt)
            .unwrap()
            .into_iter()
            .map(|i| i.idea.id)
            .collect();
        assert_eq!(listed, vec![public.id]);

        let private = list_owned(&conn, user, IdeaTab::Private).unwrap();
        assert_eq!(private.len(), 1);
        assert_eq!(private[0].idea.id, hidden.id);
    }
}
