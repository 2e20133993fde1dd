use axum::{extract::State, http::HeaderMap, Json};
use ideaboard_shared::AdminStats;
use rusqlite::Connection;

use crate::{auth, db, error::ApiError, profiles, AppState};

const RECENT_LIMIT: i64 = 10;

fn count(conn: &Connection, table: &str) -> Result<i64, ApiError> {
    let total = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(total)
}

pub fn collect_stats(conn: &Connection) -> Result<AdminStats, ApiError> {
    let recent_ideas = conn
        .prepare(&format!(
            "SELECT {} FROM ideas_with_stats ORDER BY created_at DESC LIMIT ?1",
            db::IDEA_STATS_COLUMNS
        ))?
        .query_map([RECENT_LIMIT], db::idea_with_stats)?
        .collect::<Result<Vec<_>, _>>()?;

    let recent_users = conn
        .prepare(&format!(
            "SELECT {} FROM profiles ORDER BY created_at DESC LIMIT ?1",
            db::PROFILE_COLUMNS
        ))?
        .query_map([RECENT_LIMIT], db::profile)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AdminStats {
        total_users: count(conn, "profiles")?,
        total_ideas: count(conn, "ideas")?,
        total_comments: count(conn, "comments")?,
        total_votes: count(conn, "idea_votes")?,
        recent_ideas,
        recent_users,
    })
}

// ── Handlers ──

/// GET /api/admin/stats (super admins only)
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminStats>, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let stats = db::with_conn(&state.db, move |conn| {
        let profile = profiles::ensure_profile(conn, viewer.user_id)?;
        if !profile.is_super_admin() {
            tracing::warn!(user_id = %viewer.user_id, "admin stats refused");
            return Err(ApiError::Forbidden);
        }
        collect_stats(conn)
    })
    .await?;

    Ok(Json(stats))
}
