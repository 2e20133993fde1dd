use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use ideaboard_shared::{Profile, UpdateProfile};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::{auth, db, error::ApiError, AppState};

pub fn fetch_profile(conn: &Connection, user_id: Uuid) -> Result<Option<Profile>, ApiError> {
    let profile = conn
        .query_row(
            &format!("SELECT {} FROM profiles WHERE id = ?1", db::PROFILE_COLUMNS),
            [user_id],
            db::profile,
        )
        .optional()?;
    Ok(profile)
}

/// Returns the profile for `user_id`, inserting a plain user profile if the
/// identity has not been seen before.
pub fn ensure_profile(conn: &Connection, user_id: Uuid) -> Result<Profile, ApiError> {
    let now = Utc::now();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO profiles (id, role, created_at, updated_at)
         VALUES (?1, 'user', ?2, ?2)",
        rusqlite::params![user_id, now],
    )?;
    if inserted > 0 {
        tracing::info!(%user_id, "created profile");
    }

    fetch_profile(conn, user_id)?.ok_or(ApiError::NotFound("profile"))
}

/// Blank strings clear the field.
fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn update_profile(
    conn: &Connection,
    user_id: Uuid,
    changes: UpdateProfile,
) -> Result<Profile, ApiError> {
    ensure_profile(conn, user_id)?;
    conn.execute(
        "UPDATE profiles SET username = ?2, avatar = ?3, updated_at = ?4 WHERE id = ?1",
        rusqlite::params![
            user_id,
            normalize(changes.username),
            normalize(changes.avatar),
            Utc::now()
        ],
    )?;
    fetch_profile(conn, user_id)?.ok_or(ApiError::NotFound("profile"))
}

// ── Handlers ──

/// PUT /api/profile
pub async fn update_own_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfile>,
) -> Result<Json<Profile>, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let profile = db::with_conn(&state.db, move |conn| {
        update_profile(conn, viewer.user_id, payload)
    })
    .await?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaboard_shared::Role;

    fn conn() -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        let pool = db::memory_pool();
        db::run_migrations(&pool).unwrap();
        pool.get().unwrap()
    }

    #[test]
    fn ensure_profile_creates_once() {
        let conn = conn();
        let user = Uuid::new_v4();
        let first = ensure_profile(&conn, user).unwrap();
        let second = ensure_profile(&conn, user).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.role, Role::User);
        assert_eq!(first.username, None);
    }

    #[test]
    fn update_trims_and_clears_blank_fields() {
        let conn = conn();
        let user = Uuid::new_v4();
        let updated = update_profile(
            &conn,
            user,
            UpdateProfile {
                username: Some("  ada  ".into()),
                avatar: Some("   ".into()),
            },
        )
        .unwrap();

        assert_eq!(updated.username.as_deref(), Some("ada"));
        assert_eq!(updated.avatar, None);
    }
}
