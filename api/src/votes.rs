use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use ideaboard_shared::{
    cast_vote, CastVote, StoreMutation, VoteCounters, VoteError, VoteResponse, VoteType,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::{auth, db, error::ApiError, ideas, profiles, AppState};

// ── Store ──

pub fn user_vote(
    conn: &Connection,
    idea_id: Uuid,
    user_id: Uuid,
) -> Result<Option<VoteType>, ApiError> {
    let vote = conn
        .query_row(
            "SELECT vote_type FROM idea_votes WHERE idea_id = ?1 AND user_id = ?2",
            rusqlite::params![idea_id, user_id],
            |row| db::parse_column(row, 0),
        )
        .optional()?;
    Ok(vote)
}

/// The viewer's votes on any of `idea_ids`.
pub fn user_votes(
    conn: &Connection,
    user_id: Uuid,
    idea_ids: &[Uuid],
) -> Result<HashMap<Uuid, VoteType>, ApiError> {
    if idea_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let wanted: std::collections::HashSet<&Uuid> = idea_ids.iter().collect();
    let mut stmt = conn.prepare("SELECT idea_id, vote_type FROM idea_votes WHERE user_id = ?1")?;
    let rows = stmt.query_map([user_id], |row| {
        Ok((row.get::<_, Uuid>(0)?, db::parse_column::<VoteType>(row, 1)?))
    })?;

    let mut votes = HashMap::new();
    for row in rows {
        let (idea_id, vote_type) = row?;
        if wanted.contains(&idea_id) {
            votes.insert(idea_id, vote_type);
        }
    }
    Ok(votes)
}

pub fn counters(conn: &Connection, idea_id: Uuid) -> Result<VoteCounters, ApiError> {
    let counters = conn.query_row(
        "SELECT COALESCE(SUM(vote_type = 'up'), 0), COALESCE(SUM(vote_type = 'down'), 0)
         FROM idea_votes WHERE idea_id = ?1",
        [idea_id],
        |row| Ok(VoteCounters::new(row.get(0)?, row.get(1)?)),
    )?;
    Ok(counters)
}

/// Performs the write described by a vote transition. Upserts are keyed on
/// (idea_id, user_id), so a repeat from the same user replaces its row.
pub fn apply_mutation(conn: &Connection, mutation: &StoreMutation) -> Result<(), ApiError> {
    match mutation {
        StoreMutation::Delete { idea_id, user_id } => {
            conn.execute(
                "DELETE FROM idea_votes WHERE idea_id = ?1 AND user_id = ?2",
                rusqlite::params![idea_id, user_id],
            )?;
        }
        StoreMutation::Upsert {
            idea_id,
            user_id,
            vote_type,
        } => {
            conn.execute(
                "INSERT INTO idea_votes (idea_id, user_id, vote_type, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(idea_id, user_id) DO UPDATE SET vote_type = excluded.vote_type",
                rusqlite::params![idea_id, user_id, vote_type.as_str(), Utc::now()],
            )?;
        }
    }
    Ok(())
}

/// Reads the stored vote, runs the transition and writes its mutation in one
/// transaction. Returns the stored state afterwards.
///
/// The transaction takes the write lock up front: a deferred one that reads
/// first cannot upgrade while another writer holds the lock.
pub fn record_vote(
    conn: &mut Connection,
    idea_id: Uuid,
    user_id: Uuid,
    target: VoteType,
) -> Result<VoteResponse, ApiError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    ideas::fetch_readable(&tx, idea_id, Some(auth::Viewer { user_id }))?;
    let current = user_vote(&tx, idea_id, user_id)?;
    let before = counters(&tx, idea_id)?;

    let transition = cast_vote(idea_id, Some(user_id), target, current, before)
        .map_err(|e: VoteError| ApiError::BadRequest(e.to_string()))?;
    apply_mutation(&tx, &transition.mutation)?;

    let stored = user_vote(&tx, idea_id, user_id)?;
    let after = counters(&tx, idea_id)?;
    tx.commit()?;

    tracing::debug!(
        %idea_id,
        %user_id,
        from = ?current,
        to = ?stored,
        upvotes = after.upvotes,
        downvotes = after.downvotes,
        "vote recorded"
    );
    Ok(VoteResponse::new(stored, after))
}

// ── Handlers ──

/// GET /api/ideas/{id}/vote
pub async fn get_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(idea_id): Path<Uuid>,
) -> Result<Json<VoteResponse>, ApiError> {
    let viewer = auth::extract_viewer(&headers, &state);

    let resp = db::with_conn(&state.db, move |conn| {
        ideas::fetch_readable(conn, idea_id, viewer)?;
        let user_vote = match viewer {
            Some(v) => user_vote(conn, idea_id, v.user_id)?,
            None => None,
        };
        Ok(VoteResponse::new(user_vote, counters(conn, idea_id)?))
    })
    .await?;

    Ok(Json(resp))
}

/// POST /api/ideas/{id}/vote. Pressing the held direction again retracts.
pub async fn post_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(idea_id): Path<Uuid>,
    Json(payload): Json<CastVote>,
) -> Result<Json<VoteResponse>, ApiError> {
    let viewer = auth::require_viewer(&headers, &state)?;

    let resp = db::with_conn(&state.db, move |conn| {
        profiles::ensure_profile(conn, viewer.user_id)?;
        record_vote(conn, idea_id, viewer.user_id, payload.vote_type)
    })
    .await?;

    Ok(Json(resp))
}
