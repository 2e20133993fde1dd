use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use ideaboard_shared::Profile;
use jsonwebtoken::{decode, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{db, error::ApiError, profiles, AppState};

// ── JWT Claims ──

/// Claims of the access tokens minted by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // user id
    pub exp: usize, // expiry (unix timestamp)
}

/// The verified caller of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Uuid,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Resolves the caller from the `Authorization` header. Missing, malformed
/// and expired tokens all yield `None`.
pub fn extract_viewer(headers: &HeaderMap, state: &AppState) -> Option<Viewer> {
    let token = bearer_token(headers)?;
    let secret = state.settings.jwt_secret.expose_secret();

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(Viewer {
            user_id: data.claims.sub,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            None
        }
    }
}

/// Like [`extract_viewer`], but an anonymous caller is an error carrying the
/// sign-in URL to send them to.
pub fn require_viewer(headers: &HeaderMap, state: &AppState) -> Result<Viewer, ApiError> {
    extract_viewer(headers, state).ok_or_else(|| {
        let return_to = headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok());
        ApiError::Unauthenticated {
            login_url: state.settings.login_redirect(return_to),
        }
    })
}

#[cfg(test)]
pub fn issue_token(user_id: Uuid, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = chrono::Utc::now().timestamp() as usize + 3600;
    encode(
        &Header::default(),
        &Claims { sub: user_id, exp },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("token")
}

// ── Handlers ──

/// GET /api/auth/me: the caller's profile, created on first sight
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let viewer = require_viewer(&headers, &state)?;

    let profile = db::with_conn(&state.db, move |conn| {
        profiles::ensure_profile(conn, viewer.user_id)
    })
    .await?;

    Ok(Json(profile))
}
