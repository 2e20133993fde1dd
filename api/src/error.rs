use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ideaboard_shared::{ErrorBody, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("sign in required")]
    Unauthenticated { login_url: String },

    #[error("not allowed")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Invalid(#[from] ModelError),

    #[error("store mutation failed: {0}")]
    StoreMutationFailed(#[from] rusqlite::Error),

    #[error("database pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::StoreMutationFailed(_) | ApiError::Pool(_) | ApiError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let login_url = match &self {
            ApiError::Unauthenticated { login_url } => Some(login_url.clone()),
            _ => None,
        };
        // Internal details stay in the log.
        let error = if status.is_server_error() {
            "something went wrong, please try again".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { error, login_url })).into_response()
    }
}
