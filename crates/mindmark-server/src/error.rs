use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, AppError>;

/// One failed field check, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("username already exists")]
    DuplicateUsername,

    #[error("incorrect credentials")]
    InvalidCredentials,

    #[error("invalid session token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid_field(path: &str, message: &str) -> Self {
        Self::Validation(vec![FieldError {
            path: path.to_owned(),
            message: message.to_owned(),
        }])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateUsername => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::InvalidToken | Self::Forbidden(_) => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let path = field.to_string();
                errs.iter().map(move |e| FieldError {
                    path: path.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        Self::Validation(fields)
    }
}

/// A body that is missing, not JSON, or the wrong shape is reported like any
/// other input error.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_field("body", &rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Store(anyhow::anyhow!("blocking task failed: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(fields) => json!({
                "message": "Validation failed",
                "errors": fields,
            }),
            Self::DuplicateUsername => json!({
                "message": "Username already exists. Please choose another one.",
            }),
            Self::InvalidCredentials => json!({"message": "Incorrect credentials"}),
            Self::InvalidToken => json!({"message": "Invalid token! Try again."}),
            Self::Forbidden(msg) | Self::NotFound(msg) => json!({"message": msg}),
            Self::Config(_) | Self::Store(_) => {
                tracing::error!(error = %self, "internal error");
                json!({
                    "message": "internal server error",
                    "error": self.to_string(),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
