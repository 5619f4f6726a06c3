use axum::{
    extract::{FromRequest, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::{
    accounts::{self, Credentials},
    error::{AppError, Result},
    store::{ContentKind, DeleteOutcome, NewContent, ResolveOutcome, UserId},
    AppState,
};

/// `Json` extractor whose rejections render as `AppError::Validation`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Run blocking work (Argon2, mostly) off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

// ── Accounts ──────────────────────────────────────────────────────────────────

pub async fn signup(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<Response> {
    let store = state.store.clone();
    let user = blocking(move || accounts::register(&store, &body)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New User added successfully",
            "user": {"username": user.username},
        })),
    )
        .into_response())
}

pub async fn signin(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> Result<Response> {
    let store = state.store.clone();
    let user_id = blocking(move || accounts::authenticate(&store, &body)).await?;
    let token = state.sessions.issue(&user_id)?;
    info!(user_id = %user_id, "user signed in");
    Ok(Json(json!({
        "message": "User logged in successfully",
        "token": token,
    }))
    .into_response())
}

// ── Content ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContentRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Link is required"))]
    pub link: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateContentRequest {
    fn into_new_content(self) -> Result<NewContent> {
        let kind = ContentKind::parse(&self.kind);
        let mut fields = match self.validate() {
            Ok(()) => vec![],
            Err(e) => match AppError::from(e) {
                AppError::Validation(fields) => fields,
                other => return Err(other),
            },
        };
        if kind.is_none() {
            fields.push(crate::error::FieldError {
                path: "type".into(),
                message: "Type must be one of image, video, article, audio".into(),
            });
        }
        match kind {
            Some(kind) if fields.is_empty() => Ok(NewContent {
                link: self.link,
                kind,
                title: self.title,
                tags: self.tags,
            }),
            _ => Err(AppError::Validation(fields)),
        }
    }
}

pub async fn create_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    JsonBody(body): JsonBody<CreateContentRequest>,
) -> Result<Response> {
    let new = body.into_new_content()?;
    let record = state
        .store
        .insert_content(user.as_str(), new)?
        .ok_or(AppError::InvalidToken)?;
    info!(content_id = %record.id, user_id = %user, "content created");
    let view = state.store.content_view(record)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "New Content added to brain successfully",
            "content": view,
        })),
    )
        .into_response())
}

/// Always 201, even for an empty list; clients depend on that status.
pub async fn list_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
) -> Result<Response> {
    let data = state.store.list_content_by_owner(user.as_str())?;
    Ok((StatusCode::CREATED, Json(json!({ "data": data }))).into_response())
}

/// Body for endpoints addressing one content item.
#[derive(Debug, Deserialize)]
pub struct ContentIdRequest {
    #[serde(default, rename = "contentId")]
    pub content_id: Option<String>,
}

impl ContentIdRequest {
    fn content_id(&self) -> Result<&str> {
        self.content_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::invalid_field("contentId", "Content ID is required."))
    }
}

pub async fn delete_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    JsonBody(body): JsonBody<ContentIdRequest>,
) -> Result<Response> {
    let content_id = body.content_id()?;
    match state.store.delete_content(content_id, user.as_str())? {
        DeleteOutcome::Deleted => {
            info!(content_id, user_id = %user, "content deleted");
            Ok((
                StatusCode::CREATED,
                Json(json!({"message": "Data deleted from brain"})),
            )
                .into_response())
        }
        DeleteOutcome::NotOwner => {
            info!(content_id, user_id = %user, "delete refused: not owner");
            Err(AppError::Forbidden("Error deleting data from brain!!"))
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound("Content not found.")),
    }
}

// ── Sharing ───────────────────────────────────────────────────────────────────

pub async fn create_share_link(
    State(state): State<AppState>,
    Extension(user): Extension<UserId>,
    JsonBody(body): JsonBody<ContentIdRequest>,
) -> Result<Response> {
    let content_id = body.content_id()?;
    let link = state
        .store
        .create_share_link(user.as_str(), content_id)?
        .ok_or(AppError::NotFound("Content not found."))?;

    info!(content_id, user_id = %user, "share link created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Content shared successfully.",
            "shareableUrl": state.shareable_url(&link.hash),
        })),
    )
        .into_response())
}

pub async fn open_share_link(
    State(state): State<AppState>,
    Path(share_link): Path<String>,
) -> Result<Response> {
    match state.store.resolve_share_link(&share_link)? {
        ResolveOutcome::Content(content) => Ok(Json(json!({
            "message": "Content retrieved successfully.",
            "content": content,
        }))
        .into_response()),
        ResolveOutcome::LinkNotFound => Err(AppError::NotFound("Invalid or expired link.")),
        ResolveOutcome::ContentMissing => Err(AppError::NotFound("Content not found.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(link: &str, kind: &str, title: &str) -> CreateContentRequest {
        CreateContentRequest {
            link: link.into(),
            kind: kind.into(),
            title: title.into(),
            tags: vec!["t".into()],
        }
    }

    #[test]
    fn valid_content_request() {
        let new = request("http://x", "audio", "t").into_new_content().unwrap();
        assert_eq!(new.kind, ContentKind::Audio);
        assert_eq!(new.tags, vec!["t".to_string()]);
    }

    #[test]
    fn content_request_reports_every_bad_field() {
        let Err(AppError::Validation(fields)) = request("", "podcast", "").into_new_content()
        else {
            panic!("expected validation error");
        };
        let paths: Vec<&str> = fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["link", "title", "type"]);
    }

    #[test]
    fn content_id_required() {
        let missing = ContentIdRequest { content_id: None };
        let blank = ContentIdRequest {
            content_id: Some("  ".into()),
        };
        assert!(matches!(missing.content_id(), Err(AppError::Validation(_))));
        assert!(matches!(blank.content_id(), Err(AppError::Validation(_))));
    }
}
