use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use marketsnipe_core::{NewProject, NewSavedComment, Project, SavedComment};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SavedCommentQuery {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    project_id: Option<i64>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ApiError::bad_request(format!("{} is required", field))),
    }
}

/// `GET /api/projects?user_id=`
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let user_id = required(query.user_id, "user_id")?;
    Ok(Json(state.database.list_projects(&user_id).await?))
}

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let Json(project) = payload?;
    required(Some(project.user_id.clone()), "user_id")?;
    required(Some(project.query.clone()), "query")?;
    if project.matches_count < 0 {
        return Err(ApiError::bad_request("matches_count must not be negative"));
    }

    let created = state.database.create_project(&project).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/saved-comments?user_id=&project_id=`
pub async fn list_saved_comments(
    State(state): State<AppState>,
    Query(query): Query<SavedCommentQuery>,
) -> Result<Json<Vec<SavedComment>>, ApiError> {
    let user_id = required(query.user_id, "user_id")?;
    let comments = state
        .database
        .list_saved_comments(&user_id, query.project_id)
        .await?;
    Ok(Json(comments))
}

/// `POST /api/saved-comments`
pub async fn save_comment(
    State(state): State<AppState>,
    payload: Result<Json<NewSavedComment>, JsonRejection>,
) -> Result<(StatusCode, Json<SavedComment>), ApiError> {
    let Json(comment) = payload?;
    required(Some(comment.user_id.clone()), "user_id")?;
    required(Some(comment.comment_text.clone()), "comment_text")?;

    let saved = state.database.save_comment(&comment).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}
