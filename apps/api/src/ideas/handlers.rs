//! Axum route handlers for ideas: recommend, collaborate, history, export.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::session::CurrentSession;
use crate::errors::AppError;
use crate::ideas::export::{export_filename, find_idea, IdeaDocument, DOCX_CONTENT_TYPE};
use crate::models::idea::{IdeaRecord, DEFAULT_LANGUAGE};
use crate::state::AppState;
use crate::store::{next_id, RecordId, StoreError};

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub idea: String,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: String,
    pub idea_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct CollaborationRequest {
    pub idea_id: Option<RecordId>,
    #[serde(default)]
    pub idea: String,
    #[serde(default)]
    pub recommendations: String,
    #[serde(default)]
    pub sector: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CollaborationResponse {
    pub idea_id: RecordId,
    pub updated: bool,
}

#[derive(Debug, Serialize)]
pub struct IdeaListResponse {
    pub username: String,
    pub ideas: Vec<IdeaRecord>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/ideas
///
/// All stored ideas, latest first.
pub async fn handle_list_ideas(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<Json<IdeaListResponse>, AppError> {
    let mut ideas = state.stores.ideas.load().await?;
    ideas.reverse();
    Ok(Json(IdeaListResponse {
        username: session.data.username,
        ideas,
    }))
}

/// POST /api/v1/recommend
///
/// Generates recommendations and persists the idea before responding. A provider
/// failure returns 502 and stores nothing.
pub async fn handle_recommend(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, AppError> {
    let idea = request.idea.trim().to_string();
    let recommendations = state.recommender.recommend(&idea).await?;

    let user = session.username().to_string();
    let stored = recommendations.clone();
    let idea_id = state
        .stores
        .ideas
        .update(move |ideas| {
            let id = next_id(ideas);
            ideas.push(IdeaRecord::new(id, &user, &idea, stored, Utc::now()));
            Ok::<_, StoreError>(id)
        })
        .await?;

    info!("Stored idea {idea_id} for {}", session.username());
    Ok(Json(RecommendResponse {
        recommendations,
        idea_id,
    }))
}

/// POST /api/v1/collaboration
///
/// Attaches sector/language to the idea with the given id. Without an id, or
/// with an id that matches nothing, a new idea is appended instead.
pub async fn handle_collaboration(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(request): Json<CollaborationRequest>,
) -> Result<Json<CollaborationResponse>, AppError> {
    let user = session.username().to_string();
    let response = state
        .stores
        .ideas
        .update(move |ideas| Ok::<_, StoreError>(apply_collaboration(ideas, &user, request)))
        .await?;
    Ok(Json(response))
}

fn apply_collaboration(
    ideas: &mut Vec<IdeaRecord>,
    user: &str,
    request: CollaborationRequest,
) -> CollaborationResponse {
    let now = Utc::now();
    let language = request
        .language
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let wanted = request
        .idea_id
        .map(|id| id.to_string())
        .filter(|id| !id.trim().is_empty());

    if let Some(wanted) = &wanted {
        if let Some(existing) = ideas.iter_mut().find(|i| i.id.to_string() == *wanted) {
            existing.apply_collaboration(&request.sector, &language, now);
            return CollaborationResponse {
                idea_id: existing.id.clone(),
                updated: true,
            };
        }
    }

    let id = next_id(ideas);
    let mut record = IdeaRecord::new(id, user, &request.idea, request.recommendations, now);
    record.sector = request.sector;
    record.language = language;
    ideas.push(record);
    CollaborationResponse {
        idea_id: RecordId::Number(id),
        updated: false,
    }
}

/// POST /api/v1/ideas/clear
pub async fn handle_clear_history(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Result<StatusCode, AppError> {
    state.stores.ideas.save(&Vec::new()).await?;
    info!("Idea history cleared by {}", session.username());
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/start_project/:idea_id
///
/// Downloads the idea and its recommendations as a `.docx`.
pub async fn handle_start_project(
    State(state): State<AppState>,
    _session: CurrentSession,
    Path(idea_id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let ideas = state.stores.ideas.load().await?;
    let idea = find_idea(&ideas, idea_id)
        .ok_or_else(|| AppError::NotFound("Idea not found.".to_string()))?;

    let bytes = IdeaDocument::from_idea(idea)
        .to_docx()
        .map_err(|e| AppError::Internal(e.into()))?;
    let disposition = format!("attachment; filename=\"{}\"", export_filename(&idea.idea));

    Ok((
        [
            (header::CONTENT_TYPE, DOCX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
