//! Community feed: per-user lists of shared ideas.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;

use crate::auth::session::CurrentSession;
use crate::errors::AppError;
use crate::models::feed::FeedPost;
use crate::state::AppState;
use crate::store::{FeedMap, StoreError};

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub idea: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub language: String,
}

/// GET /api/v1/feed
pub async fn handle_show_feed(
    State(state): State<AppState>,
    _session: CurrentSession,
) -> Result<Json<FeedMap>, AppError> {
    Ok(Json(state.stores.feed.load().await?))
}

/// POST /api/v1/feed
pub async fn handle_share(
    State(state): State<AppState>,
    session: CurrentSession,
    Json(request): Json<ShareRequest>,
) -> Result<(StatusCode, Json<FeedPost>), AppError> {
    let idea = request.idea.trim();
    if idea.is_empty() {
        return Err(AppError::Validation("Please provide an idea.".to_string()));
    }

    let post = FeedPost {
        idea: idea.to_string(),
        sector: request.sector,
        language: request.language,
        comments: Vec::new(),
    };
    let user = session.username().to_string();
    let shared = post.clone();
    state
        .stores
        .feed
        .update(move |feed| {
            share(feed, &user, shared);
            Ok::<_, StoreError>(())
        })
        .await?;

    info!("{} shared an idea to the feed", session.username());
    Ok((StatusCode::CREATED, Json(post)))
}

fn share(feed: &mut FeedMap, user: &str, post: FeedPost) {
    feed.entry(user.to_string()).or_default().push(post);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(idea: &str) -> FeedPost {
        FeedPost {
            idea: idea.to_string(),
            sector: "Tech".to_string(),
            language: "English".to_string(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn test_share_appends_per_user() {
        let mut feed = FeedMap::new();
        share(&mut feed, "alice", post("first"));
        share(&mut feed, "bob", post("other"));
        share(&mut feed, "alice", post("second"));

        let ideas: Vec<_> = feed["alice"].iter().map(|p| p.idea.as_str()).collect();
        assert_eq!(ideas, vec!["first", "second"]);
        assert_eq!(feed["bob"].len(), 1);
    }
}
