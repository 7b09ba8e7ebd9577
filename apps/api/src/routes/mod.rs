pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth;
use crate::feed;
use crate::ideas::handlers as ideas;
use crate::jobs::handlers as jobs;
use crate::projects::handlers as projects;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/register", post(auth::handle_register))
        .route("/api/v1/auth/login", post(auth::handle_login))
        .route(
            "/api/v1/auth/forget-password",
            post(auth::handle_forget_password),
        )
        .route("/api/v1/auth/logout", post(auth::handle_logout))
        // Ideas
        .route("/api/v1/ideas", get(ideas::handle_list_ideas))
        .route("/api/v1/ideas/clear", post(ideas::handle_clear_history))
        .route("/api/v1/recommend", post(ideas::handle_recommend))
        .route("/api/v1/collaboration", post(ideas::handle_collaboration))
        .route(
            "/api/v1/start_project/:idea_id",
            get(ideas::handle_start_project),
        )
        // Jobs
        .route(
            "/api/v1/skills",
            get(jobs::handle_list_skills).post(jobs::handle_search_skill),
        )
        .route(
            "/api/v1/select_apply/:encoded_skill",
            get(jobs::handle_select_apply),
        )
        .route("/api/v1/apply_all", post(jobs::handle_apply_all))
        .route("/api/v1/apply", post(jobs::handle_apply))
        .route("/api/v1/apply_selected", post(jobs::handle_apply_selected))
        .route("/api/v1/check_resume", post(jobs::handle_check_resume))
        // Projects
        .route("/api/v1/upload_project", post(projects::handle_upload_project))
        .route("/api/v1/project_history", get(projects::handle_project_history))
        .route("/api/v1/download/:filename", get(projects::handle_download))
        // Feed
        .route(
            "/api/v1/feed",
            get(feed::handle_show_feed).post(feed::handle_share),
        )
        .with_state(state)
}
