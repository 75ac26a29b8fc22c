pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::social::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Feed & shared skills
        .route("/api/v1/feed", get(handlers::handle_get_feed))
        .route("/api/v1/skills", post(handlers::handle_share_skill))
        .route("/api/v1/skills/:id", get(handlers::handle_get_skill))
        .route(
            "/api/v1/authors/:id/skills",
            get(handlers::handle_skills_by_author),
        )
        // Interactions
        .route("/api/v1/skills/:id/like", post(handlers::handle_toggle_like))
        .route("/api/v1/skills/:id/save", post(handlers::handle_toggle_save))
        .route("/api/v1/skills/:id/view", post(handlers::handle_record_view))
        .route("/api/v1/skills/:id/vote", post(handlers::handle_vote))
        .route(
            "/api/v1/skills/:id/download",
            post(handlers::handle_download),
        )
        .route(
            "/api/v1/skills/:id/downloaded",
            get(handlers::handle_has_downloaded),
        )
        .route("/api/v1/me/downloads", get(handlers::handle_my_downloads))
        // Comments
        .route(
            "/api/v1/skills/:id/comments",
            get(handlers::handle_get_comments).post(handlers::handle_post_comment),
        )
        .route("/api/v1/comments/:id/replies", post(handlers::handle_reply))
        .route(
            "/api/v1/comments/:id/like",
            post(handlers::handle_toggle_comment_like),
        )
        // Maintenance
        .route("/api/v1/admin/reconcile", post(handlers::handle_reconcile))
        .route(
            "/api/v1/admin/social-data",
            delete(handlers::handle_clear_social_data),
        )
        .with_state(state)
}
