use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::comment::{Comment, Reply};
use crate::models::skill::ShareSkillRequest;
use crate::models::user::UserContext;
use crate::social::coordinator::{
    DownloadOutcome, LikeState, SaveState, ShareOutcome, UserLibrary, ViewState, VoteState,
};
use crate::social::feed::{CommentPage, FeedFilters, FeedItem, FeedOrdering, FeedPage, FeedQuery};
use crate::social::interaction::{Inconsistency, VoteType};
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";
pub const DISPLAY_NAME_HEADER: &str = "x-display-name";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Builds the acting user from request headers. `x-user-id` is required;
/// a missing bearer token means anonymous/local-only mode.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let user_id = header(headers, USER_ID_HEADER).ok_or(AppError::Unauthorized)?;

        let mut user = UserContext::anonymous(user_id);
        if let Some(username) = header(headers, USERNAME_HEADER) {
            user.username = username;
        }
        if let Some(display_name) = header(headers, DISPLAY_NAME_HEADER) {
            user.display_name = display_name;
        }
        user.auth_token = header(headers, AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer ").map(|t| t.trim().to_string()))
            .filter(|t| !t.is_empty());

        Ok(user)
    }
}

// ── Feed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub ordering: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
}

impl FeedParams {
    fn into_query(self) -> Result<FeedQuery, AppError> {
        let ordering = match self.ordering.as_deref() {
            Some(raw) => FeedOrdering::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown feed ordering '{raw}'")))?,
            None => FeedOrdering::default(),
        };
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(FeedQuery {
            ordering,
            filters: FeedFilters {
                category: non_blank(self.category),
                difficulty: non_blank(self.difficulty),
                search: non_blank(self.search),
            },
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(0),
        })
    }
}

/// GET /api/v1/feed
pub async fn handle_get_feed(
    State(state): State<AppState>,
    user: UserContext,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedPage>, AppError> {
    let query = params.into_query()?;
    Ok(Json(state.feed.get_feed(&user.user_id, &query).await))
}

/// GET /api/v1/skills/:id
pub async fn handle_get_skill(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<Json<FeedItem>, AppError> {
    Ok(Json(state.feed.get_skill(&user.user_id, &skill_id).await?))
}

/// GET /api/v1/authors/:id/skills
pub async fn handle_skills_by_author(
    State(state): State<AppState>,
    user: UserContext,
    Path(author_id): Path<String>,
) -> Json<Vec<FeedItem>> {
    Json(state.feed.skills_by_author(&user.user_id, &author_id).await)
}

// ── Share & interactions ────────────────────────────────────────────────────

/// POST /api/v1/skills
pub async fn handle_share_skill(
    State(state): State<AppState>,
    user: UserContext,
    Json(req): Json<ShareSkillRequest>,
) -> Result<(StatusCode, Json<ShareOutcome>), AppError> {
    let outcome = state.coordinator.share_skill(&user, req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/skills/:id/like
pub async fn handle_toggle_like(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<Json<LikeState>, AppError> {
    Ok(Json(state.coordinator.toggle_like(&user, &skill_id).await?))
}

/// POST /api/v1/skills/:id/save
pub async fn handle_toggle_save(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<Json<SaveState>, AppError> {
    Ok(Json(state.coordinator.toggle_save(&user, &skill_id).await?))
}

/// POST /api/v1/skills/:id/view
pub async fn handle_record_view(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<Json<ViewState>, AppError> {
    Ok(Json(state.coordinator.record_view(&user, &skill_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote_type: String,
}

/// POST /api/v1/skills/:id/vote
pub async fn handle_vote(
    State(state): State<AppState>,
    user: UserContext,
    Path(task_id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> Result<Json<VoteState>, AppError> {
    let vote = VoteType::parse(&req.vote_type).ok_or_else(|| {
        AppError::Validation(format!("vote_type must be 'up' or 'down', got '{}'", req.vote_type))
    })?;
    Ok(Json(state.coordinator.vote_on_task(&user, &task_id, vote).await?))
}

// ── Downloads ───────────────────────────────────────────────────────────────

/// POST /api/v1/skills/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Result<Json<DownloadOutcome>, AppError> {
    Ok(Json(state.coordinator.download_skill(&user, &skill_id).await?))
}

#[derive(Debug, Serialize)]
pub struct DownloadedFlag {
    pub downloaded: bool,
}

/// GET /api/v1/skills/:id/downloaded
pub async fn handle_has_downloaded(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
) -> Json<DownloadedFlag> {
    Json(DownloadedFlag {
        downloaded: state.feed.has_downloaded(&user.user_id, &skill_id).await,
    })
}

/// GET /api/v1/me/downloads
pub async fn handle_my_downloads(State(state): State<AppState>, user: UserContext) -> Json<UserLibrary> {
    Json(state.coordinator.user_library(&user).await)
}

// ── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// GET /api/v1/skills/:id/comments
pub async fn handle_get_comments(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Json<CommentPage> {
    Json(
        state
            .feed
            .get_comments(
                &user.user_id,
                &skill_id,
                params.page.unwrap_or(1),
                params.limit.unwrap_or(0),
            )
            .await,
    )
}

/// POST /api/v1/skills/:id/comments
pub async fn handle_post_comment(
    State(state): State<AppState>,
    user: UserContext,
    Path(skill_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state.coordinator.post_comment(&user, &skill_id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// POST /api/v1/comments/:id/replies
pub async fn handle_reply(
    State(state): State<AppState>,
    user: UserContext,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Reply>), AppError> {
    let reply = state
        .coordinator
        .reply_to_comment(&user, &comment_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

/// POST /api/v1/comments/:id/like
pub async fn handle_toggle_comment_like(
    State(state): State<AppState>,
    user: UserContext,
    Path(comment_id): Path<String>,
) -> Result<Json<LikeState>, AppError> {
    Ok(Json(
        state.coordinator.toggle_comment_like(&user, &comment_id).await?,
    ))
}

// ── Maintenance ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub repaired: Vec<Inconsistency>,
}

/// POST /api/v1/admin/reconcile
pub async fn handle_reconcile(
    State(state): State<AppState>,
    _user: UserContext,
) -> Result<Json<ReconcileReport>, AppError> {
    let repaired = state.coordinator.reconcile_counters().await?;
    Ok(Json(ReconcileReport { repaired }))
}

#[derive(Debug, Serialize)]
pub struct ClearReport {
    pub removed_keys: usize,
}

/// DELETE /api/v1/admin/social-data
pub async fn handle_clear_social_data(
    State(state): State<AppState>,
    _user: UserContext,
) -> Result<Json<ClearReport>, AppError> {
    let removed_keys = state.coordinator.clear_all_social_data().await?;
    Ok(Json(ClearReport { removed_keys }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<UserContext, AppError> {
        let (mut parts, _) = request.into_parts();
        UserContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_user_context_from_headers() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "u1")
            .header(USERNAME_HEADER, "ada")
            .header(DISPLAY_NAME_HEADER, "Ada L.")
            .header(AUTHORIZATION, "Bearer abc123")
            .body(())
            .unwrap();

        let user = extract(request).await.unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.username, "ada");
        assert_eq!(user.display_name, "Ada L.");
        assert_eq!(user.auth_token.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_missing_user_id_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_non_bearer_authorization_is_anonymous() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "u1")
            .header(AUTHORIZATION, "Basic Zm9vOmJhcg==")
            .body(())
            .unwrap();

        let user = extract(request).await.unwrap();
        assert!(user.auth_token.is_none());
        assert_eq!(user.username, "u1");
    }

    #[test]
    fn test_feed_params_reject_unknown_ordering() {
        let params = FeedParams {
            ordering: Some("random".into()),
            ..Default::default()
        };
        assert!(matches!(params.into_query(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_feed_params_defaults_and_blank_filters() {
        let params = FeedParams {
            category: Some("  ".into()),
            difficulty: Some("expert".into()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 0);
        assert!(query.filters.category.is_none());
        assert_eq!(query.filters.difficulty.as_deref(), Some("expert"));
    }
}
