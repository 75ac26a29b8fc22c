//! Optimistic Update Coordinator.
//!
//! Every mutating action runs in three phases:
//! 1. stage: read the documents, apply the interaction in memory, and expose
//!    the resulting view (`PendingUpdate::optimistic`) for immediate rendering
//! 2. commit: compare-and-swap each staged document in order
//! 3. on the first failed write, restore every document already written and
//!    return `SocialError::RolledBack` carrying the pre-action view
//!
//! Ledger flag and counter move in the same in-memory step, so a committed or
//! rolled-back action never leaves them out of step. Nothing is retried here;
//! callers decide. The coordinator does not serialize overlapping calls on the
//! same target, but a stale second write surfaces as a CAS conflict.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::comment::{Comment, Reply};
use crate::models::skill::{CopyOrigin, DownloadedSkill, ShareSkillRequest, SharedSkill, Visibility};
use crate::models::user::UserContext;
use crate::remote::{SkillPlan, SkillService};
use crate::social::interaction::{reconcile, Inconsistency, Interaction, LikeCounter, VoteType};
use crate::social::ledger::{InteractionKind, InteractionLedger};
use crate::social::repository::{
    comments_key, insert_download, user_skills_key, DownloadIndex, Repository, Versioned,
    INTERACTIONS_KEY, SHARED_SKILLS_KEY, USER_DOWNLOADS_KEY,
};
use crate::social::validation::{validate_comment_text, validate_share};
use crate::social::SocialError;

// ────────────────────────────────────────────────────────────────────────────
// Views returned to callers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SaveState {
    pub saved: bool,
    pub save_count: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VoteState {
    pub user_vote: Option<VoteType>,
    pub upvotes: u64,
    pub downvotes: u64,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViewState {
    pub views_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareOutcome {
    pub success: bool,
    pub skill: SharedSkill,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadOutcome {
    pub success: bool,
    pub already_downloaded: bool,
    /// `None` when an earlier download was indexed without a recorded copy.
    pub skill: Option<DownloadedSkill>,
    pub downloads_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserLibrary {
    /// Every recorded copy, local or remote.
    pub copies: Vec<DownloadedSkill>,
    pub remote: Vec<SkillPlan>,
    /// Set when a token was present but the remote listing failed.
    pub remote_error: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Staging
// ────────────────────────────────────────────────────────────────────────────

/// One document write, with both sides kept for rollback.
#[derive(Debug, Clone)]
enum StagedWrite {
    SharedSkills {
        expected: u64,
        before: Vec<SharedSkill>,
        after: Vec<SharedSkill>,
    },
    Ledger {
        expected: u64,
        before: InteractionLedger,
        after: InteractionLedger,
    },
    Comments {
        skill_id: String,
        expected: u64,
        before: Vec<Comment>,
        after: Vec<Comment>,
    },
    Downloads {
        expected: u64,
        before: DownloadIndex,
        after: DownloadIndex,
    },
    UserSkills {
        user_id: String,
        expected: u64,
        before: Vec<DownloadedSkill>,
        after: Vec<DownloadedSkill>,
    },
}

impl StagedWrite {
    fn key(&self) -> String {
        match self {
            StagedWrite::SharedSkills { .. } => SHARED_SKILLS_KEY.to_string(),
            StagedWrite::Ledger { .. } => INTERACTIONS_KEY.to_string(),
            StagedWrite::Comments { skill_id, .. } => comments_key(skill_id),
            StagedWrite::Downloads { .. } => USER_DOWNLOADS_KEY.to_string(),
            StagedWrite::UserSkills { user_id, .. } => user_skills_key(user_id),
        }
    }

    fn expected(&self) -> u64 {
        match self {
            StagedWrite::SharedSkills { expected, .. }
            | StagedWrite::Ledger { expected, .. }
            | StagedWrite::Comments { expected, .. }
            | StagedWrite::Downloads { expected, .. }
            | StagedWrite::UserSkills { expected, .. } => *expected,
        }
    }
}

#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

/// A staged action: the optimistic view is ready, nothing is persisted yet.
#[derive(Debug)]
pub struct PendingUpdate<T> {
    optimistic: T,
    previous: Option<T>,
    writes: Vec<StagedWrite>,
    inconsistencies: Vec<Inconsistency>,
}

impl<T> PendingUpdate<T> {
    /// What the UI should render right now.
    pub fn optimistic(&self) -> &T {
        &self.optimistic
    }

    /// What the UI showed before the action; `None` for creations.
    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }
}

pub struct Coordinator {
    repo: Arc<Repository>,
    remote: Arc<dyn SkillService>,
}

impl Coordinator {
    pub fn new(repo: Arc<Repository>, remote: Arc<dyn SkillService>) -> Self {
        Self { repo, remote }
    }

    // ── Commit / rollback ──────────────────────────────────────────────────

    /// Persists a staged action. On failure every already-written document is
    /// restored and `SocialError::RolledBack` is returned.
    pub async fn commit<T: Serialize>(&self, pending: PendingUpdate<T>) -> Result<T, SocialError> {
        debug!(
            "Committing {} write(s), optimistic view {}",
            pending.writes.len(),
            serde_json::to_value(pending.optimistic()).unwrap_or_default()
        );

        let mut committed: Vec<(&StagedWrite, u64)> = Vec::with_capacity(pending.writes.len());
        for write in &pending.writes {
            match self.write(write, Side::After, write.expected()).await {
                Ok(revision) => committed.push((write, revision)),
                Err(cause) => {
                    warn!(
                        "Optimistic update failed writing '{}': {cause}; rolling back",
                        write.key()
                    );
                    self.restore(&committed).await;
                    let restored = pending
                        .previous()
                        .and_then(|p| serde_json::to_value(p).ok());
                    return Err(SocialError::RolledBack {
                        cause: Box::new(cause),
                        restored,
                    });
                }
            }
        }

        if !pending.inconsistencies.is_empty() {
            info!("Committed with {} counter repair(s)", pending.inconsistencies.len());
        }
        Ok(pending.optimistic)
    }

    async fn write(&self, write: &StagedWrite, side: Side, expected: u64) -> Result<u64, SocialError> {
        match (write, side) {
            (StagedWrite::SharedSkills { before, .. }, Side::Before) => {
                self.repo.save_shared_skills(before, expected).await
            }
            (StagedWrite::SharedSkills { after, .. }, Side::After) => {
                self.repo.save_shared_skills(after, expected).await
            }
            (StagedWrite::Ledger { before, .. }, Side::Before) => {
                self.repo.save_ledger(before, expected).await
            }
            (StagedWrite::Ledger { after, .. }, Side::After) => {
                self.repo.save_ledger(after, expected).await
            }
            (StagedWrite::Comments { skill_id, before, .. }, Side::Before) => {
                self.repo.save_comments(skill_id, before, expected).await
            }
            (StagedWrite::Comments { skill_id, after, .. }, Side::After) => {
                self.repo.save_comments(skill_id, after, expected).await
            }
            (StagedWrite::Downloads { before, .. }, Side::Before) => {
                self.repo.save_download_index(before, expected).await
            }
            (StagedWrite::Downloads { after, .. }, Side::After) => {
                self.repo.save_download_index(after, expected).await
            }
            (StagedWrite::UserSkills { user_id, before, .. }, Side::Before) => {
                self.repo.save_user_skills(user_id, before, expected).await
            }
            (StagedWrite::UserSkills { user_id, after, .. }, Side::After) => {
                self.repo.save_user_skills(user_id, after, expected).await
            }
        }
    }

    async fn restore(&self, committed: &[(&StagedWrite, u64)]) {
        for (write, revision) in committed.iter().rev() {
            match self.write(write, Side::Before, *revision).await {
                Ok(_) => info!("Restored '{}' after failed update", write.key()),
                Err(e) => error!("Rollback of '{}' failed, document left at new state: {e}", write.key()),
            }
        }
    }

    // ── Skill interactions ─────────────────────────────────────────────────

    /// Stages `interaction` on a stored shared skill. `view` projects the
    /// caller-facing state from (ledger, skill), before and after.
    async fn stage_skill_interaction<T, F>(
        &self,
        user: &UserContext,
        skill_id: &str,
        interaction: Interaction,
        view: F,
    ) -> Result<PendingUpdate<T>, SocialError>
    where
        F: Fn(&InteractionLedger, &SharedSkill) -> T,
    {
        let skills = self.repo.load_shared_skills().await?;
        let ledger = self.repo.load_ledger().await?;

        let index = find_skill(&skills.value, skill_id)?;
        let previous = view(&ledger.value, &skills.value[index]);

        let mut after_skills = skills.value.clone();
        let mut after_ledger = ledger.value.clone();
        let applied = interaction.apply(
            &user.user_id,
            skill_id,
            &mut after_ledger,
            &mut after_skills[index].counters,
        );
        let optimistic = view(&after_ledger, &after_skills[index]);

        Ok(PendingUpdate {
            optimistic,
            previous: Some(previous),
            writes: skill_and_ledger_writes(skills, after_skills, ledger, after_ledger),
            inconsistencies: applied.inconsistencies,
        })
    }

    pub async fn stage_like(
        &self,
        user: &UserContext,
        skill_id: &str,
    ) -> Result<PendingUpdate<LikeState>, SocialError> {
        let user_id = user.user_id.clone();
        self.stage_skill_interaction(
            user,
            skill_id,
            Interaction::Toggle(InteractionKind::Like),
            move |ledger, skill| LikeState {
                liked: ledger.is_active(&user_id, &skill.id, InteractionKind::Like),
                likes_count: skill.counters.likes_count,
            },
        )
        .await
    }

    pub async fn toggle_like(&self, user: &UserContext, skill_id: &str) -> Result<LikeState, SocialError> {
        let pending = self.stage_like(user, skill_id).await?;
        self.commit(pending).await
    }

    pub async fn toggle_save(&self, user: &UserContext, skill_id: &str) -> Result<SaveState, SocialError> {
        let user_id = user.user_id.clone();
        let pending = self
            .stage_skill_interaction(
                user,
                skill_id,
                Interaction::Toggle(InteractionKind::Save),
                move |ledger, skill| SaveState {
                    saved: ledger.is_active(&user_id, &skill.id, InteractionKind::Save),
                    save_count: skill.counters.save_count,
                },
            )
            .await?;
        self.commit(pending).await
    }

    pub async fn stage_vote(
        &self,
        user: &UserContext,
        task_id: &str,
        vote: VoteType,
    ) -> Result<PendingUpdate<VoteState>, SocialError> {
        let user_id = user.user_id.clone();
        self.stage_skill_interaction(user, task_id, Interaction::Vote(vote), move |ledger, skill| {
            let (upvotes, downvotes) = (skill.counters.upvotes, skill.counters.downvotes);
            VoteState {
                user_vote: VoteType::current(ledger, &user_id, &skill.id),
                upvotes,
                downvotes,
                score: upvotes as i64 - downvotes as i64,
            }
        })
        .await
    }

    /// Up/down vote. Switching direction moves both counters; repeating the
    /// current vote clears it.
    pub async fn vote_on_task(
        &self,
        user: &UserContext,
        task_id: &str,
        vote: VoteType,
    ) -> Result<VoteState, SocialError> {
        let pending = self.stage_vote(user, task_id, vote).await?;
        self.commit(pending).await
    }

    pub async fn record_view(&self, user: &UserContext, skill_id: &str) -> Result<ViewState, SocialError> {
        let pending = self
            .stage_skill_interaction(user, skill_id, Interaction::View, |_, skill| ViewState {
                views_count: skill.counters.views_count,
            })
            .await?;
        self.commit(pending).await
    }

    // ── Share ──────────────────────────────────────────────────────────────

    pub async fn share_skill(
        &self,
        user: &UserContext,
        req: ShareSkillRequest,
    ) -> Result<ShareOutcome, SocialError> {
        validate_share(&req)?;

        let now = Utc::now();
        let estimated_duration_days = req
            .estimated_duration_days
            .unwrap_or(req.curriculum.len() as u32);
        let skill = SharedSkill {
            id: Uuid::new_v4().to_string(),
            title: req.title.trim().to_string(),
            skill_description: req.skill_description,
            personal_message: req.personal_message.unwrap_or_default(),
            category: req.category.trim().to_string(),
            difficulty: req.difficulty,
            tags: req
                .tags
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            curriculum: req.curriculum,
            estimated_duration_days,
            author_id: user.user_id.clone(),
            author_username: user.username.clone(),
            author_display_name: user.display_name.clone(),
            created_at: now,
            shared_at: now,
            counters: Default::default(),
            visibility: Visibility::Public,
        };

        let skills = self.repo.load_shared_skills().await?;
        let mut after = Vec::with_capacity(skills.value.len() + 1);
        after.push(skill.clone());
        after.extend(skills.value.iter().cloned());

        let pending = PendingUpdate {
            optimistic: skill,
            previous: None,
            writes: vec![StagedWrite::SharedSkills {
                expected: skills.revision,
                before: skills.value,
                after,
            }],
            inconsistencies: vec![],
        };
        let skill = self.commit(pending).await?;
        info!("User {} shared skill {} ('{}')", user.user_id, skill.id, skill.title);

        Ok(ShareOutcome {
            success: true,
            skill,
        })
    }

    // ── Download ───────────────────────────────────────────────────────────

    /// Copies a shared skill into the user's library.
    ///
    /// The remote service is tried first when the user has a token; any remote
    /// failure falls back to a local copy. Every copy is recorded under
    /// `user_skills_<uid>` and the download is counted in the ledger, the
    /// per-user index and `downloads_count`.
    ///
    /// A local copy is written in the same commit as the counters, so a
    /// rollback removes it. A remote plan outlives any rollback, so its record
    /// is written as soon as the plan exists. A user who already holds a copy
    /// gets it back, and whatever recording an earlier failed attempt left
    /// out is completed.
    pub async fn download_skill(
        &self,
        user: &UserContext,
        skill_id: &str,
    ) -> Result<DownloadOutcome, SocialError> {
        let source = {
            let skills = self.repo.load_shared_skills().await?;
            let index = find_skill(&skills.value, skill_id)?;
            skills.value[index].clone()
        };

        let recorded = self
            .repo
            .list_user_skills(&user.user_id)
            .await
            .into_iter()
            .find(|c| c.source_shared_skill_id == skill_id);
        let indexed = self
            .repo
            .list_downloaded_skill_ids(&user.user_id)
            .await
            .iter()
            .any(|id| id == skill_id);
        let already_downloaded = recorded.is_some() || indexed;

        let (copy, staged_copy) = match recorded {
            Some(copy) => (Some(copy), None),
            None if indexed => (None, None),
            None => match self.create_remote_copy(user, &source).await? {
                Some(copy) => (Some(copy), None),
                None => {
                    let copy = DownloadedSkill::copy_of(&source, None, CopyOrigin::Local);
                    (Some(copy.clone()), Some(copy))
                }
            },
        };

        // Re-read after the remote suspension point.
        let skills = self.repo.load_shared_skills().await?;
        let ledger = self.repo.load_ledger().await?;
        let downloads = self.repo.load_download_index().await?;
        let index = find_skill(&skills.value, skill_id)?;
        let previous = skills.value[index].counters.downloads_count;

        let mut after_skills = skills.value.clone();
        let mut after_ledger = ledger.value.clone();
        let mut after_downloads = downloads.value.clone();
        let applied = Interaction::Activate(InteractionKind::Download).apply(
            &user.user_id,
            skill_id,
            &mut after_ledger,
            &mut after_skills[index].counters,
        );
        let index_changed = insert_download(&mut after_downloads, &user.user_id, skill_id);
        let downloads_count = after_skills[index].counters.downloads_count;

        let fully_recorded = staged_copy.is_none()
            && !index_changed
            && after_ledger == ledger.value
            && downloads_count == previous;
        if fully_recorded {
            info!("User {} already downloaded {skill_id}", user.user_id);
            return Ok(DownloadOutcome {
                success: true,
                already_downloaded,
                skill: copy,
                downloads_count,
            });
        }
        if already_downloaded {
            info!(
                "Completing the recording of an earlier download of {skill_id} by {}",
                user.user_id
            );
        }

        let mut writes = Vec::new();
        if let Some(new_copy) = staged_copy {
            let copies = self.repo.load_user_skills(&user.user_id).await?;
            let mut after_copies = copies.value.clone();
            after_copies.push(new_copy);
            writes.push(StagedWrite::UserSkills {
                user_id: user.user_id.clone(),
                expected: copies.revision,
                before: copies.value,
                after: after_copies,
            });
        }
        writes.extend(skill_and_ledger_writes(skills, after_skills, ledger, after_ledger));
        if index_changed {
            writes.push(StagedWrite::Downloads {
                expected: downloads.revision,
                before: downloads.value,
                after: after_downloads,
            });
        }

        let pending = PendingUpdate {
            optimistic: downloads_count,
            previous: Some(previous),
            writes,
            inconsistencies: applied.inconsistencies,
        };
        self.commit(pending).await?;

        if let Some(copy) = &copy {
            info!(
                "User {} downloaded {skill_id} ({:?} copy {})",
                user.user_id, copy.origin, copy.id
            );
        }
        Ok(DownloadOutcome {
            success: true,
            already_downloaded,
            skill: copy,
            downloads_count,
        })
    }

    /// Creates a remote plan for a signed-in user and records it locally.
    /// `None` means the caller should fall back to a local copy.
    async fn create_remote_copy(
        &self,
        user: &UserContext,
        source: &SharedSkill,
    ) -> Result<Option<DownloadedSkill>, SocialError> {
        let Some(token) = user.auth_token.as_deref() else {
            return Ok(None);
        };
        let plan = match self
            .remote
            .create_skill_plan(&source.title, source.difficulty, token)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Remote plan creation failed for {} ({e}); storing local copy", source.id);
                return Ok(None);
            }
        };

        let copy = DownloadedSkill::copy_of(source, Some(plan.id), CopyOrigin::Remote);
        if let Err(e) = self.repo.add_user_skill(&user.user_id, &copy).await {
            error!("Remote plan {} for {} was created but not recorded: {e}", copy.id, source.id);
            return Err(e);
        }
        Ok(Some(copy))
    }

    /// Recorded copies plus, when the user has a token, their remote plans.
    pub async fn user_library(&self, user: &UserContext) -> UserLibrary {
        let copies = self.repo.list_user_skills(&user.user_id).await;
        let (remote, remote_error) = match user.auth_token.as_deref() {
            Some(token) => match self.remote.get_all_plans(token).await {
                Ok(list) => (list.skills, None),
                Err(e) => {
                    warn!("Listing remote plans for {} failed: {e}", user.user_id);
                    (vec![], Some(e.to_string()))
                }
            },
            None => (vec![], None),
        };
        UserLibrary {
            copies,
            remote,
            remote_error,
        }
    }

    // ── Comments ───────────────────────────────────────────────────────────

    pub async fn stage_comment(
        &self,
        user: &UserContext,
        skill_id: &str,
        text: &str,
    ) -> Result<PendingUpdate<Comment>, SocialError> {
        let text = validate_comment_text(text)?;

        let skills = self.repo.load_shared_skills().await?;
        let index = find_skill(&skills.value, skill_id)?;
        let mut ledger = self.repo.read_ledger().await;
        let thread = self.repo.load_comments(skill_id).await?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            skill_id: skill_id.to_string(),
            author: user.author_ref(),
            text,
            created_at: Utc::now(),
            likes_count: 0,
            user_has_liked: false,
            replies: vec![],
        };

        let mut after_thread = Vec::with_capacity(thread.value.len() + 1);
        after_thread.push(comment.clone());
        after_thread.extend(thread.value.iter().cloned());

        let mut after_skills = skills.value.clone();
        let applied = Interaction::CommentPosted.apply(
            &user.user_id,
            skill_id,
            &mut ledger,
            &mut after_skills[index].counters,
        );

        Ok(PendingUpdate {
            optimistic: comment,
            previous: None,
            writes: vec![
                StagedWrite::Comments {
                    skill_id: skill_id.to_string(),
                    expected: thread.revision,
                    before: thread.value,
                    after: after_thread,
                },
                StagedWrite::SharedSkills {
                    expected: skills.revision,
                    before: skills.value,
                    after: after_skills,
                },
            ],
            inconsistencies: applied.inconsistencies,
        })
    }

    pub async fn post_comment(
        &self,
        user: &UserContext,
        skill_id: &str,
        text: &str,
    ) -> Result<Comment, SocialError> {
        let pending = self.stage_comment(user, skill_id, text).await?;
        self.commit(pending).await
    }

    /// Replies attach to a top-level comment. Replying to a reply attaches to
    /// its parent so threads stay one level deep.
    pub async fn reply_to_comment(
        &self,
        user: &UserContext,
        comment_id: &str,
        text: &str,
    ) -> Result<Reply, SocialError> {
        let text = validate_comment_text(text)?;

        let (skill_id, thread) = self
            .repo
            .find_comment_thread(comment_id)
            .await?
            .ok_or_else(|| SocialError::NotFound(format!("Comment {comment_id} not found")))?;

        let mut after_thread = thread.value.clone();
        let parent = after_thread
            .iter_mut()
            .find(|c| c.contains(comment_id))
            .ok_or_else(|| SocialError::NotFound(format!("Comment {comment_id} not found")))?;

        let reply = Reply {
            id: Uuid::new_v4().to_string(),
            comment_id: parent.id.clone(),
            author: user.author_ref(),
            text,
            created_at: Utc::now(),
            likes_count: 0,
            user_has_liked: false,
        };
        parent.replies.push(reply.clone());

        let pending = PendingUpdate {
            optimistic: reply,
            previous: None,
            writes: vec![StagedWrite::Comments {
                skill_id,
                expected: thread.revision,
                before: thread.value,
                after: after_thread,
            }],
            inconsistencies: vec![],
        };
        self.commit(pending).await
    }

    /// Toggles the user's like on a comment or a reply.
    pub async fn toggle_comment_like(
        &self,
        user: &UserContext,
        comment_id: &str,
    ) -> Result<LikeState, SocialError> {
        let (skill_id, thread) = self
            .repo
            .find_comment_thread(comment_id)
            .await?
            .ok_or_else(|| SocialError::NotFound(format!("Comment {comment_id} not found")))?;
        let ledger = self.repo.load_ledger().await?;

        let was_liked = ledger
            .value
            .is_active(&user.user_id, comment_id, InteractionKind::Like);
        let mut after_thread = thread.value.clone();
        let mut after_ledger = ledger.value.clone();

        let likes = after_thread
            .iter_mut()
            .find_map(|c| c.likes_count_mut(comment_id))
            .ok_or_else(|| SocialError::NotFound(format!("Comment {comment_id} not found")))?;
        let previous_count = *likes;
        let applied = Interaction::Toggle(InteractionKind::Like).apply(
            &user.user_id,
            comment_id,
            &mut after_ledger,
            &mut LikeCounter(&mut *likes),
        );
        let likes_count = *likes;

        let pending = PendingUpdate {
            optimistic: LikeState {
                liked: applied.active,
                likes_count,
            },
            previous: Some(LikeState {
                liked: was_liked,
                likes_count: previous_count,
            }),
            writes: vec![
                StagedWrite::Comments {
                    skill_id,
                    expected: thread.revision,
                    before: thread.value,
                    after: after_thread,
                },
                StagedWrite::Ledger {
                    expected: ledger.revision,
                    before: ledger.value,
                    after: after_ledger,
                },
            ],
            inconsistencies: applied.inconsistencies,
        };
        self.commit(pending).await
    }

    // ── Maintenance ────────────────────────────────────────────────────────

    /// Raises every skill counter that sits below its ledger floor and
    /// persists the repair. Returns what was fixed.
    pub async fn reconcile_counters(&self) -> Result<Vec<Inconsistency>, SocialError> {
        let skills = self.repo.load_shared_skills().await?;
        let ledger = self.repo.read_ledger().await;

        let mut repaired = skills.value.clone();
        let issues = reconcile(&mut repaired, &ledger);
        if issues.is_empty() {
            return Ok(issues);
        }

        let pending = PendingUpdate {
            optimistic: (),
            previous: None,
            writes: vec![StagedWrite::SharedSkills {
                expected: skills.revision,
                before: skills.value,
                after: repaired,
            }],
            inconsistencies: vec![],
        };
        self.commit(pending).await?;
        info!("Reconciled {} counter(s)", issues.len());
        Ok(issues)
    }

    pub async fn clear_all_social_data(&self) -> Result<usize, SocialError> {
        self.repo.clear_all_social_data().await
    }
}

fn find_skill(skills: &[SharedSkill], skill_id: &str) -> Result<usize, SocialError> {
    skills
        .iter()
        .position(|s| s.id == skill_id)
        .ok_or_else(|| SocialError::NotFound(format!("Skill {skill_id} not found")))
}

/// Skills first, then the ledger. An unchanged ledger is not rewritten.
fn skill_and_ledger_writes(
    skills: Versioned<Vec<SharedSkill>>,
    after_skills: Vec<SharedSkill>,
    ledger: Versioned<InteractionLedger>,
    after_ledger: InteractionLedger,
) -> Vec<StagedWrite> {
    let mut writes = vec![StagedWrite::SharedSkills {
        expected: skills.revision,
        before: skills.value,
        after: after_skills,
    }];
    if after_ledger != ledger.value {
        writes.push(StagedWrite::Ledger {
            expected: ledger.revision,
            before: ledger.value,
            after: after_ledger,
        });
    }
    writes
}
