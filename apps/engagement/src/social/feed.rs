//! Feed Assembler: read-only views over the repository.
//!
//! Per-user flags are computed from the ledger at read time and never stored.
//! When nothing has been shared yet, page 1 of an unfiltered feed is filled
//! with the fixed sample set. Samples never reach the repository.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::comment::Comment;
use crate::models::skill::{Difficulty, SharedSkill};
use crate::social::interaction::VoteType;
use crate::social::ledger::{InteractionKind, InteractionLedger};
use crate::social::repository::Repository;
use crate::social::samples::{is_sample_id, sample_skills};
use crate::social::SocialError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrdering {
    #[default]
    Recency,
    Trending,
    Discover,
}

impl FeedOrdering {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "recency" | "recent" => Some(FeedOrdering::Recency),
            "trending" => Some(FeedOrdering::Trending),
            "discover" => Some(FeedOrdering::Discover),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedFilters {
    pub category: Option<String>,
    /// Kept as text: an unknown value matches nothing instead of failing.
    pub difficulty: Option<String>,
    pub search: Option<String>,
}

impl FeedFilters {
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.difficulty.is_none() && self.search.is_none()
    }

    /// Category and difficulty match case-insensitively. Search is a case-insensitive
    /// substring over title and description; tags are not searched.
    pub fn matches(&self, skill: &SharedSkill) -> bool {
        if let Some(category) = &self.category {
            if !skill.category.eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }
        if let Some(difficulty) = &self.difficulty {
            if Difficulty::parse(difficulty) != Some(skill.difficulty) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if needle.is_empty() {
                return true;
            }
            let hit = skill.title.to_lowercase().contains(&needle)
                || skill.skill_description.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    pub ordering: FeedOrdering,
    pub filters: FeedFilters,
    /// 1-based. Values below 1 are read as 1.
    pub page: i64,
    /// Values of 0 or below use the configured default.
    pub limit: i64,
}

/// A shared skill as seen by one user.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub skill: SharedSkill,
    pub user_has_liked: bool,
    pub user_has_downloaded: bool,
    pub user_has_saved: bool,
    pub user_vote: Option<VoteType>,
    pub is_sample: bool,
}

impl FeedItem {
    fn project(skill: SharedSkill, ledger: &InteractionLedger, user_id: &str) -> Self {
        let flag = |kind| ledger.is_active(user_id, &skill.id, kind);
        let item_flags = (
            flag(InteractionKind::Like),
            flag(InteractionKind::Download),
            flag(InteractionKind::Save),
        );
        let user_vote = VoteType::current(ledger, user_id, &skill.id);
        let is_sample = is_sample_id(&skill.id);
        Self {
            skill,
            user_has_liked: item_flags.0,
            user_has_downloaded: item_flags.1,
            user_has_saved: item_flags.2,
            user_vote,
            is_sample,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub total_count: usize,
    pub has_more: bool,
    pub page: u32,
    pub limit: u32,
    /// True when `items` is the sample set rather than stored content.
    pub is_sample: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub skill_id: String,
    pub comments: Vec<Comment>,
    pub total_count: usize,
    pub has_more: bool,
    pub page: u32,
    pub limit: u32,
}

pub struct FeedAssembler {
    repo: Arc<Repository>,
    default_page_size: u32,
    max_page_size: u32,
}

impl FeedAssembler {
    pub fn new(repo: Arc<Repository>, default_page_size: u32, max_page_size: u32) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            repo,
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    fn normalize(&self, page: i64, limit: i64) -> (u32, u32) {
        let page = page.clamp(1, u32::MAX as i64) as u32;
        let limit = if limit <= 0 {
            self.default_page_size
        } else {
            limit.min(self.max_page_size as i64) as u32
        };
        (page, limit)
    }

    pub async fn get_feed(&self, user_id: &str, query: &FeedQuery) -> FeedPage {
        let (page, limit) = self.normalize(query.page, query.limit);
        let stored = self.repo.list_shared_skills().await;

        let use_samples = stored.is_empty() && page == 1 && query.filters.is_empty();
        let (pool, ledger) = if use_samples {
            (sample_skills(), InteractionLedger::default())
        } else {
            (stored, self.repo.read_ledger().await)
        };

        let mut matching: Vec<SharedSkill> = pool
            .into_iter()
            .filter(|s| query.filters.matches(s))
            .collect();
        sort_skills(&mut matching, query.ordering);

        let total_count = matching.len();
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let items: Vec<FeedItem> = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .map(|s| FeedItem::project(s, &ledger, user_id))
            .collect();

        debug!(
            "Feed {:?} page {page} limit {limit}: {} of {total_count} (sample: {use_samples})",
            query.ordering,
            items.len()
        );

        FeedPage {
            has_more: items.len() == limit as usize,
            items,
            total_count,
            page,
            limit,
            is_sample: use_samples,
        }
    }

    /// Looks up one skill. Sample ids resolve against the sample set.
    pub async fn get_skill(&self, user_id: &str, skill_id: &str) -> Result<FeedItem, SocialError> {
        if is_sample_id(skill_id) {
            return sample_skills()
                .into_iter()
                .find(|s| s.id == skill_id)
                .map(|s| FeedItem::project(s, &InteractionLedger::default(), user_id))
                .ok_or_else(|| SocialError::NotFound(format!("Skill {skill_id} not found")));
        }

        let skill = self
            .repo
            .list_shared_skills()
            .await
            .into_iter()
            .find(|s| s.id == skill_id)
            .ok_or_else(|| SocialError::NotFound(format!("Skill {skill_id} not found")))?;
        let ledger = self.repo.read_ledger().await;
        Ok(FeedItem::project(skill, &ledger, user_id))
    }

    /// Everything `author_id` has shared, newest first.
    pub async fn skills_by_author(&self, user_id: &str, author_id: &str) -> Vec<FeedItem> {
        let mut skills: Vec<SharedSkill> = self
            .repo
            .list_shared_skills()
            .await
            .into_iter()
            .filter(|s| s.author_id == author_id)
            .collect();
        sort_skills(&mut skills, FeedOrdering::Recency);

        let ledger = self.repo.read_ledger().await;
        skills
            .into_iter()
            .map(|s| FeedItem::project(s, &ledger, user_id))
            .collect()
    }

    /// Comment thread, newest first, with the caller's like flags filled in.
    /// Replies keep their posting order.
    pub async fn get_comments(&self, user_id: &str, skill_id: &str, page: i64, limit: i64) -> CommentPage {
        let (page, limit) = self.normalize(page, limit);
        let mut all = self.repo.list_comments(skill_id).await;
        let ledger = self.repo.read_ledger().await;

        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total_count = all.len();
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let mut comments: Vec<Comment> = all.into_iter().skip(offset).take(limit as usize).collect();

        for comment in &mut comments {
            comment.user_has_liked = ledger.is_active(user_id, &comment.id, InteractionKind::Like);
            for reply in &mut comment.replies {
                reply.user_has_liked = ledger.is_active(user_id, &reply.id, InteractionKind::Like);
            }
        }

        CommentPage {
            skill_id: skill_id.to_string(),
            has_more: comments.len() == limit as usize,
            comments,
            total_count,
            page,
            limit,
        }
    }

    pub async fn has_downloaded(&self, user_id: &str, skill_id: &str) -> bool {
        self.repo
            .list_downloaded_skill_ids(user_id)
            .await
            .iter()
            .any(|id| id == skill_id)
    }
}

/// Deterministic ordering; ties always break on id.
pub fn sort_skills(skills: &mut [SharedSkill], ordering: FeedOrdering) {
    match ordering {
        FeedOrdering::Recency => skills.sort_by(|a, b| by_recency(a, b)),
        FeedOrdering::Trending | FeedOrdering::Discover => skills.sort_by(|a, b| {
            b.popularity()
                .cmp(&a.popularity())
                .then_with(|| by_recency(a, b))
        }),
    }
}

fn by_recency(a: &SharedSkill, b: &SharedSkill) -> Ordering {
    b.shared_at.cmp(&a.shared_at).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::skill::{Difficulty, EngagementCounters, Visibility};
    use crate::storage::{KeyValueStore, MemoryStore};
    use chrono::{Duration, TimeZone, Utc};

    fn skill(id: &str, minutes: i64, likes: u64, category: &str) -> SharedSkill {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes);
        SharedSkill {
            id: id.to_string(),
            title: format!("Skill {id}"),
            skill_description: "practice daily".to_string(),
            personal_message: String::new(),
            category: category.to_string(),
            difficulty: Difficulty::Beginner,
            tags: ["habit".to_string()].into_iter().collect(),
            curriculum: vec![],
            estimated_duration_days: 7,
            author_id: format!("author-{}", minutes % 2),
            author_username: "author".to_string(),
            author_display_name: "Author".to_string(),
            created_at: at,
            shared_at: at,
            counters: EngagementCounters {
                likes_count: likes,
                ..Default::default()
            },
            visibility: Visibility::Public,
        }
    }

    async fn assembler_with(skills: &[SharedSkill]) -> (FeedAssembler, Arc<Repository>, MemoryStore) {
        let store = MemoryStore::new();
        let repo = Arc::new(Repository::new(Arc::new(store.clone())));
        if !skills.is_empty() {
            repo.save_shared_skills(skills, 0).await.unwrap();
        }
        (FeedAssembler::new(repo.clone(), 20, 100), repo, store)
    }

    fn query(ordering: FeedOrdering, page: i64, limit: i64) -> FeedQuery {
        FeedQuery {
            ordering,
            filters: FeedFilters::default(),
            page,
            limit,
        }
    }

    #[tokio::test]
    async fn test_empty_store_serves_samples_without_persisting() {
        let (feed, _, store) = assembler_with(&[]).await;

        let page = feed.get_feed("u1", &query(FeedOrdering::Recency, 1, 0)).await;
        assert!(page.is_sample);
        assert_eq!(page.items.len(), sample_skills().len());
        assert!(page.items.iter().all(|i| i.is_sample && !i.user_has_liked));
        assert!(!page.has_more);

        assert!(store.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_samples_only_on_unfiltered_first_page() {
        let (feed, _, _) = assembler_with(&[]).await;

        let second = feed.get_feed("u1", &query(FeedOrdering::Recency, 2, 0)).await;
        assert!(second.items.is_empty());
        assert!(!second.is_sample);

        let mut filtered = query(FeedOrdering::Recency, 1, 0);
        filtered.filters.category = Some("Music".into());
        let page = feed.get_feed("u1", &filtered).await;
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_recency_pages_are_stable_and_disjoint() {
        let skills: Vec<_> = (0..5).map(|i| skill(&format!("s{i}"), i, 0, "Music")).collect();
        let (feed, _, _) = assembler_with(&skills).await;

        let first = feed.get_feed("u1", &query(FeedOrdering::Recency, 1, 2)).await;
        let second = feed.get_feed("u1", &query(FeedOrdering::Recency, 2, 2)).await;
        let third = feed.get_feed("u1", &query(FeedOrdering::Recency, 3, 2)).await;

        let ids = |p: &FeedPage| p.items.iter().map(|i| i.skill.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), vec!["s4", "s3"]);
        assert_eq!(ids(&second), vec!["s2", "s1"]);
        assert_eq!(ids(&third), vec!["s0"]);
        assert!(first.has_more);
        assert!(!third.has_more);
        assert_eq!(first.total_count, 5);
        assert!(!first.is_sample);
    }

    #[tokio::test]
    async fn test_popularity_ties_page_by_id() {
        // Same likes and same shared_at: only the id breaks the tie.
        let at = skill("x", 0, 3, "Music").shared_at;
        let skills: Vec<_> = ["e", "b", "d", "a", "c"]
            .iter()
            .map(|id| {
                let mut s = skill(id, 0, 3, "Music");
                s.shared_at = at;
                s
            })
            .collect();
        let (feed, _, _) = assembler_with(&skills).await;

        for ordering in [FeedOrdering::Trending, FeedOrdering::Discover] {
            let mut paged = Vec::new();
            for page in 1..=3 {
                let items = feed.get_feed("u1", &query(ordering, page, 2)).await.items;
                paged.extend(items.into_iter().map(|i| i.skill.id));
            }
            let whole: Vec<_> = feed
                .get_feed("u1", &query(ordering, 1, 10))
                .await
                .items
                .into_iter()
                .map(|i| i.skill.id)
                .collect();

            assert_eq!(paged, vec!["a", "b", "c", "d", "e"]);
            assert_eq!(paged, whole);
        }
    }

    #[tokio::test]
    async fn test_trending_orders_by_popularity_then_recency() {
        let skills = vec![
            skill("a", 0, 5, "Music"),
            skill("b", 1, 9, "Music"),
            skill("c", 2, 5, "Music"),
        ];
        let (feed, _, _) = assembler_with(&skills).await;

        let page = feed.get_feed("u1", &query(FeedOrdering::Trending, 1, 10)).await;
        let ids: Vec<_> = page.items.iter().map(|i| i.skill.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_page_and_limit_are_normalized() {
        let skills: Vec<_> = (0..3).map(|i| skill(&format!("s{i}"), i, 0, "Music")).collect();
        let (feed, _, _) = assembler_with(&skills).await;

        let page = feed.get_feed("u1", &query(FeedOrdering::Recency, -4, -1)).await;
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 20);
        assert_eq!(page.items.len(), 3);

        let clamped = feed.get_feed("u1", &query(FeedOrdering::Recency, 1, 10_000)).await;
        assert_eq!(clamped.limit, 100);
    }

    #[tokio::test]
    async fn test_filters_category_difficulty_and_search() {
        let mut advanced = skill("adv", 3, 0, "Cooking");
        advanced.difficulty = Difficulty::Advanced;
        advanced.title = "Knife Skills".into();
        let skills = vec![skill("m1", 0, 0, "Music"), skill("m2", 1, 0, "music"), advanced];
        let (feed, _, _) = assembler_with(&skills).await;

        let mut q = query(FeedOrdering::Recency, 1, 0);
        q.filters.category = Some("MUSIC".into());
        assert_eq!(feed.get_feed("u1", &q).await.total_count, 2);

        q.filters = FeedFilters {
            difficulty: Some("ADVANCED".into()),
            ..Default::default()
        };
        assert_eq!(feed.get_feed("u1", &q).await.items[0].skill.id, "adv");

        q.filters = FeedFilters {
            difficulty: Some("expert".into()),
            ..Default::default()
        };
        assert!(feed.get_feed("u1", &q).await.items.is_empty());

        q.filters = FeedFilters {
            search: Some("knife".into()),
            ..Default::default()
        };
        assert_eq!(feed.get_feed("u1", &q).await.total_count, 1);

        q.filters = FeedFilters {
            search: Some("DAILY".into()),
            ..Default::default()
        };
        assert_eq!(feed.get_feed("u1", &q).await.total_count, 3);

        // Every skill is tagged "habit", but tags are not searched.
        q.filters = FeedFilters {
            search: Some("habit".into()),
            ..Default::default()
        };
        assert_eq!(feed.get_feed("u1", &q).await.total_count, 0);

        q.filters = FeedFilters {
            category: Some("Underwater Basketry".into()),
            ..Default::default()
        };
        let none = feed.get_feed("u1", &q).await;
        assert!(none.items.is_empty());
        assert!(!none.is_sample);
    }

    #[tokio::test]
    async fn test_user_flags_come_from_ledger() {
        let skills = vec![skill("s1", 0, 1, "Music")];
        let (feed, repo, _) = assembler_with(&skills).await;

        let mut ledger = InteractionLedger::default();
        ledger.set("u1", "s1", InteractionKind::Like, true);
        ledger.set("u1", "s1", InteractionKind::Upvote, true);
        repo.save_ledger(&ledger, 0).await.unwrap();

        let mine = feed.get_skill("u1", "s1").await.unwrap();
        assert!(mine.user_has_liked);
        assert_eq!(mine.user_vote, Some(VoteType::Up));

        let theirs = feed.get_skill("u2", "s1").await.unwrap();
        assert!(!theirs.user_has_liked);
        assert_eq!(theirs.user_vote, None);
    }

    #[tokio::test]
    async fn test_reads_do_not_write() {
        let skills = vec![skill("s1", 0, 1, "Music")];
        let (feed, _, store) = assembler_with(&skills).await;
        let before = store.list_keys().await.unwrap();

        feed.get_feed("u1", &query(FeedOrdering::Discover, 1, 0)).await;
        feed.get_skill("u1", "s1").await.unwrap();
        feed.get_comments("u1", "s1", 1, 0).await;
        feed.skills_by_author("u1", "author-0").await;
        feed.has_downloaded("u1", "s1").await;

        assert_eq!(store.list_keys().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_get_skill_resolves_samples_and_missing() {
        let (feed, _, _) = assembler_with(&[]).await;
        let sample_id = sample_skills()[0].id.clone();

        assert!(feed.get_skill("u1", &sample_id).await.unwrap().is_sample);
        assert!(matches!(
            feed.get_skill("u1", "nope").await,
            Err(SocialError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_skills_by_author_newest_first() {
        let skills: Vec<_> = (0..4).map(|i| skill(&format!("s{i}"), i, 0, "Music")).collect();
        let (feed, _, _) = assembler_with(&skills).await;

        let ids: Vec<_> = feed
            .skills_by_author("u1", "author-1")
            .await
            .into_iter()
            .map(|i| i.skill.id)
            .collect();
        assert_eq!(ids, vec!["s3", "s1"]);
    }
}
