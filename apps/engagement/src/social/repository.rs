//! Entity Repository: one JSON document per logical collection.
//!
//! Documents are written inside a `{schema_version, revision, data}` envelope.
//! Writes are compare-and-swap on the revision so a stale read-modify-write
//! fails loudly with `SocialError::Conflict` instead of losing an update.
//! Bare documents written before the envelope existed read as revision 0.
//!
//! Reads through the `list_*` methods never fail: a missing, corrupt or
//! unreadable document is an empty collection.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::comment::Comment;
use crate::models::skill::{DownloadedSkill, SharedSkill};
use crate::social::ledger::InteractionLedger;
use crate::social::SocialError;
use crate::storage::KeyValueStore;

pub const SHARED_SKILLS_KEY: &str = "shared_skills";
pub const INTERACTIONS_KEY: &str = "social_interactions";
pub const USER_DOWNLOADS_KEY: &str = "user_downloads";
pub const COMMENTS_PREFIX: &str = "comments_";
pub const USER_SKILLS_PREFIX: &str = "user_skills_";
pub const SCHEMA_VERSION: u32 = 1;

pub fn comments_key(skill_id: &str) -> String {
    format!("{COMMENTS_PREFIX}{skill_id}")
}

pub fn user_skills_key(user_id: &str) -> String {
    format!("{USER_SKILLS_PREFIX}{user_id}")
}

/// user id -> downloaded shared skill ids.
pub type DownloadIndex = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub revision: u64,
    pub value: T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    schema_version: u32,
    revision: u64,
    data: T,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    schema_version: u32,
    revision: u64,
    data: &'a T,
}

#[derive(Deserialize)]
struct Header {
    revision: u64,
}

pub struct Repository {
    store: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    // ── Generic document access ────────────────────────────────────────────

    pub async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<Versioned<T>, SocialError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(decode(key, &raw)),
            None => Ok(Versioned {
                revision: 0,
                value: T::default(),
            }),
        }
    }

    /// Like `load`, but storage errors also collapse to an empty value.
    async fn load_or_empty<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load(key).await {
            Ok(doc) => doc.value,
            Err(e) => {
                warn!("Reading '{key}' failed, treating as empty: {e}");
                T::default()
            }
        }
    }

    /// Compare-and-swap write. Returns the new revision.
    pub async fn compare_and_swap<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expected_revision: u64,
        value: &T,
    ) -> Result<u64, SocialError> {
        let _guard = self.write_lock.lock().await;

        let found = match self.store.get(key).await? {
            Some(raw) => stored_revision(&raw).unwrap_or(0),
            None => 0,
        };
        if found != expected_revision {
            warn!("CAS conflict on '{key}': expected revision {expected_revision}, found {found}");
            return Err(SocialError::Conflict {
                key: key.to_string(),
                expected: expected_revision,
                found,
            });
        }

        let revision = expected_revision + 1;
        let raw = serde_json::to_string(&EnvelopeRef {
            schema_version: SCHEMA_VERSION,
            revision,
            data: value,
        })?;
        self.store.set(key, raw).await?;
        debug!("Wrote '{key}' at revision {revision}");
        Ok(revision)
    }

    // ── Shared skills ──────────────────────────────────────────────────────

    pub async fn list_shared_skills(&self) -> Vec<SharedSkill> {
        self.load_or_empty(SHARED_SKILLS_KEY).await
    }

    pub async fn load_shared_skills(&self) -> Result<Versioned<Vec<SharedSkill>>, SocialError> {
        self.load(SHARED_SKILLS_KEY).await
    }

    pub async fn save_shared_skills(
        &self,
        all: &[SharedSkill],
        expected_revision: u64,
    ) -> Result<u64, SocialError> {
        self.compare_and_swap(SHARED_SKILLS_KEY, expected_revision, all)
            .await
    }

    // ── Comments ───────────────────────────────────────────────────────────

    pub async fn list_comments(&self, skill_id: &str) -> Vec<Comment> {
        self.load_or_empty(&comments_key(skill_id)).await
    }

    pub async fn load_comments(&self, skill_id: &str) -> Result<Versioned<Vec<Comment>>, SocialError> {
        self.load(&comments_key(skill_id)).await
    }

    pub async fn save_comments(
        &self,
        skill_id: &str,
        all: &[Comment],
        expected_revision: u64,
    ) -> Result<u64, SocialError> {
        self.compare_and_swap(&comments_key(skill_id), expected_revision, all)
            .await
    }

    /// Locates the thread holding a comment or reply with `id`.
    /// Returns the owning skill id and the whole thread.
    pub async fn find_comment_thread(
        &self,
        id: &str,
    ) -> Result<Option<(String, Versioned<Vec<Comment>>)>, SocialError> {
        for key in self.store.list_keys().await? {
            let Some(skill_id) = key.strip_prefix(COMMENTS_PREFIX) else {
                continue;
            };
            let thread: Versioned<Vec<Comment>> = self.load(&key).await?;
            if thread.value.iter().any(|c| c.contains(id)) {
                return Ok(Some((skill_id.to_string(), thread)));
            }
        }
        Ok(None)
    }

    // ── Interaction ledger ─────────────────────────────────────────────────

    pub async fn read_ledger(&self) -> InteractionLedger {
        self.load_or_empty(INTERACTIONS_KEY).await
    }

    pub async fn load_ledger(&self) -> Result<Versioned<InteractionLedger>, SocialError> {
        self.load(INTERACTIONS_KEY).await
    }

    pub async fn save_ledger(
        &self,
        ledger: &InteractionLedger,
        expected_revision: u64,
    ) -> Result<u64, SocialError> {
        self.compare_and_swap(INTERACTIONS_KEY, expected_revision, ledger)
            .await
    }

    // ── Downloads ──────────────────────────────────────────────────────────

    pub async fn list_downloaded_skill_ids(&self, user_id: &str) -> Vec<String> {
        let index: DownloadIndex = self.load_or_empty(USER_DOWNLOADS_KEY).await;
        index.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn load_download_index(&self) -> Result<Versioned<DownloadIndex>, SocialError> {
        self.load(USER_DOWNLOADS_KEY).await
    }

    pub async fn save_download_index(
        &self,
        index: &DownloadIndex,
        expected_revision: u64,
    ) -> Result<u64, SocialError> {
        self.compare_and_swap(USER_DOWNLOADS_KEY, expected_revision, index)
            .await
    }

    /// Records `skill_id` as downloaded by `user_id`. Already-present ids are a
    /// no-op. Returns whether the index changed.
    pub async fn record_download(&self, user_id: &str, skill_id: &str) -> Result<bool, SocialError> {
        let mut index = self.load_download_index().await?;
        if !insert_download(&mut index.value, user_id, skill_id) {
            return Ok(false);
        }
        self.save_download_index(&index.value, index.revision).await?;
        Ok(true)
    }

    pub async fn list_user_skills(&self, user_id: &str) -> Vec<DownloadedSkill> {
        self.load_or_empty(&user_skills_key(user_id)).await
    }

    pub async fn load_user_skills(
        &self,
        user_id: &str,
    ) -> Result<Versioned<Vec<DownloadedSkill>>, SocialError> {
        self.load(&user_skills_key(user_id)).await
    }

    pub async fn save_user_skills(
        &self,
        user_id: &str,
        skills: &[DownloadedSkill],
        expected_revision: u64,
    ) -> Result<u64, SocialError> {
        self.compare_and_swap(&user_skills_key(user_id), expected_revision, skills)
            .await
    }

    pub async fn add_user_skill(&self, user_id: &str, skill: &DownloadedSkill) -> Result<(), SocialError> {
        let mut skills = self.load_user_skills(user_id).await?;
        skills.value.push(skill.clone());
        self.save_user_skills(user_id, &skills.value, skills.revision)
            .await?;
        Ok(())
    }

    // ── Bulk reset ─────────────────────────────────────────────────────────

    /// Removes every social document. Private downloaded copies are kept.
    pub async fn clear_all_social_data(&self) -> Result<usize, SocialError> {
        let _guard = self.write_lock.lock().await;

        let mut keys: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(COMMENTS_PREFIX))
            .collect();
        keys.extend(
            [SHARED_SKILLS_KEY, INTERACTIONS_KEY, USER_DOWNLOADS_KEY]
                .iter()
                .map(|k| k.to_string()),
        );

        self.store.remove(&keys).await?;
        info!("Cleared social data ({} keys)", keys.len());
        Ok(keys.len())
    }
}

/// Adds `skill_id` to the user's download list. Returns false if already present.
pub fn insert_download(index: &mut DownloadIndex, user_id: &str, skill_id: &str) -> bool {
    let ids = index.entry(user_id.to_string()).or_default();
    if ids.iter().any(|id| id == skill_id) {
        return false;
    }
    ids.push(skill_id.to_string());
    true
}

fn stored_revision(raw: &str) -> Option<u64> {
    serde_json::from_str::<Header>(raw).ok().map(|h| h.revision)
}

fn decode<T: DeserializeOwned + Default>(key: &str, raw: &str) -> Versioned<T> {
    if let Ok(envelope) = serde_json::from_str::<Envelope<T>>(raw) {
        return Versioned {
            revision: envelope.revision,
            value: envelope.data,
        };
    }

    let revision = stored_revision(raw);
    if revision.is_none() {
        if let Ok(value) = serde_json::from_str::<T>(raw) {
            return Versioned { revision: 0, value };
        }
    }

    warn!("Document '{key}' is corrupt, treating as empty");
    Versioned {
        // Keep the stored revision so the next write can replace the document.
        revision: revision.unwrap_or(0),
        value: T::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::samples::sample_skills;
    use crate::storage::testing::FlakyStore;
    use crate::storage::MemoryStore;

    fn repo_with(store: MemoryStore) -> Repository {
        Repository::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_missing_documents_read_as_empty() {
        let repo = repo_with(MemoryStore::new());
        assert!(repo.list_shared_skills().await.is_empty());
        assert!(repo.list_comments("s1").await.is_empty());
        assert!(repo.list_downloaded_skill_ids("u1").await.is_empty());
        assert_eq!(repo.load_ledger().await.unwrap().revision, 0);
    }

    #[tokio::test]
    async fn test_corrupt_document_reads_as_empty() {
        let store = MemoryStore::new();
        store
            .set(SHARED_SKILLS_KEY, "{not json".to_string())
            .await
            .unwrap();
        let repo = repo_with(store);

        assert!(repo.list_shared_skills().await.is_empty());
        // A corrupt document is overwritable from revision 0.
        repo.save_shared_skills(&[], 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreadable_storage_lists_empty() {
        let store = FlakyStore::new();
        store.fail_reads(true);
        let repo = Repository::new(Arc::new(store));
        assert!(repo.list_shared_skills().await.is_empty());
        assert!(repo.load_shared_skills().await.is_err());
    }

    #[tokio::test]
    async fn test_legacy_bare_array_reads_as_revision_zero() {
        let store = MemoryStore::new();
        let skills = sample_skills();
        store
            .set(SHARED_SKILLS_KEY, serde_json::to_string(&skills).unwrap())
            .await
            .unwrap();
        let repo = repo_with(store);

        let doc = repo.load_shared_skills().await.unwrap();
        assert_eq!(doc.revision, 0);
        assert_eq!(doc.value.len(), skills.len());
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_revision() {
        let repo = repo_with(MemoryStore::new());
        let skills = sample_skills();

        assert_eq!(repo.save_shared_skills(&skills, 0).await.unwrap(), 1);
        let err = repo.save_shared_skills(&[], 0).await.unwrap_err();
        assert!(matches!(err, SocialError::Conflict { expected: 0, found: 1, .. }));
        assert!(err.is_retryable());

        assert_eq!(repo.list_shared_skills().await.len(), skills.len());
    }

    #[tokio::test]
    async fn test_envelope_carries_schema_version() {
        let store = MemoryStore::new();
        let repo = repo_with(store.clone());
        repo.save_ledger(&InteractionLedger::default(), 0)
            .await
            .unwrap();

        let raw = store.get(INTERACTIONS_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["revision"], 1);
    }

    #[tokio::test]
    async fn test_record_download_is_idempotent() {
        let repo = repo_with(MemoryStore::new());
        assert!(repo.record_download("u1", "s1").await.unwrap());
        assert!(!repo.record_download("u1", "s1").await.unwrap());
        assert_eq!(repo.list_downloaded_skill_ids("u1").await, vec!["s1"]);
    }

    #[tokio::test]
    async fn test_clear_all_social_data_keeps_private_copies() {
        let store = MemoryStore::new();
        let repo = repo_with(store.clone());
        let skill = &sample_skills()[0];

        repo.save_shared_skills(std::slice::from_ref(skill), 0)
            .await
            .unwrap();
        repo.save_comments(&skill.id, &[], 0).await.unwrap();
        repo.add_user_skill(
            "u1",
            &DownloadedSkill::copy_of(skill, None, crate::models::skill::CopyOrigin::Local),
        )
        .await
        .unwrap();

        repo.clear_all_social_data().await.unwrap();

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys, vec![user_skills_key("u1")]);
    }

    #[tokio::test]
    async fn test_find_comment_thread_by_reply_id() {
        use crate::models::comment::{AuthorRef, Reply};
        use chrono::Utc;

        let repo = repo_with(MemoryStore::new());
        let author = AuthorRef {
            id: "u1".into(),
            username: "ada".into(),
            display_name: "Ada".into(),
        };
        let comment = Comment {
            id: "c1".into(),
            skill_id: "s9".into(),
            author: author.clone(),
            text: "hi".into(),
            created_at: Utc::now(),
            likes_count: 0,
            user_has_liked: false,
            replies: vec![Reply {
                id: "r1".into(),
                comment_id: "c1".into(),
                author,
                text: "hey".into(),
                created_at: Utc::now(),
                likes_count: 0,
                user_has_liked: false,
            }],
        };
        repo.save_comments("s9", &[comment], 0).await.unwrap();

        let (skill_id, thread) = repo.find_comment_thread("r1").await.unwrap().unwrap();
        assert_eq!(skill_id, "s9");
        assert_eq!(thread.revision, 1);
        assert!(repo.find_comment_thread("nope").await.unwrap().is_none());
    }
}
