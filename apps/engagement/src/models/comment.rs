use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author snapshot taken at post time. Not a live join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorRef {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reply {
    pub id: String,
    pub comment_id: String,
    pub author: AuthorRef,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes_count: u64,
    /// Per-viewer flag, filled on read. Never meaningful in storage.
    #[serde(default)]
    pub user_has_liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: String,
    pub skill_id: String,
    pub author: AuthorRef,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub user_has_liked: bool,
    /// Oldest first. Replies never nest.
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Comment {
    /// Finds the like counter of this comment or one of its replies by id.
    pub fn likes_count_mut(&mut self, id: &str) -> Option<&mut u64> {
        if self.id == id {
            return Some(&mut self.likes_count);
        }
        self.replies
            .iter_mut()
            .find(|r| r.id == id)
            .map(|r| &mut r.likes_count)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id == id || self.replies.iter().any(|r| r.id == id)
    }
}
