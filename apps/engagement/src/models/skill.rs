use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Case-insensitive parse. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

/// Only `public` exists today. Reserved for future extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayPlan {
    pub day: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<String>,
}

/// Names one denormalized counter on a `SharedSkill`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Likes,
    Downloads,
    Comments,
    Views,
    Upvotes,
    Downvotes,
    Saves,
}

/// Aggregate counters. Mutated only through `social::interaction`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngagementCounters {
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub downloads_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub views_count: u64,
    #[serde(default)]
    pub upvotes: u64,
    #[serde(default)]
    pub downvotes: u64,
    #[serde(default)]
    pub save_count: u64,
}

impl EngagementCounters {
    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Likes => self.likes_count,
            Counter::Downloads => self.downloads_count,
            Counter::Comments => self.comments_count,
            Counter::Views => self.views_count,
            Counter::Upvotes => self.upvotes,
            Counter::Downvotes => self.downvotes,
            Counter::Saves => self.save_count,
        }
    }

    pub fn get_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Likes => &mut self.likes_count,
            Counter::Downloads => &mut self.downloads_count,
            Counter::Comments => &mut self.comments_count,
            Counter::Views => &mut self.views_count,
            Counter::Upvotes => &mut self.upvotes,
            Counter::Downvotes => &mut self.downvotes,
            Counter::Saves => &mut self.save_count,
        }
    }
}

/// A skill plan published to the public feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharedSkill {
    pub id: String,
    pub title: String,
    pub skill_description: String,
    #[serde(default)]
    pub personal_message: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub curriculum: Vec<DayPlan>,
    pub estimated_duration_days: u32,
    pub author_id: String,
    pub author_username: String,
    pub author_display_name: String,
    pub created_at: DateTime<Utc>,
    pub shared_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counters: EngagementCounters,
    #[serde(default)]
    pub visibility: Visibility,
}

impl SharedSkill {
    /// Feed trending/discover score.
    pub fn popularity(&self) -> u64 {
        self.counters.downloads_count + self.counters.likes_count
    }
}

/// Payload of a share action.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareSkillRequest {
    pub title: String,
    pub skill_description: String,
    #[serde(default)]
    pub personal_message: Option<String>,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub curriculum: Vec<DayPlan>,
    #[serde(default)]
    pub estimated_duration_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CopyOrigin {
    Remote,
    Local,
}

/// A user's private copy of a shared skill. Independent of the source after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadedSkill {
    pub id: String,
    /// Non-owning back-reference, used only for "already downloaded" checks.
    pub source_shared_skill_id: String,
    pub title: String,
    pub skill_description: String,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub curriculum: Vec<DayPlan>,
    pub estimated_duration_days: u32,
    #[serde(default)]
    pub progress_percent: u8,
    #[serde(default = "first_day")]
    pub current_day: u32,
    #[serde(default)]
    pub is_completed: bool,
    pub origin: CopyOrigin,
    pub downloaded_at: DateTime<Utc>,
}

fn first_day() -> u32 {
    1
}

impl DownloadedSkill {
    /// Builds a fresh copy of `source`. `id` is the remote plan id when the
    /// remote service created it, otherwise `None` generates a local id.
    pub fn copy_of(source: &SharedSkill, id: Option<String>, origin: CopyOrigin) -> Self {
        Self {
            id: id.unwrap_or_else(|| format!("local-{}", Uuid::new_v4())),
            source_shared_skill_id: source.id.clone(),
            title: source.title.clone(),
            skill_description: source.skill_description.clone(),
            category: source.category.clone(),
            difficulty: source.difficulty,
            curriculum: source.curriculum.clone(),
            estimated_duration_days: source.estimated_duration_days,
            progress_percent: 0,
            current_day: first_day(),
            is_completed: false,
            origin,
            downloaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_difficulty_parse_is_case_insensitive() {
        assert_eq!(Difficulty::parse("Beginner"), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::parse(" ADVANCED "), Some(Difficulty::Advanced));
        assert_eq!(Difficulty::parse("expert"), None);
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let skill: SharedSkill = serde_json::from_value(json!({
            "id": "s1",
            "title": "Sourdough",
            "skill_description": "Bake bread",
            "category": "Cooking",
            "difficulty": "beginner",
            "estimated_duration_days": 7,
            "author_id": "u1",
            "author_username": "baker",
            "author_display_name": "Baker",
            "created_at": "2024-01-01T00:00:00Z",
            "shared_at": "2024-01-01T00:00:00Z",
            "likes_count": 3
        }))
        .unwrap();

        assert_eq!(skill.counters.likes_count, 3);
        assert_eq!(skill.counters.downloads_count, 0);
        assert_eq!(skill.visibility, Visibility::Public);
        assert!(skill.tags.is_empty());
    }

    #[test]
    fn test_counters_serialize_flat() {
        let mut counters = EngagementCounters::default();
        *counters.get_mut(Counter::Upvotes) = 2;
        let value = serde_json::to_value(&counters).unwrap();
        assert_eq!(value["upvotes"], 2);
        assert_eq!(counters.get(Counter::Upvotes), 2);
    }
}
