//! Fixed first-run feed content.
//!
//! Only `feed` may call `sample_skills`, and only on the read path. Nothing
//! here is ever handed to the repository.

use chrono::{DateTime, TimeZone, Utc};

use crate::models::skill::{DayPlan, Difficulty, EngagementCounters, SharedSkill, Visibility};

/// Bumped whenever the sample set changes. Part of every sample id.
pub const SAMPLE_SET_VERSION: u32 = 1;

const SAMPLE_AUTHOR_ID: &str = "sample-author";

struct SampleEntry {
    slug: &'static str,
    title: &'static str,
    description: &'static str,
    category: &'static str,
    difficulty: Difficulty,
    tags: &'static [&'static str],
    days: &'static [(&'static str, &'static [&'static str])],
    shared_on: (i32, u32, u32),
    likes: u64,
    downloads: u64,
}

const SAMPLES: &[SampleEntry] = &[
    SampleEntry {
        slug: "guitar-basics",
        title: "Guitar Basics in Two Weeks",
        description: "Open chords, strumming patterns and your first full song.",
        category: "Music",
        difficulty: Difficulty::Beginner,
        tags: &["guitar", "music", "chords"],
        days: &[
            ("Holding the guitar", &["Tune all six strings", "Practice posture for 10 minutes"]),
            ("First chords", &["Learn E minor and G", "Switch between them 20 times"]),
        ],
        shared_on: (2024, 3, 2),
        likes: 42,
        downloads: 18,
    },
    SampleEntry {
        slug: "sourdough",
        title: "Sourdough From Scratch",
        description: "Grow a starter and bake a crusty loaf by the end of the week.",
        category: "Cooking",
        difficulty: Difficulty::Intermediate,
        tags: &["baking", "bread", "fermentation"],
        days: &[
            ("Start the starter", &["Mix flour and water", "Pick a warm spot"]),
            ("Feed and observe", &["Discard half, feed", "Note the rise"]),
        ],
        shared_on: (2024, 2, 18),
        likes: 31,
        downloads: 25,
    },
    SampleEntry {
        slug: "rust-ownership",
        title: "Rust Ownership Deep Dive",
        description: "Borrowing, lifetimes and smart pointers through small exercises.",
        category: "Programming",
        difficulty: Difficulty::Advanced,
        tags: &["rust", "programming", "systems"],
        days: &[
            ("Moves and copies", &["Read the ownership chapter", "Fix five borrow errors"]),
            ("Lifetimes", &["Annotate a struct holding references"]),
        ],
        shared_on: (2024, 3, 9),
        likes: 57,
        downloads: 40,
    },
    SampleEntry {
        slug: "morning-yoga",
        title: "Morning Yoga Routine",
        description: "A gentle fifteen minute flow to build a daily habit.",
        category: "Fitness",
        difficulty: Difficulty::Beginner,
        tags: &["yoga", "habits", "wellness"],
        days: &[
            ("Sun salutation", &["Three slow rounds"]),
            ("Hip openers", &["Low lunge", "Pigeon pose"]),
        ],
        shared_on: (2024, 1, 27),
        likes: 23,
        downloads: 9,
    },
    SampleEntry {
        slug: "spanish-travel",
        title: "Spanish for Travelers",
        description: "Survival phrases for ordering food, asking directions and small talk.",
        category: "Languages",
        difficulty: Difficulty::Beginner,
        tags: &["spanish", "travel", "language"],
        days: &[
            ("Greetings", &["Memorize ten greetings", "Record yourself"]),
            ("At the restaurant", &["Order a full meal out loud"]),
        ],
        shared_on: (2024, 3, 5),
        likes: 19,
        downloads: 14,
    },
    SampleEntry {
        slug: "watercolor-landscapes",
        title: "Watercolor Landscapes",
        description: "Washes, layering and skies for loose landscape painting.",
        category: "Art",
        difficulty: Difficulty::Intermediate,
        tags: &["painting", "watercolor", "art"],
        days: &[
            ("Flat and graded washes", &["Paint six swatches"]),
            ("Skies", &["Wet-on-wet clouds"]),
        ],
        shared_on: (2024, 2, 11),
        likes: 28,
        downloads: 11,
    },
];

pub fn sample_skill_id(slug: &str) -> String {
    format!("sample-v{SAMPLE_SET_VERSION}-{slug}")
}

pub fn is_sample_id(id: &str) -> bool {
    id.starts_with("sample-v")
}

fn shared_at((year, month, day): (i32, u32, u32)) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

/// The versioned sample set, unordered.
pub fn sample_skills() -> Vec<SharedSkill> {
    SAMPLES
        .iter()
        .map(|entry| {
            let at = shared_at(entry.shared_on);
            SharedSkill {
                id: sample_skill_id(entry.slug),
                title: entry.title.to_string(),
                skill_description: entry.description.to_string(),
                personal_message: String::new(),
                category: entry.category.to_string(),
                difficulty: entry.difficulty,
                tags: entry.tags.iter().map(|t| t.to_string()).collect(),
                curriculum: entry
                    .days
                    .iter()
                    .enumerate()
                    .map(|(i, (title, tasks))| DayPlan {
                        day: i as u32 + 1,
                        title: title.to_string(),
                        description: String::new(),
                        tasks: tasks.iter().map(|t| t.to_string()).collect(),
                    })
                    .collect(),
                estimated_duration_days: entry.days.len() as u32,
                author_id: SAMPLE_AUTHOR_ID.to_string(),
                author_username: "skillshare".to_string(),
                author_display_name: "Skill Share Team".to_string(),
                created_at: at,
                shared_at: at,
                counters: EngagementCounters {
                    likes_count: entry.likes,
                    downloads_count: entry.downloads,
                    ..Default::default()
                },
                visibility: Visibility::Public,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sample_set_fits_one_default_page() {
        let samples = sample_skills();
        assert!(!samples.is_empty());
        assert!(samples.len() <= 20);
    }

    #[test]
    fn test_sample_ids_are_unique_and_versioned() {
        let samples = sample_skills();
        let ids: HashSet<_> = samples.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), samples.len());
        assert!(samples.iter().all(|s| is_sample_id(&s.id)));
        assert!(samples[0].id.contains(&format!("v{SAMPLE_SET_VERSION}")));
    }

    #[test]
    fn test_sample_set_is_deterministic() {
        assert_eq!(sample_skills(), sample_skills());
    }
}
