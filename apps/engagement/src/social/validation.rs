use crate::models::skill::ShareSkillRequest;
use crate::social::SocialError;

pub const MAX_COMMENT_CHARS: usize = 280;
pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

/// Validates comment or reply text. Returns the trimmed text.
pub fn validate_comment_text(text: &str) -> Result<String, SocialError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SocialError::Validation("Comment text is empty".into()));
    }
    let len = trimmed.chars().count();
    if len > MAX_COMMENT_CHARS {
        return Err(SocialError::Validation(format!(
            "Comment is {len} characters, limit is {MAX_COMMENT_CHARS}"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_share(req: &ShareSkillRequest) -> Result<(), SocialError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(SocialError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(SocialError::Validation(format!(
            "Title exceeds {MAX_TITLE_CHARS} characters"
        )));
    }
    if req.skill_description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(SocialError::Validation(format!(
            "Description exceeds {MAX_DESCRIPTION_CHARS} characters"
        )));
    }
    if req.category.trim().is_empty() {
        return Err(SocialError::Validation("Category is required".into()));
    }
    Ok(())
}
