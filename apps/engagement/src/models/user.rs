use serde::{Deserialize, Serialize};

use crate::models::comment::AuthorRef;

/// The acting user. Passed explicitly into every store call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    /// Absent in anonymous/local-only mode. Not an error.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl UserContext {
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            username: user_id.clone(),
            display_name: user_id.clone(),
            user_id,
            auth_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            id: self.user_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
        }
    }
}
