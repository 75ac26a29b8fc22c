//! Remote Skill Service: the authoritative store of a user's skill plans.
//!
//! The engagement store only consumes two calls: create a plan (used as the
//! preferred download path) and list plans. Everything goes through the
//! `SkillService` trait so tests and local-only deployments can swap it out.
//!
//! A missing auth token is a normal anonymous state and never reaches this
//! module; callers skip the remote path instead.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::skill::Difficulty;

const MAX_RETRIES: u32 = 2;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Remote skill service is not configured")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillPlan {
    pub id: String,
    pub title: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanList {
    #[serde(default)]
    pub skills: Vec<SkillPlan>,
}

#[derive(Debug, Serialize)]
struct CreatePlanRequest<'a> {
    title: &'a str,
    difficulty: Difficulty,
}

#[async_trait]
pub trait SkillService: Send + Sync {
    async fn create_skill_plan(
        &self,
        title: &str,
        difficulty: Difficulty,
        auth_token: &str,
    ) -> Result<SkillPlan, RemoteError>;

    async fn get_all_plans(&self, auth_token: &str) -> Result<PlanList, RemoteError>;
}

/// Stand-in used when no `SKILL_SERVICE_URL` is configured.
pub struct DisabledSkillService;

#[async_trait]
impl SkillService for DisabledSkillService {
    async fn create_skill_plan(
        &self,
        _title: &str,
        _difficulty: Difficulty,
        _auth_token: &str,
    ) -> Result<SkillPlan, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn get_all_plans(&self, _auth_token: &str) -> Result<PlanList, RemoteError> {
        Err(RemoteError::Disabled)
    }
}

/// reqwest-backed client for the plans API.
#[derive(Clone)]
pub struct HttpSkillService {
    client: Client,
    base_url: String,
}

impl HttpSkillService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn plans_url(&self) -> String {
        format!("{}/plans", self.base_url)
    }

    /// Sends a request built by `build`, retrying 5xx/429 and transport errors
    /// with backoff (250ms, 500ms). Other statuses fail immediately.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, RemoteError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error: Option<RemoteError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "Skill service attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(RemoteError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(RemoteError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(RemoteError::Unauthorized);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }
            return Ok(response);
        }

        Err(last_error.unwrap_or(RemoteError::Api {
            status: 503,
            message: "retries exhausted".to_string(),
        }))
    }
}

#[async_trait]
impl SkillService for HttpSkillService {
    async fn create_skill_plan(
        &self,
        title: &str,
        difficulty: Difficulty,
        auth_token: &str,
    ) -> Result<SkillPlan, RemoteError> {
        let url = self.plans_url();
        let body = CreatePlanRequest { title, difficulty };
        let response = self
            .send(|| self.client.post(&url).bearer_auth(auth_token).json(&body))
            .await?;
        let plan: SkillPlan = response.json().await?;
        debug!("Remote plan {} created for '{}'", plan.id, plan.title);
        Ok(plan)
    }

    async fn get_all_plans(&self, auth_token: &str) -> Result<PlanList, RemoteError> {
        let url = self.plans_url();
        let response = self
            .send(|| self.client.get(&url).bearer_auth(auth_token))
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Scripted service: either succeeds with generated plan ids or fails every call.
    #[derive(Clone, Default)]
    pub struct ScriptedSkillService {
        pub fail: bool,
        pub create_calls: Arc<AtomicUsize>,
        pub plans: Vec<SkillPlan>,
    }

    impl ScriptedSkillService {
        pub fn succeeding() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SkillService for ScriptedSkillService {
        async fn create_skill_plan(
            &self,
            title: &str,
            difficulty: Difficulty,
            _auth_token: &str,
        ) -> Result<SkillPlan, RemoteError> {
            let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RemoteError::Api {
                    status: 503,
                    message: "scripted failure".into(),
                });
            }
            Ok(SkillPlan {
                id: format!("plan-{n}"),
                title: title.to_string(),
                difficulty,
                created_at: None,
            })
        }

        async fn get_all_plans(&self, _auth_token: &str) -> Result<PlanList, RemoteError> {
            if self.fail {
                return Err(RemoteError::Unauthorized);
            }
            Ok(PlanList {
                skills: self.plans.clone(),
            })
        }
    }
}
