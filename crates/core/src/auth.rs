use crate::config::Settings;
use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Resolves a bearer token to a user. `Ok(None)` means the token was rejected.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, access_token: &str) -> anyhow::Result<Option<AuthenticatedUser>>;
}

/// Validates tokens against the hosted identity provider (`GET /auth/v1/user`).
#[derive(Debug, Clone)]
pub struct SupabaseAuthenticator {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuthenticator {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_supabase_url()?.to_string();
        let api_key = settings.require_supabase_service_role_key()?.to_string();
        let timeout_secs = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }
}

#[async_trait::async_trait]
impl Authenticator for SupabaseAuthenticator {
    async fn authenticate(&self, access_token: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("identity provider request failed")?;

        let status = res.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("identity provider returned status={status}: {body}");
        }

        let user = res
            .json::<UserResponse>()
            .await
            .context("failed to decode identity provider user")?;
        Ok(Some(AuthenticatedUser {
            id: user.id,
            email: user.email,
        }))
    }
}

/// Fixed token table, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticAuthenticator {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, token: impl Into<String>, user: AuthenticatedUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait::async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, access_token: &str) -> anyhow::Result<Option<AuthenticatedUser>> {
        Ok(self.users.get(access_token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_authenticator_rejects_unknown_tokens() {
        let user = AuthenticatedUser {
            id: Uuid::new_v4(),
            email: Some("a@example.com".to_string()),
        };
        let auth = StaticAuthenticator::new().with_user("good", user.clone());
        assert_eq!(auth.authenticate("good").await.unwrap(), Some(user));
        assert_eq!(auth.authenticate("bad").await.unwrap(), None);
    }

    #[test]
    fn decodes_identity_user_payload() {
        let raw = r#"{"id":"6f1c2a8e-3b9f-4c1a-9e55-0d7f9b1c2a3b","aud":"authenticated","email":"x@y.z"}"#;
        let user: UserResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(user.email.as_deref(), Some("x@y.z"));
    }
}
