// Authentication contract
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoginOutcome {
    pub fn accepted(user: User) -> Self {
        Self {
            success: true,
            user: Some(user),
            error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            user: None,
            error: Some(reason.into()),
        }
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, identifier: &str, secret: &str) -> anyhow::Result<LoginOutcome>;
    async fn logout(&self) -> anyhow::Result<()>;
    /// Session restored from a previous run, if any.
    async fn restore(&self) -> anyhow::Result<Option<User>>;
}
