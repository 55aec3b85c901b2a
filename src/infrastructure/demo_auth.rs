// Demo account authentication
use crate::application::auth::{AuthService, LoginOutcome, User};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

pub const DEMO_EMAIL: &str = "admin@gmail.com";
pub const DEMO_PASSWORD: &str = "admin123";

pub fn demo_user() -> User {
    User {
        id: "admin-user-1".to_string(),
        email: DEMO_EMAIL.to_string(),
        name: "Admin".to_string(),
        role: "Admin".to_string(),
    }
}

/// Accepts only the demo account. The session optionally survives restarts
/// in a JSON file.
pub struct DemoAuth {
    session: Mutex<Option<User>>,
    session_path: Option<PathBuf>,
}

impl DemoAuth {
    pub fn new(session_path: Option<PathBuf>) -> Self {
        Self {
            session: Mutex::new(None),
            session_path,
        }
    }

    async fn write_session(&self, user: Option<&User>) -> anyhow::Result<()> {
        let Some(path) = &self.session_path else {
            return Ok(());
        };
        match user {
            Some(user) => {
                let json = serde_json::to_vec(user)?;
                tokio::fs::write(path, json)
                    .await
                    .with_context(|| format!("Failed to write session to {}", path.display()))
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("Failed to clear session {}", path.display())),
            },
        }
    }
}

#[async_trait]
impl AuthService for DemoAuth {
    async fn login(&self, identifier: &str, secret: &str) -> anyhow::Result<LoginOutcome> {
        if !identifier.trim().eq_ignore_ascii_case(DEMO_EMAIL) || secret != DEMO_PASSWORD {
            tracing::warn!("Rejected login for '{}'", identifier);
            return Ok(LoginOutcome::rejected("Invalid email or password"));
        }

        let user = demo_user();
        self.write_session(Some(&user)).await?;
        *self.session.lock().await = Some(user.clone());
        tracing::info!("User {} logged in", user.email);
        Ok(LoginOutcome::accepted(user))
    }

    async fn logout(&self) -> anyhow::Result<()> {
        *self.session.lock().await = None;
        self.write_session(None).await
    }

    async fn restore(&self) -> anyhow::Result<Option<User>> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(session.clone());
        }
        let Some(path) = &self.session_path else {
            return Ok(None);
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read session {}", path.display())),
        };
        match serde_json::from_slice::<User>(&bytes) {
            Ok(user) => {
                *session = Some(user.clone());
                Ok(Some(user))
            }
            Err(e) => {
                tracing::warn!("Discarding unreadable session {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }
}
