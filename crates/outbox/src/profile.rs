//! Read-only access to verified destinations and consent flags.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use draftbell_common::error::AppError;
use draftbell_common::types::UserProfile;

/// User profile lookups consumed by the resolver.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The user's account email, only if it has been verified.
    async fn verified_email(&self, user_id: Uuid) -> Result<Option<String>, AppError>;

    /// Phone and consent snapshot, `None` when the user never saved settings.
    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError>;
}

/// Postgres-backed profile store reading `users` and `user_notification_settings`.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn verified_email(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        let email: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT email FROM users
            WHERE id = $1
              AND email_verified = true
              AND email IS NOT NULL
              AND email <> ''
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(email.map(|(email,)| email))
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let profile: Option<UserProfile> = sqlx::query_as(
            r#"
            SELECT phone_e164, phone_verified, consent_sms, opted_out_sms,
                   consent_voice, opted_out_voice
            FROM user_notification_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}

/// In-memory profile store for tests and local development.
#[derive(Default)]
pub struct MemoryProfileStore {
    emails: RwLock<HashMap<Uuid, String>>,
    profiles: RwLock<HashMap<Uuid, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_verified_email(&self, user_id: Uuid, email: impl Into<String>) {
        self.emails.write().await.insert(user_id, email.into());
    }

    pub async fn set_profile(&self, user_id: Uuid, profile: UserProfile) {
        self.profiles.write().await.insert(user_id, profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn verified_email(&self, user_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.emails.read().await.get(&user_id).cloned())
    }

    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }
}
