//! Process-wide session cache keyed by user hash key.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::ids::HashKey;
use crate::store::{CompanyId, TeamId};

/// Fields recognized by the cache contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheField {
    HashKey,
    RoleId,
    LoginType,
    CompanyId,
    TeamId,
    ApplicantHashKey,
    Code,
    S3Name,
    OauthRefreshToken,
}

impl CacheField {
    pub const fn as_str(self) -> &'static str {
        match self {
            CacheField::HashKey => "hash_key",
            CacheField::RoleId => "role_id",
            CacheField::LoginType => "login_type",
            CacheField::CompanyId => "company_id",
            CacheField::TeamId => "team_id",
            CacheField::ApplicantHashKey => "applicant_hash_key",
            CacheField::Code => "code",
            CacheField::S3Name => "s3_name",
            CacheField::OauthRefreshToken => "oauth_refresh_token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache field {field} holds a malformed value")]
    Malformed { field: &'static str },
    #[error("cache field {field} is not set for this session")]
    Missing { field: &'static str },
}

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, user: &str, field: CacheField) -> Result<Option<String>, CacheError>;
    async fn set(&self, user: &str, field: CacheField, value: String) -> Result<(), CacheError>;
    async fn delete(&self, user: &str) -> Result<(), CacheError>;
}

/// In-memory cache with per-entry expiry. Writes are last-writer-wins.
#[derive(Debug)]
pub struct MemorySessionCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, CacheField), (String, DateTime<Utc>)>>,
}

impl MemorySessionCache {
    pub fn new(ttl_hours: u32) -> Self {
        Self {
            ttl: Duration::hours(i64::from(ttl_hours)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn lock(
        &self,
    ) -> Result<
        std::sync::MutexGuard<'_, HashMap<(String, CacheField), (String, DateTime<Utc>)>>,
        CacheError,
    > {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache mutex poisoned".to_string()))
    }

    /// Writes an entry expiring at an explicit instant.
    pub fn set_until(
        &self,
        user: &str,
        field: CacheField,
        value: String,
        expires_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        self.lock()?
            .insert((user.to_string(), field), (value, expires_at));
        Ok(())
    }
}

impl Default for MemorySessionCache {
    fn default() -> Self {
        Self::new(24)
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn get(&self, user: &str, field: CacheField) -> Result<Option<String>, CacheError> {
        let now = self.now();
        let mut entries = self.lock()?;
        let key = (user.to_string(), field);
        match entries.get(&key) {
            Some((_, expires_at)) if *expires_at <= now => {
                entries.remove(&key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, user: &str, field: CacheField, value: String) -> Result<(), CacheError> {
        let expires_at = self.now() + self.ttl;
        self.set_until(user, field, value, expires_at)
    }

    async fn delete(&self, user: &str) -> Result<(), CacheError> {
        self.lock()?.retain(|(owner, _), _| owner != user);
        Ok(())
    }
}

/// Narrow per-request context resolved from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_hash_key: HashKey,
    pub company_id: CompanyId,
    pub team_id: Option<TeamId>,
    pub role_id: Option<u64>,
    pub applicant_hash_key: Option<HashKey>,
}

impl SessionContext {
    pub async fn resolve<C>(cache: &C, user: &str) -> Result<Self, CacheError>
    where
        C: SessionCache + ?Sized,
    {
        let company_id = numeric(cache, user, CacheField::CompanyId)
            .await?
            .ok_or(CacheError::Missing {
                field: CacheField::CompanyId.as_str(),
            })?;
        let team_id = numeric(cache, user, CacheField::TeamId).await?;
        let role_id = numeric(cache, user, CacheField::RoleId).await?;
        let applicant_hash_key = cache
            .get(user, CacheField::ApplicantHashKey)
            .await?
            .map(HashKey);

        Ok(Self {
            user_hash_key: HashKey(user.to_string()),
            company_id: CompanyId(company_id),
            team_id: team_id.map(TeamId),
            role_id,
            applicant_hash_key,
        })
    }

    /// Seeds the cache with a session for the given identity.
    pub async fn store<C>(&self, cache: &C) -> Result<(), CacheError>
    where
        C: SessionCache + ?Sized,
    {
        let user = self.user_hash_key.as_str();
        cache
            .set(user, CacheField::HashKey, user.to_string())
            .await?;
        cache
            .set(user, CacheField::CompanyId, self.company_id.0.to_string())
            .await?;
        if let Some(team_id) = self.team_id {
            cache
                .set(user, CacheField::TeamId, team_id.0.to_string())
                .await?;
        }
        if let Some(role_id) = self.role_id {
            cache
                .set(user, CacheField::RoleId, role_id.to_string())
                .await?;
        }
        if let Some(applicant) = &self.applicant_hash_key {
            cache
                .set(user, CacheField::ApplicantHashKey, applicant.0.clone())
                .await?;
        }
        Ok(())
    }
}

async fn numeric<C>(cache: &C, user: &str, field: CacheField) -> Result<Option<u64>, CacheError>
where
    C: SessionCache + ?Sized,
{
    match cache.get(user, field).await? {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| CacheError::Malformed {
                field: field.as_str(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let cache = MemorySessionCache::new(24);
        cache
            .set_until(
                "user_a",
                CacheField::CompanyId,
                "7".to_string(),
                Utc::now() - Duration::seconds(1),
            )
            .expect("write");
        assert_eq!(
            cache
                .get("user_a", CacheField::CompanyId)
                .await
                .expect("read"),
            None
        );
    }

    #[tokio::test]
    async fn resolves_session_context() {
        let cache = MemorySessionCache::default();
        let context = SessionContext {
            user_hash_key: HashKey::from("user_abc"),
            company_id: CompanyId(3),
            team_id: Some(TeamId(9)),
            role_id: Some(1),
            applicant_hash_key: None,
        };
        context.store(&cache).await.expect("seed");

        let resolved = SessionContext::resolve(&cache, "user_abc")
            .await
            .expect("resolves");
        assert_eq!(resolved, context);
    }

    #[tokio::test]
    async fn rejects_non_numeric_ids() {
        let cache = MemorySessionCache::default();
        cache
            .set("user_x", CacheField::CompanyId, "acme".to_string())
            .await
            .expect("write");
        assert!(matches!(
            SessionContext::resolve(&cache, "user_x").await,
            Err(CacheError::Malformed { field: "company_id" })
        ));
    }

    #[tokio::test]
    async fn missing_company_is_reported() {
        let cache = MemorySessionCache::default();
        assert!(matches!(
            SessionContext::resolve(&cache, "nobody").await,
            Err(CacheError::Missing { .. })
        ));
    }
}
