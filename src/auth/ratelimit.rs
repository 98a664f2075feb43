use axum::http::HeaderMap;

use crate::cache::CounterStore;
use crate::response::ApiError;

pub const LOGIN_WINDOW_SECS: u64 = 300;
pub const LOGIN_MAX_ATTEMPTS: i64 = 5;

pub const RESET_COOLDOWN_SECS: u64 = 60;
pub const RESET_HOURLY_WINDOW_SECS: u64 = 3600;
pub const RESET_HOURLY_MAX: i64 = 10;

/// Best-effort client IP from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Failed-login throttle keyed by (source IP, identifier).
pub struct LoginThrottle<'a> {
    store: &'a dyn CounterStore,
}

impl<'a> LoginThrottle<'a> {
    pub fn new(store: &'a dyn CounterStore) -> Self {
        Self { store }
    }

    fn key(ip: &str, identifier: &str) -> String {
        format!("login:{ip}:{identifier}")
    }

    /// Reject once the failure counter has reached the limit. A missing
    /// counter reads as zero.
    pub async fn check(&self, ip: &str, identifier: &str) -> Result<(), ApiError> {
        let attempts = self
            .store
            .get(&Self::key(ip, identifier))
            .await
            .map_err(ApiError::Internal)?
            .unwrap_or(0);
        if attempts >= LOGIN_MAX_ATTEMPTS {
            tracing::warn!(ip = %ip, identifier = %identifier, "login attempts over limit");
            return Err(ApiError::RateLimited(
                "Too many failed login attempts. Please try again later.".into(),
            ));
        }
        Ok(())
    }

    /// Count one failed credential check. The first failure opens the window;
    /// later failures ride the existing TTL.
    pub async fn record_failure(&self, ip: &str, identifier: &str) -> anyhow::Result<()> {
        let key = Self::key(ip, identifier);
        if self.store.get(&key).await?.is_none() {
            self.store.set_with_ttl(&key, 0, LOGIN_WINDOW_SECS).await?;
        }
        self.store.incr(&key).await?;
        Ok(())
    }

    /// Successful authentication resets the counter.
    pub async fn clear(&self, ip: &str, identifier: &str) -> anyhow::Result<()> {
        self.store.delete(&Self::key(ip, identifier)).await
    }
}

/// Password-reset throttle: a short cooldown plus an hourly cap, both keyed
/// by identifier alone and written whether or not the account exists.
pub struct ResetThrottle<'a> {
    store: &'a dyn CounterStore,
}

impl<'a> ResetThrottle<'a> {
    pub fn new(store: &'a dyn CounterStore) -> Self {
        Self { store }
    }

    fn cooldown_key(identifier: &str) -> String {
        format!("pwreset:cooldown:{identifier}")
    }

    fn hourly_key(identifier: &str) -> String {
        format!("pwreset:hourly:{identifier}")
    }

    pub async fn check(&self, identifier: &str) -> Result<(), ApiError> {
        if self
            .store
            .get(&Self::cooldown_key(identifier))
            .await
            .map_err(ApiError::Internal)?
            .is_some()
        {
            return Err(ApiError::RateLimited(
                "Please wait before requesting another reset code.".into(),
            ));
        }

        let hourly = self
            .store
            .get(&Self::hourly_key(identifier))
            .await
            .map_err(ApiError::Internal)?
            .unwrap_or(0);
        if hourly >= RESET_HOURLY_MAX {
            tracing::warn!(identifier = %identifier, "password reset hourly cap reached");
            return Err(ApiError::RateLimited(
                "Too many reset requests. Please try again later.".into(),
            ));
        }
        Ok(())
    }

    pub async fn record(&self, identifier: &str) -> anyhow::Result<()> {
        self.store
            .set_with_ttl(&Self::cooldown_key(identifier), 1, RESET_COOLDOWN_SECS)
            .await?;

        let hourly_key = Self::hourly_key(identifier);
        if self.store.get(&hourly_key).await?.is_none() {
            self.store
                .set_with_ttl(&hourly_key, 0, RESET_HOURLY_WINDOW_SECS)
                .await?;
        }
        self.store.incr(&hourly_key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCounterStore;
    use crate::response::ApiError;

    #[tokio::test]
    async fn login_allows_first_attempt() {
        let store = InMemoryCounterStore::new();
        let throttle = LoginThrottle::new(&store);
        assert!(throttle.check("1.2.3.4", "a@b.com").await.is_ok());
    }

    #[tokio::test]
    async fn login_blocks_sixth_attempt() {
        let store = InMemoryCounterStore::new();
        let throttle = LoginThrottle::new(&store);

        for _ in 0..5 {
            throttle.check("1.2.3.4", "a@b.com").await.unwrap();
            throttle.record_failure("1.2.3.4", "a@b.com").await.unwrap();
        }

        let err = throttle.check("1.2.3.4", "a@b.com").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[tokio::test]
    async fn login_counters_are_scoped_per_ip_and_identifier() {
        let store = InMemoryCounterStore::new();
        let throttle = LoginThrottle::new(&store);

        for _ in 0..5 {
            throttle.record_failure("1.2.3.4", "a@b.com").await.unwrap();
        }

        assert!(throttle.check("5.6.7.8", "a@b.com").await.is_ok());
        assert!(throttle.check("1.2.3.4", "other@b.com").await.is_ok());
    }

    #[tokio::test]
    async fn login_success_resets_counter() {
        let store = InMemoryCounterStore::new();
        let throttle = LoginThrottle::new(&store);

        for _ in 0..5 {
            throttle.record_failure("1.2.3.4", "a@b.com").await.unwrap();
        }
        assert!(throttle.check("1.2.3.4", "a@b.com").await.is_err());

        throttle.clear("1.2.3.4", "a@b.com").await.unwrap();
        assert!(throttle.check("1.2.3.4", "a@b.com").await.is_ok());
    }

    #[tokio::test]
    async fn reset_cooldown_blocks_immediate_retry() {
        let store = InMemoryCounterStore::new();
        let throttle = ResetThrottle::new(&store);

        throttle.check("a@b.com").await.unwrap();
        throttle.record("a@b.com").await.unwrap();

        let err = throttle.check("a@b.com").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[tokio::test]
    async fn reset_hourly_cap_blocks_eleventh_request() {
        let store = InMemoryCounterStore::new();
        let throttle = ResetThrottle::new(&store);

        for _ in 0..10 {
            throttle.record("a@b.com").await.unwrap();
            // drop the cooldown so only the hourly counter is in play
            store.delete("pwreset:cooldown:a@b.com").await.unwrap();
        }

        let err = throttle.check("a@b.com").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(_)));
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.8.7.6, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "1.1.1.1".parse().unwrap());
        assert_eq!(client_ip(&headers), "9.8.7.6");
    }

    #[test]
    fn client_ip_falls_back_to_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
