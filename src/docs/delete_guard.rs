//! Two-phase deletes. A client asks for an intent, waits out the
//! countdown, then presents the token with the `DELETE`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::error::DocsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteKind {
    Page,
    Book,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteTarget {
    pub tenant_id: Uuid,
    pub kind: DeleteKind,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteIntent {
    pub token: String,
    pub kind: DeleteKind,
    pub id: Uuid,
    pub countdown_seconds: u64,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeleteIntentError {
    #[error("unknown delete token")]
    Unknown,
    #[error("countdown still running, {0:?} left")]
    TooEarly(Duration),
    #[error("delete token expired")]
    Expired,
    #[error("delete token was issued for another item")]
    WrongTarget,
}

impl From<DeleteIntentError> for DocsError {
    fn from(e: DeleteIntentError) -> Self {
        DocsError::DeleteNotConfirmed(e.to_string())
    }
}

struct Pending {
    target: DeleteTarget,
    issued_at: Instant,
}

pub struct DeleteIntentRegistry {
    countdown: Duration,
    ttl: Duration,
    pending: Mutex<HashMap<String, Pending>>,
}

impl DeleteIntentRegistry {
    pub fn new(countdown: Duration, ttl: Duration) -> Self {
        Self {
            countdown,
            ttl: ttl.max(countdown),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn issue(&self, target: DeleteTarget) -> DeleteIntent {
        let now = Instant::now();
        let token = Uuid::new_v4().simple().to_string();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, p| now.duration_since(p.issued_at) <= self.ttl);
        pending.insert(
            token.clone(),
            Pending {
                target,
                issued_at: now,
            },
        );
        DeleteIntent {
            token,
            kind: target.kind,
            id: target.id,
            countdown_seconds: self.countdown.as_secs(),
            expires_in_seconds: self.ttl.as_secs(),
        }
    }

    /// Redeems a token. A token presented too early stays valid so the
    /// client can retry once the countdown has elapsed.
    pub async fn consume(&self, token: &str, target: DeleteTarget) -> Result<(), DeleteIntentError> {
        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        let entry = pending.get(token).ok_or(DeleteIntentError::Unknown)?;
        if entry.target != target {
            return Err(DeleteIntentError::WrongTarget);
        }
        let age = now.duration_since(entry.issued_at);
        if age > self.ttl {
            pending.remove(token);
            return Err(DeleteIntentError::Expired);
        }
        if age < self.countdown {
            return Err(DeleteIntentError::TooEarly(self.countdown - age));
        }
        pending.remove(token);
        Ok(())
    }
}

/// Client-side countdown gating the confirm button of a delete dialog.
#[derive(Debug, Clone)]
pub struct DeleteCountdown {
    duration: Duration,
    started: Option<Instant>,
}

impl DeleteCountdown {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
        }
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn reset(&mut self) {
        self.started = None;
    }

    pub fn remaining(&self) -> Duration {
        match self.started {
            Some(at) => self.duration.saturating_sub(at.elapsed()),
            None => self.duration,
        }
    }

    pub fn can_confirm(&self) -> bool {
        self.started.is_some() && self.remaining().is_zero()
    }
}

impl Default for DeleteCountdown {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn page(tenant_id: Uuid, id: Uuid) -> DeleteTarget {
        DeleteTarget {
            tenant_id,
            kind: DeleteKind::Page,
            id,
        }
    }

    fn registry() -> DeleteIntentRegistry {
        DeleteIntentRegistry::new(Duration::from_secs(5), Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_unlocks_after_countdown() {
        let reg = registry();
        let target = page(Uuid::new_v4(), Uuid::new_v4());
        let intent = reg.issue(target).await;
        assert_eq!(intent.countdown_seconds, 5);

        advance(Duration::from_secs(2)).await;
        assert!(matches!(
            reg.consume(&intent.token, target).await,
            Err(DeleteIntentError::TooEarly(_))
        ));

        advance(Duration::from_secs(3)).await;
        assert_eq!(reg.consume(&intent.token, target).await, Ok(()));
        assert_eq!(
            reg.consume(&intent.token, target).await,
            Err(DeleteIntentError::Unknown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_expires() {
        let reg = registry();
        let target = page(Uuid::new_v4(), Uuid::new_v4());
        let intent = reg.issue(target).await;
        advance(Duration::from_secs(301)).await;
        assert_eq!(
            reg.consume(&intent.token, target).await,
            Err(DeleteIntentError::Expired)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_bound_to_target_and_tenant() {
        let reg = registry();
        let tenant = Uuid::new_v4();
        let target = page(tenant, Uuid::new_v4());
        let intent = reg.issue(target).await;
        advance(Duration::from_secs(6)).await;

        let other_tenant = page(Uuid::new_v4(), target.id);
        assert_eq!(
            reg.consume(&intent.token, other_tenant).await,
            Err(DeleteIntentError::WrongTarget)
        );
        let as_book = DeleteTarget {
            kind: DeleteKind::Book,
            ..target
        };
        assert_eq!(
            reg.consume(&intent.token, as_book).await,
            Err(DeleteIntentError::WrongTarget)
        );
        assert_eq!(reg.consume(&intent.token, target).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_countdown() {
        let mut countdown = DeleteCountdown::default();
        assert!(!countdown.can_confirm());
        countdown.start();
        advance(Duration::from_millis(4900)).await;
        assert!(!countdown.can_confirm());
        advance(Duration::from_millis(100)).await;
        assert!(countdown.can_confirm());
        countdown.reset();
        assert!(!countdown.can_confirm());
        assert_eq!(countdown.remaining(), Duration::from_secs(5));
    }
}
