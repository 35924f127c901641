use std::{collections::HashMap, sync::Arc, time::Duration};

use metrics::gauge;
use thiserror::Error;
use tokio::{
    sync::RwLock,
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, info};
use ulid::Ulid;

use store_setup_api::StoreApi;

use crate::form::FormSession;

/// Open form sessions, keyed by the id handed to the page.
#[derive(Clone)]
pub struct FormRegistry {
    sessions: Arc<RwLock<HashMap<Ulid, Arc<FormSession>>>>,
    api: Arc<dyn StoreApi>,
    debounce: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("malformed form id '{0}'")]
    InvalidId(String),
    #[error("form {0} not found")]
    NotFound(Ulid),
}

impl FormRegistry {
    pub fn new(api: Arc<dyn StoreApi>, debounce: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            api,
            debounce,
        }
    }

    pub async fn open(&self) -> (Ulid, Arc<FormSession>) {
        let id = Ulid::new();
        let session = Arc::new(FormSession::new(self.api.clone(), self.debounce));
        let mut guard = self.sessions.write().await;
        guard.insert(id, session.clone());
        gauge!("form_sessions_active").set(guard.len() as f64);
        debug!(stage = "form", form_id = %id, "form session opened");
        (id, session)
    }

    pub async fn get(&self, raw_id: &str) -> Result<Arc<FormSession>, RegistryError> {
        let id = parse_id(raw_id)?;
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    pub async fn close(&self, raw_id: &str) -> Result<(), RegistryError> {
        let id = parse_id(raw_id)?;
        let mut guard = self.sessions.write().await;
        let removed = guard.remove(&id);
        gauge!("form_sessions_active").set(guard.len() as f64);
        match removed {
            Some(_) => {
                debug!(stage = "form", form_id = %id, "form session closed");
                Ok(())
            }
            None => Err(RegistryError::NotFound(id)),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions untouched for longer than `ttl` that have no open
    /// event stream. Returns how many were removed.
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut guard = self.sessions.write().await;
        let before = guard.len();
        guard.retain(|_, session| {
            session.subscriber_count() > 0
                || now.saturating_duration_since(session.touched_at()) <= ttl
        });
        let removed = before - guard.len();
        gauge!("form_sessions_active").set(guard.len() as f64);
        removed
    }

    /// Runs [`FormRegistry::sweep_idle`] on a fixed cadence in the background.
    pub fn spawn_sweeper(&self, ttl: Duration, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = registry.sweep_idle(ttl).await;
                if removed > 0 {
                    info!(stage = "sweeper", removed, "dropped idle form sessions");
                }
            }
        })
    }
}

fn parse_id(raw: &str) -> Result<Ulid, RegistryError> {
    Ulid::from_string(raw).map_err(|_| RegistryError::InvalidId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::testing::FakeStoreApi;
    use store_setup_core::DraftPatch;
    use tokio::time::sleep;

    fn registry() -> FormRegistry {
        FormRegistry::new(Arc::new(FakeStoreApi::new()), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn open_then_get_returns_same_session() {
        let registry = registry();
        let (id, session) = registry.open().await;

        let found = registry.get(&id.to_string()).await.expect("session exists");
        assert!(Arc::ptr_eq(&session, &found));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn rejects_unknown_and_malformed_ids() {
        let registry = registry();

        let missing = Ulid::new();
        let err = registry.get(&missing.to_string()).await.err();
        assert_eq!(err, Some(RegistryError::NotFound(missing)));

        let err = registry.get("not-a-ulid").await.err();
        assert_eq!(err, Some(RegistryError::InvalidId("not-a-ulid".into())));
    }

    #[tokio::test]
    async fn close_removes_session() {
        let registry = registry();
        let (id, _) = registry.open().await;

        registry.close(&id.to_string()).await.expect("close");
        assert_eq!(registry.len().await, 0);
        assert!(matches!(
            registry.close(&id.to_string()).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_idle_sessions() {
        let registry = registry();
        let (idle, _) = registry.open().await;
        let (active, active_session) = registry.open().await;
        let (watched, watched_session) = registry.open().await;
        let _stream = watched_session.subscribe();
        drop(watched_session);

        sleep(Duration::from_secs(50)).await;
        active_session.apply(DraftPatch {
            name: Some("Corner Shop".into()),
            ..DraftPatch::default()
        });
        drop(active_session);
        sleep(Duration::from_secs(20)).await;

        let removed = registry.sweep_idle(Duration::from_secs(60)).await;
        assert_eq!(removed, 1);
        assert!(registry.get(&idle.to_string()).await.is_err());
        assert!(registry.get(&active.to_string()).await.is_ok());
        assert!(registry.get(&watched.to_string()).await.is_ok());
    }
}
