//! Per-(container, provider) session registry

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::session::{AiSession, DEFAULT_HISTORY_WINDOW};
use super::AiProvider;
use crate::errors::SessionError;
use crate::utils::lock_mutex_recover;

/// Shared handle to a session; the async lock serializes calls on one conversation
pub type SessionHandle = Arc<tokio::sync::Mutex<AiSession>>;

type SessionKey = (String, String);

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionKey, SessionHandle>,
    /// Working directory recorded per container, shared by all its providers
    work_dirs: HashMap<String, PathBuf>,
}

pub struct AiSessionRegistry {
    providers: HashMap<String, Arc<dyn AiProvider>>,
    history_window: usize,
    state: Mutex<RegistryState>,
}

impl AiSessionRegistry {
    pub fn new(providers: Vec<Arc<dyn AiProvider>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
            history_window: DEFAULT_HISTORY_WINDOW,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_history_window(mut self, exchanges: usize) -> Self {
        self.history_window = exchanges;
        self
    }

    /// Registered provider names, sorted
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Session for `(container_id, provider)`, created on first use.
    ///
    /// A supplied `work_dir` is recorded for the container and applied to the
    /// returned session whether it is new or existing.
    pub async fn get_or_create(
        &self,
        container_id: &str,
        provider: &str,
        work_dir: Option<&Path>,
    ) -> Result<SessionHandle, SessionError> {
        let backend = self
            .providers
            .get(provider)
            .cloned()
            .ok_or_else(|| SessionError::UnknownProvider {
                name: provider.to_string(),
                available: self.provider_names(),
            })?;

        let (handle, created, container_dir) = {
            let mut state = lock_mutex_recover(&self.state);
            if let Some(dir) = work_dir {
                state
                    .work_dirs
                    .insert(container_id.to_string(), dir.to_path_buf());
            }
            let container_dir = state.work_dirs.get(container_id).cloned();

            let key = (container_id.to_string(), provider.to_string());
            let mut created = false;
            let handle = state
                .sessions
                .entry(key)
                .or_insert_with(|| {
                    created = true;
                    let mut session = AiSession::new(backend, self.history_window);
                    if let Some(dir) = &container_dir {
                        session.set_work_dir(dir.clone());
                    }
                    Arc::new(tokio::sync::Mutex::new(session))
                })
                .clone();
            (handle, created, container_dir)
        };

        if created {
            log::info!(
                "[Sessions] Created {} session for container {}",
                provider,
                container_id
            );
        } else if let (Some(dir), Some(_)) = (container_dir, work_dir) {
            handle.lock().await.set_work_dir(dir);
        }

        Ok(handle)
    }

    /// Drop one (container, provider) session. Returns whether it existed.
    pub fn clear_one(&self, container_id: &str, provider: &str) -> bool {
        let key = (container_id.to_string(), provider.to_string());
        lock_mutex_recover(&self.state).sessions.remove(&key).is_some()
    }

    /// Drop every session for a container. Returns the number removed.
    pub fn clear_all(&self, container_id: &str) -> usize {
        let mut state = lock_mutex_recover(&self.state);
        let before = state.sessions.len();
        state.sessions.retain(|(container, _), _| container != container_id);
        state.work_dirs.remove(container_id);
        before - state.sessions.len()
    }

    /// Drop all sessions for all containers
    pub fn clear_everything(&self) {
        let mut state = lock_mutex_recover(&self.state);
        let count = state.sessions.len();
        state.sessions.clear();
        state.work_dirs.clear();
        log::info!("[Sessions] Cleared {} sessions", count);
    }

    pub fn work_dir_for(&self, container_id: &str) -> Option<PathBuf> {
        lock_mutex_recover(&self.state)
            .work_dirs
            .get(container_id)
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        lock_mutex_recover(&self.state).sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::session::tests::EchoProvider;

    fn registry() -> AiSessionRegistry {
        AiSessionRegistry::new(vec![EchoProvider::new("local"), EchoProvider::new("gemini")])
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_session() {
        let registry = registry();
        let a = registry.get_or_create("c1", "local", None).await.unwrap();
        a.lock().await.respond("hi").await.unwrap();

        let b = registry.get_or_create("c1", "local", None).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.lock().await.history().len(), 2);
    }

    #[tokio::test]
    async fn test_sessions_isolated_per_key() {
        let registry = registry();
        let local = registry.get_or_create("c1", "local", None).await.unwrap();
        let gemini = registry.get_or_create("c1", "gemini", None).await.unwrap();
        let other = registry.get_or_create("c2", "local", None).await.unwrap();

        local.lock().await.respond("hi").await.unwrap();
        assert!(gemini.lock().await.history().is_empty());
        assert!(other.lock().await.history().is_empty());
        assert_eq!(registry.session_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let registry = registry();
        let err = registry
            .get_or_create("c1", "nope", None)
            .await
            .err()
            .unwrap();
        assert_eq!(
            err,
            SessionError::UnknownProvider {
                name: "nope".to_string(),
                available: vec!["gemini".to_string(), "local".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_work_dir_recorded_per_container() {
        let registry = registry();
        let local = registry.get_or_create("c1", "local", None).await.unwrap();
        assert!(local.lock().await.work_dir().is_none());

        // Applied to the existing session...
        registry
            .get_or_create("c1", "local", Some(Path::new("/repo")))
            .await
            .unwrap();
        assert_eq!(local.lock().await.work_dir(), Some(Path::new("/repo")));

        // ...and inherited by new sessions for the same container
        let gemini = registry.get_or_create("c1", "gemini", None).await.unwrap();
        assert_eq!(gemini.lock().await.work_dir(), Some(Path::new("/repo")));

        let other = registry.get_or_create("c2", "gemini", None).await.unwrap();
        assert!(other.lock().await.work_dir().is_none());
        assert_eq!(registry.work_dir_for("c1"), Some(PathBuf::from("/repo")));
    }

    #[tokio::test]
    async fn test_clear_operations() {
        let registry = registry();
        registry
            .get_or_create("c1", "local", Some(Path::new("/repo")))
            .await
            .unwrap();
        registry.get_or_create("c1", "gemini", None).await.unwrap();
        registry.get_or_create("c2", "local", None).await.unwrap();

        assert!(registry.clear_one("c1", "gemini"));
        assert!(!registry.clear_one("c1", "gemini"));
        assert_eq!(registry.session_count(), 2);

        assert_eq!(registry.clear_all("c1"), 1);
        assert_eq!(registry.work_dir_for("c1"), None);
        assert_eq!(registry.session_count(), 1);

        registry.clear_everything();
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn test_cleared_session_starts_fresh() {
        let registry = registry();
        let first = registry.get_or_create("c1", "local", None).await.unwrap();
        first.lock().await.respond("hi").await.unwrap();

        registry.clear_everything();
        let second = registry.get_or_create("c1", "local", None).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.lock().await.history().is_empty());
    }
}
