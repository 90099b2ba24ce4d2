// A single conversation with one provider

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{AiProvider, HistoryEntry};
use crate::errors::ProviderError;

/// Default number of exchanges kept in history
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

pub struct AiSession {
    provider: Arc<dyn AiProvider>,
    history: Vec<HistoryEntry>,
    work_dir: Option<PathBuf>,
    /// Maximum history entries (two per exchange)
    max_entries: usize,
}

impl AiSession {
    pub fn new(provider: Arc<dyn AiProvider>, history_window: usize) -> Self {
        Self {
            provider,
            history: Vec::new(),
            work_dir: None,
            max_entries: history_window.saturating_mul(2),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send a message and record the exchange.
    ///
    /// History is left untouched when the provider fails.
    pub async fn respond(&mut self, message: &str) -> Result<String, ProviderError> {
        let reply = self
            .provider
            .respond(&self.history, message, self.work_dir.as_deref())
            .await?;

        self.history.push(HistoryEntry::user(message));
        self.history.push(HistoryEntry::assistant(reply.clone()));
        self.trim();

        Ok(reply)
    }

    /// Replace history with externally supplied turns (e.g. after a provider switch)
    pub fn replace_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history = entries;
        self.trim();
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    pub fn set_work_dir(&mut self, dir: impl Into<PathBuf>) {
        self.work_dir = Some(dir.into());
    }

    fn trim(&mut self) {
        if self.history.len() > self.max_entries {
            let excess = self.history.len() - self.max_entries;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider that echoes the message and records what it was given
    pub(crate) struct EchoProvider {
        pub name: String,
        pub seen: Mutex<Vec<(usize, Option<PathBuf>)>>,
    }

    impl EchoProvider {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AiProvider for EchoProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn respond(
            &self,
            history: &[HistoryEntry],
            message: &str,
            work_dir: Option<&Path>,
        ) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push((history.len(), work_dir.map(Path::to_path_buf)));
            if message == "fail" {
                return Err(ProviderError::ConnectionFailure {
                    provider: self.name.clone(),
                    endpoint: "nowhere".to_string(),
                });
            }
            Ok(format!("echo: {}", message))
        }
    }

    #[tokio::test]
    async fn test_respond_appends_exchange() {
        let provider = EchoProvider::new("echo");
        let mut session = AiSession::new(provider.clone(), DEFAULT_HISTORY_WINDOW);

        assert_eq!(session.respond("hi").await.unwrap(), "echo: hi");
        assert_eq!(
            session.history(),
            &[HistoryEntry::user("hi"), HistoryEntry::assistant("echo: hi")]
        );

        session.respond("again").await.unwrap();
        // Second call saw the first exchange
        assert_eq!(provider.seen.lock().unwrap()[1].0, 2);
    }

    #[tokio::test]
    async fn test_history_trimmed_to_window() {
        let provider = EchoProvider::new("echo");
        let mut session = AiSession::new(provider, 2);

        for msg in ["a", "b", "c"] {
            session.respond(msg).await.unwrap();
        }

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.history()[0], HistoryEntry::user("b"));
        assert_eq!(session.history()[3], HistoryEntry::assistant("echo: c"));
    }

    #[tokio::test]
    async fn test_failed_response_keeps_history() {
        let provider = EchoProvider::new("echo");
        let mut session = AiSession::new(provider, DEFAULT_HISTORY_WINDOW);
        session.respond("hi").await.unwrap();

        let err = session.respond("fail").await.unwrap_err();
        assert!(matches!(err, ProviderError::ConnectionFailure { .. }));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_work_dir_passed_to_provider() {
        let provider = EchoProvider::new("echo");
        let mut session = AiSession::new(provider.clone(), DEFAULT_HISTORY_WINDOW);
        session.set_work_dir("/tmp/project");
        session.respond("hi").await.unwrap();

        assert_eq!(
            provider.seen.lock().unwrap()[0].1,
            Some(PathBuf::from("/tmp/project"))
        );
    }

    #[test]
    fn test_replace_history_and_reset() {
        let mut session = AiSession::new(EchoProvider::new("echo"), 1);
        session.replace_history(vec![
            HistoryEntry::user("1"),
            HistoryEntry::assistant("2"),
            HistoryEntry::user("3"),
            HistoryEntry::assistant("4"),
        ]);
        assert_eq!(
            session.history(),
            &[HistoryEntry::user("3"), HistoryEntry::assistant("4")]
        );

        session.reset();
        assert!(session.history().is_empty());
    }
}
