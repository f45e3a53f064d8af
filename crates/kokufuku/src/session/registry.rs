//! Session ownership for hosts that serve several users.

use super::Session;
use crate::config::AnalysisConfig;
use crate::error::{KokufukuError, Result};
use parking_lot::{Mutex, RwLock};
use static_assertions::assert_impl_all;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

type SharedSession = Arc<Mutex<Session>>;

/// Owns sessions by identifier.
///
/// The registry lock is held only to look a session up. Operations then lock
/// that one session, so a slow completion call in one session never blocks
/// another.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
}

assert_impl_all!(SessionRegistry: Send, Sync);

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session and return its identifier.
    pub fn create(&self, config: AnalysisConfig) -> Uuid {
        self.insert(Session::new(config))
    }

    /// Take ownership of an existing session.
    pub fn insert(&self, session: Session) -> Uuid {
        let id = session.id();
        self.sessions
            .write()
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    fn get(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| KokufukuError::SessionNotFound(id.to_string()))
    }

    pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&Session) -> R) -> Result<R> {
        let session = self.get(id)?;
        let guard = session.lock();
        Ok(f(&*guard))
    }

    pub fn with_session_mut<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
        let session = self.get(id)?;
        let mut guard = session.lock();
        Ok(f(&mut *guard))
    }

    /// Unregister a session. An operation already running on it finishes
    /// against the detached session.
    pub fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().remove(&id).is_some()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.sessions.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIProvider, ImageInput};
    use crate::types::UploadedFile;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Blocks inside the completion call until released.
    struct GatedProvider {
        entered: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl AIProvider for GatedProvider {
        fn generate_text(&self, _prompt: &str) -> anyhow::Result<String> {
            self.entered.lock().send(()).ok();
            self.release
                .lock()
                .recv_timeout(Duration::from_secs(5))
                .ok();
            Ok("{}".to_string())
        }

        fn generate_with_images(
            &self,
            _prompt: &str,
            _images: &[ImageInput],
        ) -> anyhow::Result<String> {
            unreachable!()
        }

        fn name(&self) -> &str {
            "Gated"
        }
    }

    fn math_upload(topic: &str) -> UploadedFile {
        UploadedFile::new(
            "数学.csv",
            format!("大問,内容,点数,配点\n1,{},1,2\n", topic).into_bytes(),
        )
    }

    #[test]
    fn test_create_and_lookup() {
        let registry = SessionRegistry::new();
        let id = registry.create(AnalysisConfig::default());

        assert!(registry.contains(id));
        assert_eq!(registry.with_session(id, |s| s.id()).unwrap(), id);
    }

    #[test]
    fn test_unknown_session() {
        let registry = SessionRegistry::new();
        let err = registry.with_session(Uuid::new_v4(), |_| ()).unwrap_err();
        assert_eq!(err.error_code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let registry = Arc::new(SessionRegistry::new());
        let a = registry.create(AnalysisConfig::default());
        let b = registry.create(AnalysisConfig::default());

        let handle = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry
                    .with_session_mut(a, |s| s.ingest(&[math_upload("関数")]))
                    .unwrap()
            })
        };
        let report = handle.join().unwrap();

        assert_eq!(report.total_records(), 1);
        assert_eq!(registry.with_session(a, |s| s.record_count()).unwrap(), 1);
        assert_eq!(registry.with_session(b, |s| s.record_count()).unwrap(), 0);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_slow_analysis_does_not_block_other_sessions() {
        let registry = Arc::new(SessionRegistry::new());
        let a = registry.create(AnalysisConfig::default());
        let b = registry.create(AnalysisConfig::default());
        registry
            .with_session_mut(a, |s| s.ingest(&[math_upload("二次関数の応用")]))
            .unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let provider = GatedProvider {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };

        let handle = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                registry
                    .with_session_mut(a, |s| s.analyze(Some(&provider)).map(|_| ()))
                    .unwrap()
            })
        };

        // Session a is now inside its completion call
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let started = Instant::now();
        let count = registry.with_session(b, |s| s.record_count()).unwrap();
        let waited = started.elapsed();
        assert!(registry.contains(a));
        release_tx.send(()).unwrap();

        assert_eq!(count, 0);
        assert!(waited < Duration::from_secs(1), "waited {:?}", waited);
        handle.join().unwrap().unwrap();
    }
}
