use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::errors::AudioSessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioOutput {
    Speaker,
    Earpiece,
    Headset,
    Bluetooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Normal,
    InCommunication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioStreamType {
    Music,
    VoiceCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioUsage {
    Media,
    VoiceCommunication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContentType {
    Music,
    Speech,
}

/// Android `AudioManager` routing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidAudioConfig {
    pub manage_audio_focus: bool,
    pub audio_mode: AudioMode,
    pub stream_type: AudioStreamType,
    pub usage: AudioUsage,
    pub content_type: AudioContentType,
    pub preferred_outputs: Vec<AudioOutput>,
}

/// iOS `AVAudioSession` routing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IosAudioConfig {
    pub default_output: AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConfig {
    pub android: AndroidAudioConfig,
    pub ios: IosAudioConfig,
}

impl Default for AudioConfig {
    /// Media playback through the loudspeaker, focus left to the host app.
    fn default() -> Self {
        Self {
            android: AndroidAudioConfig {
                manage_audio_focus: false,
                audio_mode: AudioMode::Normal,
                stream_type: AudioStreamType::Music,
                usage: AudioUsage::Media,
                content_type: AudioContentType::Music,
                preferred_outputs: vec![AudioOutput::Speaker],
            },
            ios: IosAudioConfig {
                default_output: AudioOutput::Speaker,
            },
        }
    }
}

/// Platform audio session (Android AudioManager, iOS AVAudioSession).
///
/// Implemented by the native shell. `stop` is fire-and-forget.
pub trait AudioSession: Send + Sync + 'static {
    fn configure(
        &self,
        config: &AudioConfig,
    ) -> impl Future<Output = Result<(), AudioSessionError>> + Send;

    fn start(&self) -> impl Future<Output = Result<(), AudioSessionError>> + Send;

    fn stop(&self);
}

/// Session for hosts that have no audio session object (desktop).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudioSession;

impl AudioSession for NoopAudioSession {
    async fn configure(&self, _config: &AudioConfig) -> Result<(), AudioSessionError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), AudioSessionError> {
        Ok(())
    }

    fn stop(&self) {}
}

struct Inner<A> {
    session: A,
    config: AudioConfig,
    /// Set once `prepare` has been issued, cleared by teardown.
    issued: AtomicBool,
    ready: AtomicBool,
    preparing: AtomicBool,
    /// Bumped on every `prepare`; a lease only releases its own epoch.
    epoch: AtomicU64,
}

impl<A: AudioSession> Inner<A> {
    /// `epoch` is the latest prepare and no teardown has run since.
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch && self.issued.load(Ordering::SeqCst)
    }

    fn teardown(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.preparing.store(false, Ordering::SeqCst);
        if self.issued.swap(false, Ordering::SeqCst) {
            tracing::info!("stopping audio session");
            self.session.stop();
        }
    }
}

/// Binds the platform audio session to the lifetime of a room token.
pub struct AudioSessionManager<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for AudioSessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: AudioSession> AudioSessionManager<A> {
    pub fn new(session: A, config: AudioConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                config,
                issued: AtomicBool::new(false),
                ready: AtomicBool::new(false),
                preparing: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Configure routing, then start the session.
    ///
    /// The returned lease tears the session down when dropped. If this future
    /// is dropped mid-way the partially prepared session is torn down too.
    pub async fn prepare(&self) -> Result<AudioSessionLease<A>, AudioSessionError> {
        if self.inner.preparing.swap(true, Ordering::SeqCst) {
            return Err(AudioSessionError::AlreadyPreparing);
        }
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.issued.store(true, Ordering::SeqCst);
        let lease = AudioSessionLease {
            inner: self.inner.clone(),
            epoch,
        };

        tracing::info!("configuring audio session: {:?}", self.inner.config);
        let result = match self.inner.session.configure(&self.inner.config).await {
            Ok(()) => self.inner.session.start().await,
            Err(e) => Err(e),
        };
        if !self.inner.is_current(epoch) {
            // Torn down mid-start: the earlier stop may precede the start.
            // Leave the session alone if a newer prepare owns it.
            if self.inner.epoch.load(Ordering::SeqCst) == epoch && result.is_ok() {
                tracing::warn!("audio session torn down while starting, stopping again");
                self.inner.session.stop();
            }
            return Err(AudioSessionError::Cancelled);
        }
        self.inner.preparing.store(false, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.inner.ready.store(true, Ordering::SeqCst);
                tracing::info!("audio session ready");
                Ok(lease)
            }
            Err(e) => {
                tracing::error!("audio session setup failed: {e}");
                drop(lease);
                Err(e)
            }
        }
    }

    /// Stop the session. Idempotent; only reaches the platform if `prepare`
    /// was issued since the last teardown.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }
}

/// Scoped hold on a prepared audio session.
pub struct AudioSessionLease<A: AudioSession> {
    inner: Arc<Inner<A>>,
    epoch: u64,
}

impl<A: AudioSession> Drop for AudioSessionLease<A> {
    fn drop(&mut self) {
        if self.inner.epoch.load(Ordering::SeqCst) == self.epoch {
            self.inner.teardown();
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Scriptable session that counts platform calls.
    #[derive(Default)]
    pub struct FakeAudioSession {
        pub configure_calls: AtomicUsize,
        pub start_calls: AtomicUsize,
        pub stop_calls: AtomicUsize,
        pub configure_error: Mutex<Option<AudioSessionError>>,
        pub start_error: Mutex<Option<AudioSessionError>>,
        /// When set, `start` waits for a notification before completing.
        pub start_gate: Option<Arc<Notify>>,
    }

    impl FakeAudioSession {
        pub fn gated(gate: Arc<Notify>) -> Self {
            Self {
                start_gate: Some(gate),
                ..Default::default()
            }
        }

        pub fn failing_start(err: AudioSessionError) -> Self {
            Self {
                start_error: Mutex::new(Some(err)),
                ..Default::default()
            }
        }

        pub fn stops(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }

        pub fn starts(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }
    }

    impl AudioSession for Arc<FakeAudioSession> {
        async fn configure(&self, _config: &AudioConfig) -> Result<(), AudioSessionError> {
            self.configure_calls.fetch_add(1, Ordering::SeqCst);
            match self.configure_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn start(&self) -> Result<(), AudioSessionError> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.start_gate {
                gate.notified().await;
            }
            match self.start_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeAudioSession;
    use super::*;
    use tokio::sync::Notify;

    fn manager(fake: &Arc<FakeAudioSession>) -> AudioSessionManager<Arc<FakeAudioSession>> {
        AudioSessionManager::new(fake.clone(), AudioConfig::default())
    }

    #[test]
    fn default_config_routes_media_to_speaker() {
        let cfg = AudioConfig::default();
        assert!(!cfg.android.manage_audio_focus);
        assert_eq!(cfg.android.stream_type, AudioStreamType::Music);
        assert_eq!(cfg.android.preferred_outputs, vec![AudioOutput::Speaker]);
        assert_eq!(cfg.ios.default_output, AudioOutput::Speaker);
    }

    #[tokio::test]
    async fn prepare_configures_then_starts() {
        let fake = Arc::new(FakeAudioSession::default());
        let mgr = manager(&fake);

        let lease = mgr.prepare().await.unwrap();
        assert!(mgr.is_ready());
        assert_eq!(fake.configure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fake.starts(), 1);
        assert_eq!(fake.stops(), 0);

        drop(lease);
        assert!(!mgr.is_ready());
        assert_eq!(fake.stops(), 1);
    }

    #[tokio::test]
    async fn configure_failure_skips_start_and_tears_down() {
        let fake = Arc::new(FakeAudioSession::default());
        *fake.configure_error.lock().unwrap() = Some(AudioSessionError::PermissionDenied);
        let mgr = manager(&fake);

        let err = mgr.prepare().await.err().unwrap();
        assert_eq!(err, AudioSessionError::PermissionDenied);
        assert_eq!(fake.starts(), 0);
        assert_eq!(fake.stops(), 1);
        assert!(!mgr.is_ready());
    }

    #[tokio::test]
    async fn start_failure_reports_error() {
        let fake = Arc::new(FakeAudioSession::failing_start(AudioSessionError::DeviceBusy));
        let mgr = manager(&fake);

        let err = mgr.prepare().await.err().unwrap();
        assert_eq!(err, AudioSessionError::DeviceBusy);
        assert!(!mgr.is_ready());
    }

    #[test]
    fn teardown_without_prepare_does_not_reach_platform() {
        let fake = Arc::new(FakeAudioSession::default());
        let mgr = manager(&fake);
        mgr.teardown();
        mgr.teardown();
        assert_eq!(fake.stops(), 0);
    }

    #[tokio::test]
    async fn teardown_is_idempotent() {
        let fake = Arc::new(FakeAudioSession::default());
        let mgr = manager(&fake);
        let lease = mgr.prepare().await.unwrap();

        mgr.teardown();
        mgr.teardown();
        drop(lease);
        assert_eq!(fake.stops(), 1);
    }

    #[tokio::test]
    async fn concurrent_prepare_is_rejected() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeAudioSession::gated(gate.clone()));
        let mgr = manager(&fake);

        let first = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.prepare().await.map(|_lease| ()) })
        };
        while fake.starts() == 0 {
            tokio::task::yield_now().await;
        }

        let second = mgr.prepare().await.err().unwrap();
        assert_eq!(second, AudioSessionError::AlreadyPreparing);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(fake.starts(), 1);
    }

    #[tokio::test]
    async fn aborted_prepare_still_tears_down() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeAudioSession::gated(gate));
        let mgr = manager(&fake);

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move {
                let _lease = mgr.prepare().await;
            })
        };
        while fake.starts() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;

        assert_eq!(fake.stops(), 1);
        assert!(!mgr.is_ready());
    }

    #[tokio::test]
    async fn teardown_during_start_stops_after_start_completes() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeAudioSession::gated(gate.clone()));
        let mgr = manager(&fake);

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.prepare().await.map(|_lease| ()) })
        };
        while fake.starts() == 0 {
            tokio::task::yield_now().await;
        }
        mgr.teardown();
        assert_eq!(fake.stops(), 1);

        gate.notify_one();
        let err = task.await.unwrap().err().unwrap();
        assert_eq!(err, AudioSessionError::Cancelled);
        assert_eq!(fake.stops(), 2);
        assert!(!mgr.is_ready());

        // The manager is usable again.
        let _lease = mgr.prepare().await.unwrap();
        assert!(mgr.is_ready());
    }

    #[tokio::test]
    async fn stale_lease_does_not_stop_newer_session() {
        let fake = Arc::new(FakeAudioSession::default());
        let mgr = manager(&fake);

        let old = mgr.prepare().await.unwrap();
        mgr.teardown();
        let _current = mgr.prepare().await.unwrap();
        drop(old);

        assert_eq!(fake.stops(), 1);
        assert!(mgr.is_ready());
    }

    #[tokio::test]
    async fn noop_session_is_always_ready() {
        let mgr = AudioSessionManager::new(NoopAudioSession, AudioConfig::default());
        let _lease = mgr.prepare().await.unwrap();
        assert!(mgr.is_ready());
        mgr.teardown();
        assert!(!mgr.is_ready());
    }
}
