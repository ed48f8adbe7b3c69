//! [`AudioGenerator`]: credential check → admission → speech request → save.
//!
//! # Flow
//!
//! ```text
//! generate_audio(config)
//!   └─▶ claim the slot (Busy if taken)                 [Validating]
//!         ├─ no API key        → Unauthorized           [Failed]
//!         ├─ config invalid    → InvalidConfig          [Failed]
//!         └─▶ limiter.can_make_generation_request()     [AdmissionCheck]
//!               ├─ denied      → GenerationRateLimitExceeded
//!               └─▶ transport.fetch_bytes() or cancel   [InFlight]
//!                     ├─ Err   → transport error, no limiter record
//!                     └─▶ record, spawn_blocking(store.save)  [Persisting]
//!                           ├─ Ok  → entry              [Completed]
//!                           └─ Err → Storage            [Failed]
//! ```

use std::sync::{Arc, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

use super::state::{new_shared_phase, GenerationPhase, SharedPhase};
use crate::config::CredentialProvider;
use crate::models::{ConfigError, FileEntry, GenerationConfig};
use crate::network::{RateLimiter, SpeechRequest, Transport, TransportError};
use crate::storage::{ContentStore, StoreError};

// ---------------------------------------------------------------------------
// GenerationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("A generation is already in progress")]
    Busy,

    /// Unexpected failure such as a panicked blocking task.
    #[error("Internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// AudioGenerator
// ---------------------------------------------------------------------------

/// Runs one generation at a time.
pub struct AudioGenerator {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    store: Arc<dyn ContentStore>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    phase: SharedPhase,
    /// Bumped by `cancel_generation`.  A generation subscribes before it
    /// enters `InFlight`, so no cancel issued in that phase is missed.
    cancel: watch::Sender<u64>,
}

impl AudioGenerator {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        store: Arc<dyn ContentStore>,
        credentials: Arc<dyn CredentialProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            limiter,
            store,
            credentials,
            base_url: base_url.into(),
            phase: new_shared_phase(),
            cancel: watch::channel(0).0,
        }
    }

    pub fn phase(&self) -> GenerationPhase {
        self.lock_phase().clone()
    }

    /// Handle for observers that outlive a borrow of the generator.
    pub fn shared_phase(&self) -> SharedPhase {
        Arc::clone(&self.phase)
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Generate speech for `config` and save it to the library.
    pub async fn generate_audio(
        &self,
        config: GenerationConfig,
    ) -> Result<FileEntry, GenerationError> {
        let slot = self.claim_slot()?;
        let result = self.run(config).await;
        match &result {
            Ok(entry) => {
                log::info!("generation completed: {}", entry.path);
                slot.finish(GenerationPhase::Completed(entry.clone()));
            }
            Err(e) => {
                log::warn!("generation failed: {e}");
                slot.finish(GenerationPhase::Failed(e.to_string()));
            }
        }
        result
    }

    /// Abort the speech request if one is on the wire.  No-op otherwise.
    pub fn cancel_generation(&self) {
        let phase = self.lock_phase();
        if *phase == GenerationPhase::InFlight {
            log::info!("cancelling in-flight generation");
            self.cancel.send_modify(|n| *n = n.wrapping_add(1));
            self.transport.cancel_all();
        }
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    async fn run(&self, config: GenerationConfig) -> Result<FileEntry, GenerationError> {
        let api_key = self.credentials.api_key();
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(TransportError::Unauthorized.into());
        }
        config.validate()?;

        self.set_phase(GenerationPhase::AdmissionCheck);
        let admission = self.limiter.can_make_generation_request();
        if !admission.allowed {
            return Err(TransportError::GenerationRateLimitExceeded {
                retry_after: admission.retry_after,
            }
            .into());
        }

        let request = SpeechRequest::from_config(&config).into_api_request(&self.base_url, api_key)?;
        let mut cancelled = self.cancel.subscribe();
        self.set_phase(GenerationPhase::InFlight);
        let audio = tokio::select! {
            biased;
            _ = cancelled.changed() => return Err(TransportError::Cancelled.into()),
            result = self.transport.fetch_bytes(request) => result?,
        };
        self.limiter.record_generation_request();
        log::debug!("received {} bytes of audio", audio.len());

        self.set_phase(GenerationPhase::Persisting);
        let store = Arc::clone(&self.store);
        let entry = tokio::task::spawn_blocking(move || store.save(&audio, &config))
            .await
            .map_err(|e| GenerationError::Internal(e.to_string()))??;
        Ok(entry)
    }

    // -----------------------------------------------------------------------
    // Phase helpers
    // -----------------------------------------------------------------------

    fn lock_phase(&self) -> MutexGuard<'_, GenerationPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: GenerationPhase) {
        log::debug!("generation: {}", phase.label());
        *self.lock_phase() = phase;
    }

    fn claim_slot(&self) -> Result<Slot<'_>, GenerationError> {
        let mut phase = self.lock_phase();
        if phase.is_busy() {
            return Err(GenerationError::Busy);
        }
        *phase = GenerationPhase::Validating;
        Ok(Slot {
            generator: self,
            finished: false,
        })
    }
}

/// Owns the generation slot.  If the future driving a generation is dropped
/// mid-way, the slot is released as `Failed` instead of staying busy.
struct Slot<'a> {
    generator: &'a AudioGenerator,
    finished: bool,
}

impl Slot<'_> {
    fn finish(mut self, phase: GenerationPhase) {
        self.generator.set_phase(phase);
        self.finished = true;
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.generator
                .set_phase(GenerationPhase::Failed(TransportError::Cancelled.to_string()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use crate::config::{LibraryDirs, SharedCredentials};
    use crate::network::{ApiRequest, ApiResponse};
    use crate::storage::LocalFileStore;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    enum Reply {
        Bytes(Vec<u8>),
        Fail(TransportError),
        /// Wait until `cancel_all`.
        Hang,
        /// Ignore `cancel_all`; reply once `release` is notified.
        Gated(Vec<u8>),
    }

    struct FakeTransport {
        reply: Reply,
        calls: AtomicUsize,
        requests: Mutex<Vec<ApiRequest>>,
        cancelled: Notify,
        release: Notify,
    }

    impl FakeTransport {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                cancelled: Notify::new(),
                release: Notify::new(),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            match &self.reply {
                Reply::Bytes(bytes) => Ok(ApiResponse {
                    status: 200,
                    content_type: Some("audio/mpeg".into()),
                    body: bytes.clone(),
                }),
                Reply::Fail(err) => Err(err.clone()),
                Reply::Hang => {
                    self.cancelled.notified().await;
                    Err(TransportError::Cancelled)
                }
                Reply::Gated(bytes) => {
                    self.release.notified().await;
                    Ok(ApiResponse {
                        status: 200,
                        content_type: Some("audio/mpeg".into()),
                        body: bytes.clone(),
                    })
                }
            }
        }

        fn cancel_all(&self) {
            self.cancelled.notify_one();
        }
    }

    struct FailingStore;

    impl ContentStore for FailingStore {
        fn save(&self, _data: &[u8], _config: &GenerationConfig) -> Result<FileEntry, StoreError> {
            Err(StoreError::FileWrite(std::io::Error::other("disk full")))
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    const BASE_URL: &str = "https://api.example.test/v1";

    struct Harness {
        generator: Arc<AudioGenerator>,
        transport: Arc<FakeTransport>,
        limiter: Arc<RateLimiter>,
        store: Arc<LocalFileStore>,
        credentials: Arc<SharedCredentials>,
        _dir: TempDir,
    }

    fn harness(reply: Reply, api_key: &str) -> Harness {
        harness_with(reply, api_key, RateLimiter::default(), None)
    }

    fn harness_with(
        reply: Reply,
        api_key: &str,
        limiter: RateLimiter,
        store_override: Option<Arc<dyn ContentStore>>,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let dirs = LibraryDirs::new(dir.path().join("outputs"), dir.path().join("downloads"));
        let store = Arc::new(LocalFileStore::new(Arc::new(dirs)));
        let transport = FakeTransport::new(reply);
        let limiter = Arc::new(limiter);
        let content: Arc<dyn ContentStore> =
            store_override.unwrap_or_else(|| Arc::clone(&store) as Arc<dyn ContentStore>);

        let credentials = Arc::new(SharedCredentials::new(api_key));

        let generator = Arc::new(AudioGenerator::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&limiter),
            content,
            Arc::clone(&credentials) as Arc<dyn CredentialProvider>,
            BASE_URL,
        ));
        Harness {
            generator,
            transport,
            limiter,
            store,
            credentials,
            _dir: dir,
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_generation_saves_exact_bytes() {
        let h = harness(Reply::Bytes(vec![0xAB; 12345]), "sk-test");
        let config = GenerationConfig::new("Hello world").with_voice("nova");

        let entry = h.generator.generate_audio(config).await.unwrap();

        let path = entry.full_path(&h.store.outputs_root());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12345);
        assert_eq!(h.generator.phase(), GenerationPhase::Completed(entry.clone()));
        assert_eq!(h.store.entries().unwrap(), vec![entry]);
        assert_eq!(h.limiter.generation_count(), 1);
        assert_eq!(h.limiter.general_count(), 1);

        let requests = h.transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, format!("{BASE_URL}/audio/speech"));
        assert!(requests[0]
            .headers
            .contains(&("Authorization".into(), "Bearer sk-test".into())));
    }

    #[tokio::test]
    async fn missing_credential_fails_before_anything_else() {
        let h = harness(Reply::Bytes(vec![1]), "   ");
        let err = h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Transport(TransportError::Unauthorized)));
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(h.limiter.general_count(), 0);
        assert!(matches!(h.generator.phase(), GenerationPhase::Failed(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_network() {
        let h = harness(Reply::Bytes(vec![1]), "sk-test");
        let err = h
            .generator
            .generate_audio(GenerationConfig::new("Hello").with_speed(9.0))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::InvalidConfig(ConfigError::InvalidSpeed)));
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_generation_limit_blocks_request() {
        let limiter = RateLimiter::new(100, 1, Duration::from_secs(900));
        limiter.record_generation_request();
        let h = harness_with(Reply::Bytes(vec![1]), "sk-test", limiter, None);

        let err = h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .unwrap_err();

        match err {
            GenerationError::Transport(TransportError::GenerationRateLimitExceeded {
                retry_after: Some(wait),
            }) => assert!(wait > Duration::ZERO),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(h.transport.calls(), 0);
        assert_eq!(h.limiter.generation_count(), 1);
    }

    #[tokio::test]
    async fn transport_failure_records_nothing() {
        let h = harness(Reply::Fail(TransportError::ServerError { status: 502 }), "sk-test");
        let err = h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Transport(TransportError::ServerError { status: 502 })
        ));
        assert_eq!(h.limiter.generation_count(), 0);
        assert!(h.store.entries().unwrap().is_empty());
        assert_eq!(
            h.generator.phase(),
            GenerationPhase::Failed("Server error (code: 502)".into())
        );
    }

    #[tokio::test]
    async fn storage_failure_is_reported() {
        let h = harness_with(
            Reply::Bytes(vec![1, 2, 3]),
            "sk-test",
            RateLimiter::default(),
            Some(Arc::new(FailingStore)),
        );
        let err = h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Storage(StoreError::FileWrite(_))));
        // The request itself succeeded, so it counts against the quota.
        assert_eq!(h.limiter.generation_count(), 1);
    }

    #[tokio::test]
    async fn second_request_while_busy_is_refused_and_cancel_works() {
        let h = harness(Reply::Hang, "sk-test");

        let first = {
            let generator = Arc::clone(&h.generator);
            tokio::spawn(async move { generator.generate_audio(GenerationConfig::new("one")).await })
        };
        while h.generator.phase() != GenerationPhase::InFlight {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let second = h.generator.generate_audio(GenerationConfig::new("two")).await;
        assert!(matches!(second, Err(GenerationError::Busy)));

        h.generator.cancel_generation();
        let first = first.await.unwrap();
        assert!(matches!(
            first,
            Err(GenerationError::Transport(TransportError::Cancelled))
        ));
        assert!(!h.generator.phase().is_busy());
        assert_eq!(h.limiter.generation_count(), 0);
    }

    #[tokio::test]
    async fn cancel_missed_by_transport_still_stops_generation() {
        let h = harness(Reply::Gated(vec![7; 16]), "sk-test");

        let task = {
            let generator = Arc::clone(&h.generator);
            tokio::spawn(async move { generator.generate_audio(GenerationConfig::new("Hi")).await })
        };
        while h.generator.phase() != GenerationPhase::InFlight {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // The transport drops this cancel and would go on to deliver audio.
        h.generator.cancel_generation();
        h.transport.release.notify_one();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(GenerationError::Transport(TransportError::Cancelled))
        ));
        assert_eq!(h.limiter.generation_count(), 0);
        assert!(h.store.entries().unwrap().is_empty());
        assert!(!h.generator.phase().is_busy());
    }

    #[tokio::test]
    async fn cancel_outside_flight_is_a_no_op() {
        let h = harness(Reply::Bytes(vec![9; 4]), "sk-test");
        h.generator.cancel_generation();

        // No stale cancellation leaks into the next request.
        assert!(h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn next_request_accepted_after_failure() {
        let h = harness(Reply::Bytes(vec![5; 8]), "");
        assert!(h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .is_err());

        h.credentials.set_api_key("sk-later");
        let entry = h
            .generator
            .generate_audio(GenerationConfig::new("Hello"))
            .await
            .unwrap();
        assert_eq!(h.generator.phase(), GenerationPhase::Completed(entry));
        assert_eq!(h.transport.calls(), 1);
    }

    #[tokio::test]
    async fn dropped_generation_releases_the_slot() {
        let h = harness(Reply::Hang, "sk-test");
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            h.generator.generate_audio(GenerationConfig::new("Hello")),
        )
        .await;
        assert!(outcome.is_err());
        assert!(matches!(h.generator.phase(), GenerationPhase::Failed(_)));
    }
}
