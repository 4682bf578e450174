//! The studio: one editing session, one conversation and one video panel
//! sharing a gateway and a session store.

use crate::chat::{ChatSession, ChatTranscript};
use crate::config::DEFAULT_POLL_INTERVAL;
use crate::credential::CredentialGate;
use crate::error::{Result, StudioError};
use crate::gateway::{classify_generation_error, Gateway};
use crate::image::{ImageAsset, ImageFormat};
use crate::session::EditSession;
use crate::store::KeyValueStore;
use crate::video::{AssetHandle, AssetSlot, JobPoller, VideoJob, VideoMetadata, VideoRequest};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Marks a panel as having a request in flight until dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(StudioError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct VideoPanel {
    slot: AssetSlot,
    cancel: Option<CancellationToken>,
}

/// Summary of a finished video job. `path` stays valid until the video is
/// replaced or released.
#[derive(Debug, Clone)]
pub struct VideoOutcome {
    /// Location of the materialized video.
    pub path: PathBuf,
    /// MIME type of the video.
    pub mime_type: String,
    /// Size in bytes.
    pub size: usize,
    /// Generation metadata.
    pub metadata: VideoMetadata,
}

/// Owns session state and turns user actions into gateway calls.
pub struct Studio {
    gateway: RwLock<Arc<dyn Gateway>>,
    store: Arc<dyn KeyValueStore>,
    credentials: CredentialGate,
    session: Mutex<EditSession>,
    chat: tokio::sync::Mutex<ChatSession>,
    video: Mutex<VideoPanel>,
    video_generation: AtomicU64,
    edit_busy: AtomicBool,
    video_busy: AtomicBool,
    poll_interval: Duration,
    video_timeout: Option<Duration>,
}

impl Studio {
    /// Creates a studio over `gateway`, restoring the edit session from `store`.
    pub fn new(gateway: Arc<dyn Gateway>, store: Arc<dyn KeyValueStore>) -> Self {
        let session = EditSession::restore(store.as_ref());
        if !session.is_empty() {
            tracing::info!(
                history = session.history().len(),
                "restored edit session"
            );
        }
        Self {
            gateway: RwLock::new(gateway),
            store,
            credentials: CredentialGate::new(true),
            session: Mutex::new(session),
            chat: tokio::sync::Mutex::new(ChatSession::new()),
            video: Mutex::new(VideoPanel::default()),
            video_generation: AtomicU64::new(0),
            edit_busy: AtomicBool::new(false),
            video_busy: AtomicBool::new(false),
            poll_interval: DEFAULT_POLL_INTERVAL,
            video_timeout: None,
        }
    }

    /// Opens a studio against Gemini with a file-backed session store.
    ///
    /// Fails with [`StudioError::Auth`] when no API key is configured.
    #[cfg(feature = "gemini")]
    pub fn open(config: &crate::config::StudioConfig) -> Result<Self> {
        config.require_api_key()?;
        let gateway = crate::gateway::GeminiGatewayBuilder::from_config(config).build()?;
        let store = crate::store::FileStore::new(&config.store_path);
        Ok(Self::new(Arc::new(gateway), Arc::new(store))
            .with_poll_interval(config.poll_interval)
            .with_video_timeout(config.video_timeout))
    }

    /// Sets the wait between video status checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the time budget for video jobs.
    pub fn with_video_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.video_timeout = timeout;
        self
    }

    fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Credential flag shared with in-flight video jobs.
    pub fn credentials(&self) -> &CredentialGate {
        &self.credentials
    }

    /// Installs a gateway built from a newly selected key.
    pub fn select_credential(&self, gateway: Arc<dyn Gateway>) {
        *self.gateway.write().unwrap_or_else(PoisonError::into_inner) = gateway;
        self.credentials.select();
        tracing::info!("API key selected");
    }

    // ── image editing ───────────────────────────────────────────────────────

    /// Snapshot of the edit session.
    pub fn session(&self) -> EditSession {
        lock(&self.session).clone()
    }

    fn persist(&self, session: &EditSession) {
        if let Err(e) = session.sync(self.store.as_ref()) {
            tracing::warn!("failed to persist edit session: {e}");
        }
    }

    /// Starts a new session from `asset`, dropping previous results.
    pub fn load_original(&self, asset: ImageAsset) -> Result<()> {
        let _busy = BusyGuard::acquire(&self.edit_busy)?;
        let mut session = lock(&self.session);
        session.load_original(asset);
        self.persist(&session);
        Ok(())
    }

    /// Forgets the original image, the current result and the history.
    pub fn remove_image(&self) -> Result<()> {
        let _busy = BusyGuard::acquire(&self.edit_busy)?;
        let mut session = lock(&self.session);
        session.remove_image();
        self.persist(&session);
        Ok(())
    }

    /// Applies `prompt` to the current image and records the result as `output`.
    pub async fn edit(&self, prompt: &str, output: ImageFormat) -> Result<ImageAsset> {
        let _busy = BusyGuard::acquire(&self.edit_busy)?;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(StudioError::MissingInput("describe the edit you want".into()));
        }
        if !output.is_output_format() {
            return Err(StudioError::MissingInput(
                "choose PNG or JPEG as the output format".into(),
            ));
        }
        let source = lock(&self.session)
            .source_image()
            .cloned()
            .ok_or_else(|| StudioError::MissingInput("upload an image first".into()))?;

        let edited = self
            .gateway()
            .edit_image(&source, prompt)
            .await
            .map_err(|e| classify_generation_error(e, &self.credentials))?;
        let edited = if edited.format() == output {
            edited
        } else {
            edited.normalized(output)?
        };

        let mut session = lock(&self.session);
        let index = session.record_edit(edited.clone());
        self.persist(&session);
        tracing::info!(index, mime = edited.mime_type(), size = edited.size(), "recorded edit");
        Ok(edited)
    }

    /// Makes history entry `index` the current image.
    pub fn revert(&self, index: usize) -> Result<ImageAsset> {
        let _busy = BusyGuard::acquire(&self.edit_busy)?;
        let mut session = lock(&self.session);
        let asset = session.revert_to(index)?.clone();
        self.persist(&session);
        Ok(asset)
    }

    /// Empties the edit history.
    pub fn clear_history(&self) -> Result<()> {
        let _busy = BusyGuard::acquire(&self.edit_busy)?;
        let mut session = lock(&self.session);
        session.clear_history();
        self.persist(&session);
        Ok(())
    }

    // ── chat ────────────────────────────────────────────────────────────────

    /// Sends one chat turn. See [`ChatSession::send_turn`].
    pub async fn chat(&self, text: &str) -> Result<String> {
        let mut chat = self.chat.try_lock().map_err(|_| StudioError::Busy)?;
        let gateway = self.gateway();
        chat.send_turn(gateway.as_ref(), text).await
    }

    /// Copy of the conversation so far.
    pub async fn transcript(&self) -> ChatTranscript {
        self.chat.lock().await.transcript().clone()
    }

    // ── video ───────────────────────────────────────────────────────────────

    /// Image a video could start from: the current edit result, else the original.
    pub fn starting_image(&self) -> Option<ImageAsset> {
        lock(&self.session).source_image().cloned()
    }

    /// Runs a video job and puts its result on display, releasing the previous one.
    pub async fn generate_video(&self, request: VideoRequest) -> Result<VideoOutcome> {
        let _busy = BusyGuard::acquire(&self.video_busy)?;
        if !self.credentials.is_selected() {
            return Err(StudioError::CredentialRequired);
        }

        let ticket = self.video_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = CancellationToken::new();
        lock(&self.video).cancel = Some(token.clone());

        let poller = JobPoller::new(self.poll_interval)
            .with_timeout(self.video_timeout)
            .with_cancellation(token)
            .with_credential_gate(self.credentials.clone());
        let mut job = VideoJob::new(request);
        let gateway = self.gateway();
        let result = poller.run(gateway.as_ref(), &mut job).await;

        let mut panel = lock(&self.video);
        if self.video_generation.load(Ordering::Acquire) == ticket {
            panel.cancel = None;
        }
        let video = result?;
        let handle = AssetHandle::materialize(&video.data, &video.mime_type)?;

        if self.video_generation.load(Ordering::Acquire) != ticket {
            tracing::debug!("discarding superseded video result");
            drop(handle);
            return Err(StudioError::Cancelled);
        }

        let handle = panel.slot.replace(handle);
        Ok(VideoOutcome {
            path: handle.path().to_path_buf(),
            mime_type: handle.mime_type().to_string(),
            size: handle.size(),
            metadata: video.metadata,
        })
    }

    /// Stops the in-flight video job at its next wait.
    pub fn cancel_video(&self) {
        if let Some(token) = lock(&self.video).cancel.take() {
            token.cancel();
        }
    }

    /// Drops interest in any video: cancels the in-flight job and releases the displayed one.
    pub fn release_video(&self) {
        self.video_generation.fetch_add(1, Ordering::AcqRel);
        let mut panel = lock(&self.video);
        if let Some(token) = panel.cancel.take() {
            token.cancel();
        }
        panel.slot.release();
    }

    /// Location of the video on display.
    pub fn current_video(&self) -> Option<PathBuf> {
        lock(&self.video)
            .slot
            .current()
            .map(|h| h.path().to_path_buf())
    }

    /// Copies the video on display to `dest`.
    pub fn save_video(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let panel = lock(&self.video);
        let handle = panel
            .slot
            .current()
            .ok_or_else(|| StudioError::MissingInput("generate a video first".into()))?;
        handle.save(dest)
    }
}
