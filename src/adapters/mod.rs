//! Capability seams between the core and the outside world.
//!
//! Each trait is a narrow contract one effect router depends on. Production
//! implementations live in this module's submodules; tests substitute mocks.

pub mod catalog;
pub mod permissions;
pub mod player;
pub mod recorder;

pub use catalog::FsCatalog;
pub use permissions::DesktopPermissions;
pub use player::QueuePlayer;
pub use recorder::DeviceRecorder;

use crate::data::{AudioMetadata, Locator, PermissionKind};

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;

/// Fatal wiring-time failures. Anything here aborts startup.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("permission request mechanism already registered")]
    AlreadyRegistered,
    #[error("audio output device unavailable: {0}")]
    AudioOutput(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("no input audio device available")]
    NoInputDevice,
    #[error("could not create output file: {0}")]
    CreateOutput(#[from] std::io::Error),
    #[error("capture stream failed: {0}")]
    Capture(String),
    #[error("no recording in progress")]
    NotRecording,
    #[error("recorder service is gone")]
    ServiceGone,
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("nothing playable at the requested position")]
    EmptyPlaylist,
    #[error("audio output failed: {0}")]
    Output(String),
    #[error("player service is gone")]
    ServiceGone,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog directory unreadable: {0}")]
    Io(#[from] std::io::Error),
    #[error("catalog index corrupt: {0}")]
    Index(#[from] serde_json::Error),
    #[error("unknown item: {0}")]
    UnknownItem(Locator),
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("permission request mechanism not registered")]
    NotRegistered,
}

/// Keeps the recording destination open for the lifetime of a capture
/// session. Dropping the guard releases the handle, so the file is closed on
/// every exit path, including teardown mid-recording.
pub struct RecordingGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl RecordingGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Guard for adapters that hold nothing open between start and stop.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for RecordingGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// A successfully started capture session: where the audio is going, plus
/// the handle the recorder router owns until stop completes.
pub struct StartedRecording {
    pub locator: Locator,
    pub guard: RecordingGuard,
}

#[async_trait]
pub trait RecorderAdapter: Send + Sync {
    async fn start(&self) -> Result<StartedRecording, RecorderError>;
    async fn stop(&self) -> Result<(), RecorderError>;
}

/// Playlist player. `play` replaces whatever is queued; position accessors
/// reflect the currently playing item. The finished channel fires only when
/// the playlist runs out naturally, never on [`stop`](Self::stop).
#[async_trait]
pub trait PlayerAdapter: Send + Sync {
    async fn play(&self, items: Vec<AudioMetadata>) -> Result<(), PlayerError>;
    async fn stop(&self) -> Result<(), PlayerError>;

    fn current_media_id(&self) -> Option<String>;
    fn current_position(&self) -> Duration;
    /// 0.0 through 1.0 within the current item.
    fn current_progress(&self) -> f32;
    fn has_next(&self) -> bool;

    fn subscribe_finished(&self) -> broadcast::Receiver<()>;
}

#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// All known items, newest first.
    async fn scan(&self) -> Result<Vec<AudioMetadata>, CatalogError>;
    /// Change an item's display name. The locator stays valid.
    async fn rename(&self, locator: &Locator, new_name: &str) -> Result<(), CatalogError>;
}

/// Result delivery for permission requests. Installed once at setup.
pub type PermissionCallback = Box<dyn Fn(PermissionKind, bool) + Send + Sync>;

pub trait PermissionAdapter: Send + Sync {
    fn is_granted(&self, permission: PermissionKind) -> bool;
    /// Install the result callback. Calling twice is a setup error.
    fn register(&self, callback: PermissionCallback) -> Result<(), SetupError>;
    /// Launch the platform request; the answer arrives via the callback.
    fn request(&self, permission: PermissionKind) -> Result<(), PermissionError>;
}
