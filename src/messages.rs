use crate::data::{AudioMetadata, Locator, PermissionKind, PermissionState};

/// Everything that can be dispatched into the switchboard: user intents and
/// the callbacks the effect routers feed back in. One sub-enum per adapter
/// category; each router claims exactly one category.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Recorder(RecorderMessage),
    Player(PlayerMessage),
    Catalog(CatalogMessage),
    Permissions(PermissionMessage),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecorderMessage {
    /// User intent: start when idle, stop when recording.
    Toggle,
    /// Callback: capture session is live, audio is flowing to `locator`.
    Started { locator: Locator },
    /// Callback: session closed cleanly.
    Stopped { locator: Locator },
    /// Callback: start or stop failed.
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerMessage {
    /// User intent: play from `index` to the end of the recordings list.
    Start { index: usize, media_id: String },
    /// User intent: stop playback.
    Stop,
    /// Callback: the player accepted the playlist and began playing.
    Started,
    /// Callback: periodic progress tick from the monitor task.
    Update {
        media_id: String,
        position_ms: u64,
        progress: f32,
    },
    /// Callback: the playlist ran out on its own (not a manual stop).
    PlaylistFinished,
    /// Callback: playback is over, manually or naturally.
    Ended,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CatalogMessage {
    /// Intent: re-query the catalog.
    Scan,
    /// Callback: the scan result, newest first.
    ScanComplete(Vec<AudioMetadata>),
    /// User intent: change an item's display name, then re-scan.
    Rename { locator: Locator, name: String },
}

#[derive(Clone, Debug, PartialEq)]
pub enum PermissionMessage {
    /// Intent: seed the current grant state at startup.
    Initialize,
    /// User intent: launch the platform request for one permission.
    Request(PermissionKind),
    /// Callback: the platform answered.
    Updated {
        permission: PermissionKind,
        granted: bool,
    },
}

/// Externally observable effects, derived from accepted messages and
/// delivered in dispatch order to the presentation layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    FilesChanged(Vec<AudioMetadata>),
    PermissionsUpdated(PermissionState),
    RecordingStatusChanged(RecordingStatus),
    PlaybackStatusChanged(PlaybackStatus),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecordingStatus {
    Started,
    Stopped(Locator),
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackStatus {
    Started,
    Playing {
        media_id: String,
        position_ms: u64,
        progress: f32,
    },
    Stopped,
}
