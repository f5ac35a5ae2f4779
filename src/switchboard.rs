use crate::data::{AudioMetadata, Locator, PermissionState};
use crate::messages::{
    CatalogMessage, Message, Output, PermissionMessage, PlaybackStatus, PlayerMessage,
    RecorderMessage, RecordingStatus,
};

use tokio::sync::{broadcast, mpsc, watch};

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Single snapshot of everything the core knows. Replaced wholesale on each
/// accepted message; routers and subscribers only ever see point-in-time
/// copies.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    /// Catalog order, newest first. Anchored to the last completed scan.
    pub recordings: Vec<AudioMetadata>,
    pub audio: AudioState,
    pub permissions: PermissionState,
}

impl Default for State {
    fn default() -> Self {
        Self {
            recordings: Vec::new(),
            audio: AudioState::Idle,
            permissions: PermissionState::default(),
        }
    }
}

/// The audio state machine. `Idle` is initial; there is no terminal state.
/// Transitions happen only in [`reduce`].
#[derive(Clone, Debug, PartialEq)]
pub enum AudioState {
    Idle,
    RecordingStarting,
    RecordingStarted { locator: Locator },
    RecordingStopping { locator: Locator },
    PlaybackStarting { index: usize, media_id: String },
    PlaybackStarted,
    PlaybackStopping,
}

/// Reduce one message against the current state.
///
/// Returns the successor state, or `None` when the message is not applicable
/// to the current state. A rejected message leaves the state untouched and
/// produces neither effects nor output.
pub fn reduce(state: &State, message: &Message) -> Option<State> {
    match message {
        Message::Recorder(msg) => match msg {
            RecorderMessage::Toggle => match &state.audio {
                AudioState::Idle => Some(State {
                    audio: AudioState::RecordingStarting,
                    ..state.clone()
                }),
                AudioState::RecordingStarted { locator } => Some(State {
                    audio: AudioState::RecordingStopping {
                        locator: locator.clone(),
                    },
                    ..state.clone()
                }),
                _ => None,
            },
            RecorderMessage::Started { locator } => match &state.audio {
                AudioState::RecordingStarting => Some(State {
                    audio: AudioState::RecordingStarted {
                        locator: locator.clone(),
                    },
                    ..state.clone()
                }),
                _ => None,
            },
            RecorderMessage::Stopped { .. } => match &state.audio {
                AudioState::RecordingStopping { .. } => Some(State {
                    audio: AudioState::Idle,
                    ..state.clone()
                }),
                _ => None,
            },
            RecorderMessage::Failed => match &state.audio {
                AudioState::RecordingStarting | AudioState::RecordingStopping { .. } => {
                    Some(State {
                        audio: AudioState::Idle,
                        ..state.clone()
                    })
                }
                _ => None,
            },
        },
        Message::Player(msg) => match msg {
            PlayerMessage::Start { index, media_id } => match &state.audio {
                AudioState::Idle => Some(State {
                    audio: AudioState::PlaybackStarting {
                        index: *index,
                        media_id: media_id.clone(),
                    },
                    ..state.clone()
                }),
                // Already playing: accept unchanged so the router can
                // restart the playlist from the new index.
                AudioState::PlaybackStarted => Some(state.clone()),
                _ => None,
            },
            PlayerMessage::Started => match &state.audio {
                AudioState::PlaybackStarting { .. } | AudioState::PlaybackStarted => Some(State {
                    audio: AudioState::PlaybackStarted,
                    ..state.clone()
                }),
                _ => None,
            },
            PlayerMessage::Stop => match &state.audio {
                AudioState::PlaybackStarted => Some(State {
                    audio: AudioState::PlaybackStopping,
                    ..state.clone()
                }),
                _ => None,
            },
            // Also accepted from PlaybackStarting: a failed playback start
            // recovers to Idle through the same message.
            PlayerMessage::Ended => match &state.audio {
                AudioState::PlaybackStarting { .. }
                | AudioState::PlaybackStarted
                | AudioState::PlaybackStopping => Some(State {
                    audio: AudioState::Idle,
                    ..state.clone()
                }),
                _ => None,
            },
            // Progress ticks and the natural-end signal never move the
            // machine; the player router reacts to the latter.
            PlayerMessage::Update { .. } | PlayerMessage::PlaylistFinished => {
                Some(state.clone())
            }
        },
        Message::Catalog(msg) => match msg {
            CatalogMessage::Scan | CatalogMessage::Rename { .. } => Some(state.clone()),
            CatalogMessage::ScanComplete(files) => Some(State {
                recordings: files.clone(),
                ..state.clone()
            }),
        },
        Message::Permissions(msg) => match msg {
            PermissionMessage::Initialize | PermissionMessage::Request(_) => Some(state.clone()),
            PermissionMessage::Updated {
                permission,
                granted,
            } => Some(State {
                permissions: state.permissions.with(*permission, *granted),
                ..state.clone()
            }),
        },
    }
}

/// Derive the externally visible effect of an accepted message, if any.
pub fn route_output(state: &State, message: &Message) -> Option<Output> {
    match message {
        Message::Recorder(RecorderMessage::Started { .. }) => {
            Some(Output::RecordingStatusChanged(RecordingStatus::Started))
        }
        Message::Recorder(RecorderMessage::Stopped { locator }) => Some(
            Output::RecordingStatusChanged(RecordingStatus::Stopped(locator.clone())),
        ),
        Message::Recorder(RecorderMessage::Failed) => {
            Some(Output::RecordingStatusChanged(RecordingStatus::Failed))
        }
        Message::Player(PlayerMessage::Started) => {
            Some(Output::PlaybackStatusChanged(PlaybackStatus::Started))
        }
        Message::Player(PlayerMessage::Update {
            media_id,
            position_ms,
            progress,
        }) => Some(Output::PlaybackStatusChanged(PlaybackStatus::Playing {
            media_id: media_id.clone(),
            position_ms: *position_ms,
            progress: *progress,
        })),
        Message::Player(PlayerMessage::Ended) => {
            Some(Output::PlaybackStatusChanged(PlaybackStatus::Stopped))
        }
        Message::Catalog(CatalogMessage::ScanComplete(files)) => {
            Some(Output::FilesChanged(files.clone()))
        }
        Message::Permissions(PermissionMessage::Updated { .. }) => {
            Some(Output::PermissionsUpdated(state.permissions))
        }
        _ => None,
    }
}

/// Cloneable, non-blocking entry point into the switchboard.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Message>,
}

impl Dispatcher {
    pub fn dispatch(&self, message: Message) {
        if self.tx.send(message).is_err() {
            tracing::warn!("Switchboard is gone, dropping message");
        }
    }
}

/// Bridges one message category to one adapter. `handle` runs on the
/// switchboard worker and must not block: long operations are spawned and
/// report back by dispatching follow-up messages.
pub trait EffectRouter: Send {
    fn can_handle(&self, message: &Message) -> bool;
    fn handle(&mut self, state: &State, message: &Message, dispatcher: &Dispatcher);
}

/// What the presentation layer holds on to: dispatch messages in, observe
/// outputs and state snapshots out.
#[derive(Clone)]
pub struct SwitchboardHandle {
    dispatcher: Dispatcher,
    output_tx: broadcast::Sender<Output>,
    state_rx: watch::Receiver<State>,
}

impl SwitchboardHandle {
    pub fn dispatch(&self, message: Message) {
        self.dispatcher.dispatch(message);
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn subscribe_outputs(&self) -> broadcast::Receiver<Output> {
        self.output_tx.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<State> {
        self.state_rx.clone()
    }
}

/// Message-driven core: consumes one ordered message queue, reducing each
/// message into a new state, fanning accepted messages out to the effect
/// routers, and deriving at most one output per message.
pub struct Switchboard {
    state: State,
    rx: mpsc::UnboundedReceiver<Message>,
    dispatcher: Dispatcher,
    routers: Vec<Box<dyn EffectRouter>>,
    output_tx: broadcast::Sender<Output>,
    state_tx: watch::Sender<State>,
}

impl Switchboard {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (output_tx, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(State::default());

        Self {
            state: State::default(),
            rx,
            dispatcher: Dispatcher { tx },
            routers: Vec::new(),
            output_tx,
            state_tx,
        }
    }

    /// Routers are consulted in registration order for every accepted
    /// message; each acts only on the category it claims.
    pub fn add_router(&mut self, router: Box<dyn EffectRouter>) {
        self.routers.push(router);
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn handle(&self) -> SwitchboardHandle {
        SwitchboardHandle {
            dispatcher: self.dispatcher.clone(),
            output_tx: self.output_tx.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Run until every dispatcher is dropped. Messages are reduced strictly
    /// in dispatch order; the loop itself never blocks on adapter work.
    pub async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            let Some(next) = reduce(&self.state, &message) else {
                tracing::debug!(?message, state = ?self.state.audio, "Message rejected");
                continue;
            };
            self.state = next;
            let _ = self.state_tx.send(self.state.clone());

            for router in &mut self.routers {
                if router.can_handle(&message) {
                    router.handle(&self.state, &message, &self.dispatcher);
                }
            }

            if let Some(output) = route_output(&self.state, &message) {
                // No subscribers is fine; outputs are fire-and-forget.
                let _ = self.output_tx.send(output);
            }
        }
        tracing::debug!("Switchboard loop finished");
    }
}

impl Default for Switchboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PermissionKind;
    use std::time::Duration;

    fn item(id: &str) -> AudioMetadata {
        AudioMetadata {
            media_id: id.to_string(),
            locator: Locator::new(format!("/recordings/{id}.wav")),
            name: format!("recording {id}"),
            created_secs: 1_700_000_000,
            duration_ms: 1500,
        }
    }

    fn state_with_audio(audio: AudioState) -> State {
        State {
            audio,
            ..State::default()
        }
    }

    fn loc(s: &str) -> Locator {
        Locator::new(s)
    }

    #[test]
    fn toggle_from_idle_enters_recording_starting() {
        let state = State::default();
        let next = reduce(&state, &Message::Recorder(RecorderMessage::Toggle)).unwrap();
        assert_eq!(next.audio, AudioState::RecordingStarting);
    }

    #[test]
    fn toggle_while_starting_is_rejected() {
        let state = state_with_audio(AudioState::RecordingStarting);
        assert!(reduce(&state, &Message::Recorder(RecorderMessage::Toggle)).is_none());
    }

    #[test]
    fn recording_full_trajectory() {
        let mut state = State::default();
        let locator = loc("/tmp/r.wav");

        state = reduce(&state, &Message::Recorder(RecorderMessage::Toggle)).unwrap();
        assert_eq!(state.audio, AudioState::RecordingStarting);

        state = reduce(
            &state,
            &Message::Recorder(RecorderMessage::Started {
                locator: locator.clone(),
            }),
        )
        .unwrap();
        assert_eq!(
            state.audio,
            AudioState::RecordingStarted {
                locator: locator.clone()
            }
        );

        state = reduce(&state, &Message::Recorder(RecorderMessage::Toggle)).unwrap();
        assert_eq!(
            state.audio,
            AudioState::RecordingStopping {
                locator: locator.clone()
            }
        );

        state = reduce(
            &state,
            &Message::Recorder(RecorderMessage::Stopped { locator }),
        )
        .unwrap();
        assert_eq!(state.audio, AudioState::Idle);
    }

    #[test]
    fn recording_failure_returns_to_idle_from_both_phases() {
        let starting = state_with_audio(AudioState::RecordingStarting);
        let next = reduce(&starting, &Message::Recorder(RecorderMessage::Failed)).unwrap();
        assert_eq!(next.audio, AudioState::Idle);

        let stopping = state_with_audio(AudioState::RecordingStopping {
            locator: loc("/tmp/r.wav"),
        });
        let next = reduce(&stopping, &Message::Recorder(RecorderMessage::Failed)).unwrap();
        assert_eq!(next.audio, AudioState::Idle);
    }

    #[test]
    fn started_callback_rejected_unless_starting() {
        let state = State::default();
        let msg = Message::Recorder(RecorderMessage::Started {
            locator: loc("/tmp/r.wav"),
        });
        assert!(reduce(&state, &msg).is_none());
    }

    #[test]
    fn start_playback_only_from_idle_or_started() {
        let msg = Message::Player(PlayerMessage::Start {
            index: 0,
            media_id: "1".into(),
        });

        let idle = State::default();
        let next = reduce(&idle, &msg).unwrap();
        assert_eq!(
            next.audio,
            AudioState::PlaybackStarting {
                index: 0,
                media_id: "1".into()
            }
        );

        // Restart-while-playing: accepted, state unchanged.
        let playing = state_with_audio(AudioState::PlaybackStarted);
        let next = reduce(&playing, &msg).unwrap();
        assert_eq!(next.audio, AudioState::PlaybackStarted);

        let recording = state_with_audio(AudioState::RecordingStarting);
        assert!(reduce(&recording, &msg).is_none());
    }

    #[test]
    fn stop_playback_while_idle_is_rejected() {
        let state = State::default();
        assert!(reduce(&state, &Message::Player(PlayerMessage::Stop)).is_none());
        assert!(route_output(&state, &Message::Player(PlayerMessage::Stop)).is_none());
    }

    #[test]
    fn playback_ends_from_started_or_stopping() {
        let started = state_with_audio(AudioState::PlaybackStarted);
        let next = reduce(&started, &Message::Player(PlayerMessage::Ended)).unwrap();
        assert_eq!(next.audio, AudioState::Idle);

        let stopping = state_with_audio(AudioState::PlaybackStopping);
        let next = reduce(&stopping, &Message::Player(PlayerMessage::Ended)).unwrap();
        assert_eq!(next.audio, AudioState::Idle);

        let idle = State::default();
        assert!(reduce(&idle, &Message::Player(PlayerMessage::Ended)).is_none());
    }

    #[test]
    fn progress_updates_never_change_the_audio_state() {
        let update = Message::Player(PlayerMessage::Update {
            media_id: "3".into(),
            position_ms: 250,
            progress: 0.5,
        });

        for audio in [
            AudioState::Idle,
            AudioState::RecordingStarting,
            AudioState::PlaybackStarted,
            AudioState::PlaybackStopping,
        ] {
            let state = state_with_audio(audio.clone());
            let next = reduce(&state, &update).unwrap();
            assert_eq!(next.audio, audio);
        }
    }

    #[test]
    fn scan_complete_replaces_recordings_wholesale() {
        let mut state = State::default();
        state.recordings = vec![item("old")];

        let files = vec![item("b"), item("a")];
        let next = reduce(
            &state,
            &Message::Catalog(CatalogMessage::ScanComplete(files.clone())),
        )
        .unwrap();
        assert_eq!(next.recordings, files);
    }

    #[test]
    fn rename_does_not_touch_recordings() {
        let mut state = State::default();
        state.recordings = vec![item("a")];

        let next = reduce(
            &state,
            &Message::Catalog(CatalogMessage::Rename {
                locator: loc("/recordings/a.wav"),
                name: "new name".into(),
            }),
        )
        .unwrap();
        assert_eq!(next.recordings, state.recordings);
    }

    #[test]
    fn permission_update_flips_grant_and_emits_output() {
        let state = State::default();
        let msg = Message::Permissions(PermissionMessage::Updated {
            permission: PermissionKind::Microphone,
            granted: true,
        });

        let next = reduce(&state, &msg).unwrap();
        assert!(next.permissions.microphone);

        match route_output(&next, &msg) {
            Some(Output::PermissionsUpdated(perms)) => assert!(perms.microphone),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn output_mapping_covers_the_observable_messages() {
        let state = State::default();
        let locator = loc("/tmp/r.wav");

        assert_eq!(
            route_output(
                &state,
                &Message::Recorder(RecorderMessage::Stopped {
                    locator: locator.clone()
                })
            ),
            Some(Output::RecordingStatusChanged(RecordingStatus::Stopped(
                locator
            )))
        );
        assert_eq!(
            route_output(&state, &Message::Player(PlayerMessage::Ended)),
            Some(Output::PlaybackStatusChanged(PlaybackStatus::Stopped))
        );
        // Intents are not observable on their own.
        assert!(route_output(&state, &Message::Recorder(RecorderMessage::Toggle)).is_none());
        assert!(route_output(&state, &Message::Catalog(CatalogMessage::Scan)).is_none());
        assert!(
            route_output(
                &state,
                &Message::Player(PlayerMessage::PlaylistFinished)
            )
            .is_none()
        );
    }

    /// Router that records every (audio-state, message) pair it is offered.
    struct Probe {
        seen: std::sync::Arc<std::sync::Mutex<Vec<(AudioState, Message)>>>,
    }

    impl EffectRouter for Probe {
        fn can_handle(&self, message: &Message) -> bool {
            matches!(message, Message::Recorder(_))
        }

        fn handle(&mut self, state: &State, message: &Message, _dispatcher: &Dispatcher) {
            self.seen
                .lock()
                .unwrap()
                .push((state.audio.clone(), message.clone()));
        }
    }

    #[tokio::test]
    async fn rejected_messages_skip_routing_and_output() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut switchboard = Switchboard::new();
        switchboard.add_router(Box::new(Probe { seen: seen.clone() }));
        let handle = switchboard.handle();
        tokio::spawn(switchboard.run());

        let mut outputs = handle.subscribe_outputs();
        let mut state = handle.state();

        // Stopped callback while Idle: illegal, must be invisible.
        handle.dispatch(Message::Recorder(RecorderMessage::Stopped {
            locator: loc("/tmp/r.wav"),
        }));
        // Legal toggle afterwards proves the loop is still alive.
        handle.dispatch(Message::Recorder(RecorderMessage::Toggle));

        tokio::time::timeout(Duration::from_secs(1), state.changed())
            .await
            .expect("state change")
            .unwrap();
        assert_eq!(state.borrow().audio, AudioState::RecordingStarting);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "rejected message must not reach routers");
        assert_eq!(seen[0].1, Message::Recorder(RecorderMessage::Toggle));
        drop(seen);

        assert!(
            matches!(
                outputs.try_recv(),
                Err(broadcast::error::TryRecvError::Empty)
            ),
            "neither message produces an output"
        );
    }

    #[tokio::test]
    async fn outputs_preserve_dispatch_order() {
        let switchboard = Switchboard::new();
        let handle = switchboard.handle();
        tokio::spawn(switchboard.run());

        let mut outputs = handle.subscribe_outputs();

        handle.dispatch(Message::Catalog(CatalogMessage::ScanComplete(vec![
            item("a"),
        ])));
        handle.dispatch(Message::Permissions(PermissionMessage::Updated {
            permission: PermissionKind::Microphone,
            granted: true,
        }));

        let first = tokio::time::timeout(Duration::from_secs(1), outputs.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), outputs.recv())
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(first, Output::FilesChanged(_)));
        assert!(matches!(second, Output::PermissionsUpdated(_)));
    }
}
