use crate::adapters::PlayerAdapter;
use crate::messages::{Message, PlayerMessage};
use crate::switchboard::{Dispatcher, EffectRouter, State};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Bridges the player message category to the player adapter.
///
/// Runs the progress monitor: a periodic task that polls the adapter and
/// dispatches progress updates. At most one monitor exists at a time; it is
/// aborted on every stop path and replaced on every start.
pub struct PlayerRouter {
    adapter: Arc<dyn PlayerAdapter>,
    poll_interval: Duration,
    monitor: Option<JoinHandle<()>>,
}

impl PlayerRouter {
    pub fn new(
        adapter: Arc<dyn PlayerAdapter>,
        dispatcher: Dispatcher,
        poll_interval: Duration,
    ) -> Self {
        // The adapter signals natural end-of-playlist out of band; fold it
        // into the message stream so the reducer sees it in order.
        let mut finished = adapter.subscribe_finished();
        tokio::spawn(async move {
            while finished.recv().await.is_ok() {
                dispatcher.dispatch(Message::Player(PlayerMessage::PlaylistFinished));
            }
        });

        Self {
            adapter,
            poll_interval,
            monitor: None,
        }
    }

    fn stop_monitor(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }

    fn start_monitor(&mut self, dispatcher: &Dispatcher) {
        self.stop_monitor();

        let adapter = self.adapter.clone();
        let dispatcher = dispatcher.clone();
        let poll_interval = self.poll_interval;

        self.monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(media_id) = adapter.current_media_id() else {
                    continue;
                };
                dispatcher.dispatch(Message::Player(PlayerMessage::Update {
                    media_id,
                    position_ms: adapter.current_position().as_millis() as u64,
                    progress: adapter.current_progress(),
                }));
            }
        }));
    }

    fn start_playback(&mut self, state: &State, index: usize, dispatcher: &Dispatcher) {
        // Play-from-here: the requested item through the end of the list.
        let items = state
            .recordings
            .get(index..)
            .map(<[_]>::to_vec)
            .unwrap_or_default();

        self.start_monitor(dispatcher);

        let adapter = self.adapter.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            match adapter.play(items).await {
                Ok(()) => dispatcher.dispatch(Message::Player(PlayerMessage::Started)),
                Err(e) => {
                    tracing::warn!("Failed to start playback: {e}");
                    dispatcher.dispatch(Message::Player(PlayerMessage::Ended));
                }
            }
        });
    }

    fn stop_playback(&mut self, dispatcher: &Dispatcher) {
        self.stop_monitor();

        let adapter = self.adapter.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = adapter.stop().await {
                tracing::warn!("Failed to stop playback: {e}");
            }
            dispatcher.dispatch(Message::Player(PlayerMessage::Ended));
        });
    }
}

impl EffectRouter for PlayerRouter {
    fn can_handle(&self, message: &Message) -> bool {
        matches!(message, Message::Player(_))
    }

    fn handle(&mut self, state: &State, message: &Message, dispatcher: &Dispatcher) {
        let Message::Player(msg) = message else {
            return;
        };

        match msg {
            PlayerMessage::Start { index, .. } => self.start_playback(state, *index, dispatcher),
            PlayerMessage::Stop => self.stop_playback(dispatcher),
            PlayerMessage::PlaylistFinished => {
                // Natural end: the adapter has already gone quiet, only the
                // monitor needs tearing down.
                self.stop_monitor();
                dispatcher.dispatch(Message::Player(PlayerMessage::Ended));
            }
            PlayerMessage::Ended => self.stop_monitor(),
            PlayerMessage::Started | PlayerMessage::Update { .. } => {}
        }
    }
}
