use crate::adapters::{RecorderAdapter, RecordingGuard, StartedRecording};
use crate::messages::{Message, RecorderMessage};
use crate::switchboard::{AudioState, Dispatcher, EffectRouter, State};

use std::sync::{Arc, Mutex};

/// Bridges the recorder message category to the recorder adapter.
///
/// Owns the open-file guard from start success until stop completion; the
/// guard is dropped on every exit path, stop failures included.
pub struct RecorderRouter {
    adapter: Arc<dyn RecorderAdapter>,
    active_guard: Arc<Mutex<Option<RecordingGuard>>>,
}

impl RecorderRouter {
    pub fn new(adapter: Arc<dyn RecorderAdapter>) -> Self {
        Self {
            adapter,
            active_guard: Arc::new(Mutex::new(None)),
        }
    }

    fn start_recording(&self, dispatcher: &Dispatcher) {
        let adapter = self.adapter.clone();
        let active_guard = self.active_guard.clone();
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            match adapter.start().await {
                Ok(StartedRecording { locator, guard }) => {
                    *active_guard.lock().unwrap() = Some(guard);
                    dispatcher.dispatch(Message::Recorder(RecorderMessage::Started { locator }));
                }
                Err(e) => {
                    tracing::warn!("Failed to start recording: {e}");
                    dispatcher.dispatch(Message::Recorder(RecorderMessage::Failed));
                }
            }
        });
    }

    fn stop_recording(&self, locator: crate::data::Locator, dispatcher: &Dispatcher) {
        let adapter = self.adapter.clone();
        let active_guard = self.active_guard.clone();
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            let result = adapter.stop().await;

            // Release the file handle regardless of how the stop went.
            drop(active_guard.lock().unwrap().take());

            match result {
                Ok(()) => {
                    dispatcher.dispatch(Message::Recorder(RecorderMessage::Stopped { locator }));
                }
                Err(e) => {
                    tracing::warn!("Failed to stop recording: {e}");
                    dispatcher.dispatch(Message::Recorder(RecorderMessage::Failed));
                }
            }
        });
    }
}

impl EffectRouter for RecorderRouter {
    fn can_handle(&self, message: &Message) -> bool {
        matches!(message, Message::Recorder(_))
    }

    fn handle(&mut self, state: &State, message: &Message, dispatcher: &Dispatcher) {
        // Only the toggle intent triggers adapter work; the reducer has
        // already decided which phase we are in.
        if !matches!(message, Message::Recorder(RecorderMessage::Toggle)) {
            return;
        }

        match &state.audio {
            AudioState::RecordingStarting => self.start_recording(dispatcher),
            AudioState::RecordingStopping { locator } => {
                self.stop_recording(locator.clone(), dispatcher)
            }
            _ => {}
        }
    }
}
