//! Playlist playback through rodio.
//!
//! The output stream is !Send, so a dedicated thread owns it together with
//! the sink. The thread polls its command channel and mirrors sink state
//! into a shared status snapshot the sync accessors read from.

use super::{PlayerAdapter, PlayerError};
use crate::data::AudioMetadata;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

enum PlayerCommand {
    Play {
        items: Vec<AudioMetadata>,
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
}

struct QueueItem {
    media_id: String,
    duration_ms: u64,
}

/// Snapshot of what the playback thread is doing, refreshed every poll.
#[derive(Default)]
struct Status {
    queue: Vec<QueueItem>,
    /// Sources still in the sink, current one included.
    remaining: usize,
    /// Position within the current source.
    position: Duration,
    playing: bool,
}

fn current_index(status: &Status) -> Option<usize> {
    if !status.playing || status.remaining == 0 {
        return None;
    }
    Some(status.queue.len() - status.remaining.min(status.queue.len()))
}

fn progress_within(position: Duration, duration_ms: u64) -> f32 {
    if duration_ms == 0 {
        return 0.0;
    }
    (position.as_millis() as f32 / duration_ms as f32).clamp(0.0, 1.0)
}

pub struct QueuePlayer {
    tx: mpsc::UnboundedSender<PlayerCommand>,
    status: Arc<Mutex<Status>>,
    finished: broadcast::Sender<()>,
}

impl QueuePlayer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(Mutex::new(Status::default()));
        let (finished, _) = broadcast::channel(8);

        let thread_status = status.clone();
        let thread_finished = finished.clone();
        std::thread::spawn(move || playback_thread(rx, thread_status, thread_finished));

        Self {
            tx,
            status,
            finished,
        }
    }
}

impl Default for QueuePlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlayerAdapter for QueuePlayer {
    async fn play(&self, items: Vec<AudioMetadata>) -> Result<(), PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Play { items, reply })
            .map_err(|_| PlayerError::ServiceGone)?;
        rx.await.map_err(|_| PlayerError::ServiceGone)?
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PlayerCommand::Stop { reply })
            .map_err(|_| PlayerError::ServiceGone)?;
        rx.await.map_err(|_| PlayerError::ServiceGone)?
    }

    fn current_media_id(&self) -> Option<String> {
        let status = self.status.lock().unwrap();
        current_index(&status).map(|i| status.queue[i].media_id.clone())
    }

    fn current_position(&self) -> Duration {
        self.status.lock().unwrap().position
    }

    fn current_progress(&self) -> f32 {
        let status = self.status.lock().unwrap();
        match current_index(&status) {
            Some(i) => progress_within(status.position, status.queue[i].duration_ms),
            None => 0.0,
        }
    }

    fn has_next(&self) -> bool {
        self.status.lock().unwrap().remaining > 1
    }

    fn subscribe_finished(&self) -> broadcast::Receiver<()> {
        self.finished.subscribe()
    }
}

fn playback_thread(
    mut rx: mpsc::UnboundedReceiver<PlayerCommand>,
    status: Arc<Mutex<Status>>,
    finished: broadcast::Sender<()>,
) {
    // Opened lazily so a machine without an output device can still browse
    // and record.
    let mut stream: Option<OutputStream> = None;
    let mut sink: Option<Sink> = None;

    loop {
        match rx.try_recv() {
            Ok(PlayerCommand::Play { items, reply }) => {
                let result = start_playlist(&mut stream, &mut sink, &status, items);
                let _ = reply.send(result);
            }
            Ok(PlayerCommand::Stop { reply }) => {
                if let Some(sink) = sink.take() {
                    sink.stop();
                }
                let mut status = status.lock().unwrap();
                status.playing = false;
                status.remaining = 0;
                status.position = Duration::ZERO;
                let _ = reply.send(Ok(()));
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        if let Some(sink) = &sink {
            let mut status = status.lock().unwrap();
            status.remaining = sink.len();
            status.position = sink.get_pos();
            // A manual stop clears `playing` before the sink drains, so this
            // fires only when the playlist runs out on its own.
            if status.playing && sink.empty() {
                status.playing = false;
                status.remaining = 0;
                let _ = finished.send(());
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

fn start_playlist(
    stream: &mut Option<OutputStream>,
    sink: &mut Option<Sink>,
    status: &Mutex<Status>,
    items: Vec<AudioMetadata>,
) -> Result<(), PlayerError> {
    if stream.is_none() {
        let opened = OutputStreamBuilder::open_default_stream()
            .map_err(|e| PlayerError::Output(e.to_string()))?;
        *stream = Some(opened);
    }

    if let Some(old) = sink.take() {
        old.stop();
    }
    let new_sink = Sink::connect_new(stream.as_ref().unwrap().mixer());

    let mut queue = Vec::with_capacity(items.len());
    for item in items {
        let file = match File::open(item.locator.path()) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!("Skipping unreadable item {}: {}", item.locator, e);
                continue;
            }
        };
        match Decoder::new(BufReader::new(file)) {
            Ok(source) => {
                new_sink.append(source);
                queue.push(QueueItem {
                    media_id: item.media_id,
                    duration_ms: item.duration_ms,
                });
            }
            Err(e) => {
                tracing::warn!("Skipping undecodable item {}: {}", item.locator, e);
            }
        }
    }

    if queue.is_empty() {
        new_sink.stop();
        return Err(PlayerError::EmptyPlaylist);
    }

    let mut status = status.lock().unwrap();
    status.remaining = queue.len();
    status.queue = queue;
    status.position = Duration::ZERO;
    status.playing = true;
    *sink = Some(new_sink);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_with(queue_len: usize, remaining: usize, playing: bool) -> Status {
        Status {
            queue: (0..queue_len)
                .map(|i| QueueItem {
                    media_id: format!("item-{i}"),
                    duration_ms: 1000,
                })
                .collect(),
            remaining,
            position: Duration::ZERO,
            playing,
        }
    }

    #[test]
    fn current_index_walks_the_queue_as_items_drain() {
        assert_eq!(current_index(&status_with(3, 3, true)), Some(0));
        assert_eq!(current_index(&status_with(3, 1, true)), Some(2));
    }

    #[test]
    fn current_index_is_none_when_stopped_or_drained() {
        assert_eq!(current_index(&status_with(3, 2, false)), None);
        assert_eq!(current_index(&status_with(3, 0, true)), None);
    }

    #[test]
    fn progress_is_clamped_and_safe_on_zero_duration() {
        assert_eq!(progress_within(Duration::from_millis(500), 1000), 0.5);
        assert_eq!(progress_within(Duration::from_millis(1500), 1000), 1.0);
        assert_eq!(progress_within(Duration::from_millis(500), 0), 0.0);
    }
}
