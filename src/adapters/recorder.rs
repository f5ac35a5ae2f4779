//! Microphone capture into WAV files.
//!
//! cpal streams are !Send, so the recorder runs as an actor inside a
//! LocalSet and the rest of the app talks to it over a command channel.

use super::{RecorderAdapter, RecorderError, RecordingGuard, StartedRecording};
use crate::audio::{AudioCapture, AudioFormat, WavSink};
use crate::data::Locator;

use async_trait::async_trait;
use cpal::traits::HostTrait;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};

enum RecorderCommand {
    Start {
        reply: oneshot::Sender<Result<StartedRecording, RecorderError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), RecorderError>>,
    },
    /// Sent by the session guard when it is dropped. Closes the session if
    /// a stop never made it here, e.g. during teardown mid-recording.
    Release,
}

/// Handle to the recorder actor. Cheap to clone, Send + Sync.
#[derive(Clone)]
pub struct DeviceRecorder {
    tx: mpsc::UnboundedSender<RecorderCommand>,
}

impl DeviceRecorder {
    /// Spawn the recorder actor. Must be called inside a LocalSet.
    pub fn spawn(format: AudioFormat, recordings_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::channel(32);

        let actor = RecorderActor {
            format,
            recordings_dir: recordings_dir.into(),
            rx,
            cmd_tx: tx.clone(),
            audio_tx,
            audio_rx,
            session: None,
        };
        tokio::task::spawn_local(actor.run());

        Self { tx }
    }
}

#[async_trait]
impl RecorderAdapter for DeviceRecorder {
    async fn start(&self) -> Result<StartedRecording, RecorderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Start { reply })
            .map_err(|_| RecorderError::ServiceGone)?;
        rx.await.map_err(|_| RecorderError::ServiceGone)?
    }

    async fn stop(&self) -> Result<(), RecorderError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RecorderCommand::Stop { reply })
            .map_err(|_| RecorderError::ServiceGone)?;
        rx.await.map_err(|_| RecorderError::ServiceGone)?
    }
}

struct Session {
    /// Keeps the capture alive; dropping it stops the device callback.
    stream: cpal::Stream,
    sink: WavSink,
    locator: Locator,
}

struct RecorderActor {
    format: AudioFormat,
    recordings_dir: PathBuf,
    rx: mpsc::UnboundedReceiver<RecorderCommand>,
    cmd_tx: mpsc::UnboundedSender<RecorderCommand>,
    audio_tx: mpsc::Sender<Vec<f32>>,
    audio_rx: mpsc::Receiver<Vec<f32>>,
    session: Option<Session>,
}

impl RecorderActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    match cmd {
                        RecorderCommand::Start { reply } => {
                            let _ = reply.send(self.start());
                        }
                        RecorderCommand::Stop { reply } => {
                            let _ = reply.send(self.stop().await);
                        }
                        RecorderCommand::Release => {
                            if self.session.is_some() {
                                tracing::warn!("Recording released without a stop, closing file");
                                if let Err(e) = self.stop().await {
                                    tracing::warn!("Failed to close released recording: {}", e);
                                }
                            }
                        }
                    }
                }
                Some(chunk) = self.audio_rx.recv() => {
                    if let Some(session) = &self.session {
                        if let Err(e) = session.sink.write_chunk(chunk) {
                            tracing::warn!("Dropping audio chunk: {}", e);
                        }
                    }
                }
            }
        }

        // Actor shutting down with a live session: flush it.
        if self.session.is_some() {
            if let Err(e) = self.stop().await {
                tracing::warn!("Failed to finalize recording on shutdown: {}", e);
            }
        }
    }

    fn start(&mut self) -> Result<StartedRecording, RecorderError> {
        if self.session.is_some() {
            return Err(RecorderError::Capture("capture already in progress".into()));
        }
        if cpal::default_host().default_input_device().is_none() {
            return Err(RecorderError::NoInputDevice);
        }

        std::fs::create_dir_all(&self.recordings_dir)?;
        let path = self.recordings_dir.join(recording_file_name());

        let sink = WavSink::create(&path, self.format)
            .map_err(|e| RecorderError::CreateOutput(std::io::Error::other(e)))?;
        let stream = AudioCapture::start(self.format, self.audio_tx.clone())
            .map_err(|e| RecorderError::Capture(e.to_string()))?;

        let locator = Locator::new(path);
        self.session = Some(Session {
            stream,
            sink,
            locator: locator.clone(),
        });

        let release_tx = self.cmd_tx.clone();
        let guard = RecordingGuard::new(move || {
            let _ = release_tx.send(RecorderCommand::Release);
        });

        tracing::info!("Recording to {}", locator);
        Ok(StartedRecording { locator, guard })
    }

    async fn stop(&mut self) -> Result<(), RecorderError> {
        let Some(session) = self.session.take() else {
            return Err(RecorderError::NotRecording);
        };
        let Session {
            stream,
            sink,
            locator,
        } = session;

        // Stop the device callback first so no new samples arrive.
        drop(stream);

        // Whatever the bridge already handed over still belongs to this file.
        while let Ok(chunk) = self.audio_rx.try_recv() {
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::warn!("Dropping trailing audio chunk: {}", e);
            }
        }

        // Fresh channel so stale chunks never bleed into the next session.
        let (audio_tx, audio_rx) = mpsc::channel(32);
        self.audio_tx = audio_tx;
        self.audio_rx = audio_rx;

        sink.finalize()
            .await
            .map_err(|e| RecorderError::Capture(e.to_string()))?;

        tracing::info!("Recording finished: {}", locator);
        Ok(())
    }
}

fn recording_file_name() -> String {
    format!("recording-{}.wav", uuid::Uuid::new_v4().simple())
}
