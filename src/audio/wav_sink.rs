use super::format::AudioFormat;

use anyhow::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

enum SinkCommand {
    WriteChunk(Vec<f32>),
    Finalize { reply: oneshot::Sender<Result<()>> },
}

/// WAV encoder on a dedicated blocking thread.
///
/// All file I/O happens off the async runtime; chunks are forwarded over a
/// channel and written sequentially. Dropping the sink without finalizing
/// ends the thread and leaves whatever was written so far on disk.
pub struct WavSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
}

impl WavSink {
    pub fn create(path: &Path, format: AudioFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: AudioFormat::BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .map_err(|e| anyhow::anyhow!("Failed to create WAV writer: {}", e))?;

        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut writer = Some(writer);
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    SinkCommand::WriteChunk(samples) => {
                        let Some(writer) = writer.as_mut() else { break };
                        for sample in samples {
                            // f32 in [-1.0, 1.0] to i16
                            let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                            if let Err(e) = writer.write_sample(amplitude) {
                                tracing::error!("Failed to write sample: {}", e);
                                break;
                            }
                        }
                    }
                    SinkCommand::Finalize { reply } => {
                        let result = match writer.take() {
                            Some(writer) => writer
                                .finalize()
                                .map_err(|e| anyhow::anyhow!("Failed to finalize WAV: {}", e)),
                            None => Ok(()),
                        };
                        let _ = reply.send(result);
                        return;
                    }
                }
            }
            // Channel closed without an explicit finalize: flush what we have.
            if let Some(writer) = writer.take() {
                if let Err(e) = writer.finalize() {
                    tracing::warn!("Failed to finalize abandoned WAV: {}", e);
                }
            }
        });

        Ok(Self { tx })
    }

    /// Queue samples for writing. The Vec is moved, no copy.
    pub fn write_chunk(&self, samples: Vec<f32>) -> Result<()> {
        self.tx
            .send(SinkCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    /// Flush and close the file.
    pub async fn finalize(self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SinkCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}
