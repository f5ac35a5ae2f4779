pub mod capture;
pub mod format;
pub mod wav_sink;

pub use capture::AudioCapture;
pub use format::AudioFormat;
pub use wav_sink::WavSink;
