// Capture and encoding both assume 16-bit signed integer PCM. Parameterize
// here if another sample format is ever needed.

#[derive(Debug, Clone, Copy)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    /// Number of samples covering `seconds` of audio.
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * self.channels as f32 * seconds) as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
        }
    }
}
