//! Offline rendering of the sample stream
//!
//! The chip produces unipolar samples in [0, 1). Before a file is written the
//! stream is centered with the [`DcFilter`], optionally normalized and faded,
//! and duplicated to stereo when requested.

pub mod wav;

pub use wav::{export_to_wav, export_to_wav_with_config, write_wav_file};

use crate::streaming::{DcFilter, DEFAULT_SAMPLE_RATE};

/// Configuration for audio export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    /// Sample rate written to the file header (default: 44100 Hz)
    pub sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Whether to normalize audio to prevent clipping
    pub normalize: bool,
    /// Remove the DC offset of the unipolar chip output
    pub dc_filter: bool,
    /// Fade out duration in seconds (0 = no fade)
    pub fade_out_duration: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            normalize: true,
            dc_filter: true,
            fade_out_duration: 0.0,
        }
    }
}

impl ExportConfig {
    /// Create config for stereo export
    pub fn stereo() -> Self {
        Self {
            channels: 2,
            ..Default::default()
        }
    }

    /// Set the sample rate
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Enable or disable normalization
    pub fn normalize(mut self, enabled: bool) -> Self {
        self.normalize = enabled;
        self
    }

    /// Set the fade-out length in seconds
    pub fn fade_out(mut self, seconds: f32) -> Self {
        self.fade_out_duration = seconds;
        self
    }

    /// Keep the raw unipolar signal
    pub fn raw(mut self) -> Self {
        self.dc_filter = false;
        self
    }
}

/// Apply the configured post-processing in place
pub fn post_process(samples: &mut [f32], config: &ExportConfig) {
    if config.dc_filter {
        DcFilter::new().process_block(samples);
    }
    if config.normalize {
        normalize_samples(samples);
    }
    if config.fade_out_duration > 0.0 {
        apply_fade_out(samples, config.fade_out_duration, config.sample_rate);
    }
}

/// Scale down so the peak stays at 0.95
fn normalize_samples(samples: &mut [f32]) {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if peak > 0.95 {
        let scale = 0.95 / peak;
        for sample in samples.iter_mut() {
            *sample *= scale;
        }
    }
}

/// Linear fade over the last `fade_duration` seconds
fn apply_fade_out(samples: &mut [f32], fade_duration: f32, sample_rate: u32) {
    let fade_samples = (fade_duration * sample_rate as f32) as usize;
    if fade_samples == 0 {
        return;
    }
    let start_fade = samples.len().saturating_sub(fade_samples);
    for (i, sample) in samples.iter_mut().enumerate().skip(start_fade) {
        let progress = (i - start_fade) as f32 / fade_samples as f32;
        *sample *= 1.0 - progress;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_normalize_samples() {
        let mut samples = vec![0.5, 1.5, -1.2, 0.8];
        normalize_samples(&mut samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert_abs_diff_eq!(peak, 0.95, epsilon = 1e-6);

        let mut quiet = vec![0.1, -0.2];
        normalize_samples(&mut quiet);
        assert_eq!(quiet, vec![0.1, -0.2]);
    }

    #[test]
    fn test_fade_out() {
        let mut samples = vec![1.0; 100];
        apply_fade_out(&mut samples, 0.5, 100);
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[49], 1.0);
        assert_abs_diff_eq!(samples[50], 1.0);
        assert!(samples[99] < 0.05);
    }

    #[test]
    fn test_post_process_centers_signal() {
        let mut samples: Vec<f32> = (0..8192)
            .map(|i| if (i / 50) % 2 == 0 { 0.5 } else { 0.0 })
            .collect();
        post_process(&mut samples, &ExportConfig::default());
        let tail = &samples[4096..];
        let mean = tail.iter().sum::<f32>() / tail.len() as f32;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.02);
    }

    #[test]
    fn test_builder() {
        let config = ExportConfig::stereo().sample_rate(22_050).normalize(false).raw();
        assert_eq!(config.channels, 2);
        assert_eq!(config.sample_rate, 22_050);
        assert!(!config.normalize);
        assert!(!config.dc_filter);
    }
}
