//! WAV file export

use super::{post_process, ExportConfig};
use crate::system::SoundSystem;
use crate::{Ay8051Error, Result};
use log::info;
use std::path::Path;

/// Render `seconds` of output from `system` into a mono 16-bit WAV file
///
/// # Examples
///
/// ```no_run
/// use ay8051::export::export_to_wav;
/// use ay8051::{SoundSystem, SystemConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut system = SoundSystem::new(SystemConfig::default())?;
/// system.load_firmware(&std::fs::read("sound_cpu_8051.bin")?)?;
/// system.send_bytes(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);
/// export_to_wav(&mut system, 2.0, "note.wav")?;
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(system: &mut SoundSystem, seconds: f32, output_path: P) -> Result<()> {
    let config = ExportConfig::default().sample_rate(system.config().sample_rate);
    export_to_wav_with_config(system, seconds, output_path, config)
}

/// Render `seconds` of output with custom post-processing and channel layout
pub fn export_to_wav_with_config<P: AsRef<Path>>(
    system: &mut SoundSystem,
    seconds: f32,
    output_path: P,
    config: ExportConfig,
) -> Result<()> {
    let total_samples = (seconds.max(0.0) * system.config().sample_rate as f32) as usize;

    info!("rendering {} samples ({:.1}s)", total_samples, seconds);
    let mut samples = system.render(total_samples)?;
    post_process(&mut samples, &config);

    let final_samples = if config.channels == 2 {
        mono_to_stereo(&samples)
    } else {
        samples
    };

    info!("writing {}", output_path.as_ref().display());
    write_wav_file(output_path.as_ref(), &final_samples, config.sample_rate, config.channels)
}

/// Convert mono samples to stereo (duplicate each sample)
fn mono_to_stereo(mono: &[f32]) -> Vec<f32> {
    let mut stereo = Vec::with_capacity(mono.len() * 2);
    for &sample in mono {
        stereo.push(sample);
        stereo.push(sample);
    }
    stereo
}

/// Write interleaved samples as 16-bit PCM
pub fn write_wav_file(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Ay8051Error::Other(format!("Failed to create WAV file: {}", e)))?;

    for &sample in samples {
        let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(sample_i16)
            .map_err(|e| Ay8051Error::Other(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| Ay8051Error::Other(format!("Failed to finalize WAV file: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemConfig;

    #[test]
    fn test_mono_to_stereo() {
        let mono = vec![0.1, 0.2, 0.3];
        let stereo = mono_to_stereo(&mono);

        assert_eq!(stereo.len(), 6);
        assert_eq!(stereo, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_export_writes_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.wav");

        let mut system = SoundSystem::new(SystemConfig::default()).unwrap();
        system.load_firmware(&[0x80, 0xFE]).unwrap();
        system.send_bytes(&[0xB5, 0xA4, 0x00, 0xDD, 0x01, 0x0F, 0xB0]);
        export_to_wav_with_config(&mut system, 0.1, &path, ExportConfig::stereo()).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 4410 * 2);
    }
}
