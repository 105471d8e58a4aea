//! WAV persistence
//!
//! Requires the `wav-export` feature. Files are mono 16-bit PCM at the signal's
//! sample rate.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

use crate::error::{Result, SynthError};
use crate::signal::Signal;

fn wav_error(e: hound::Error) -> SynthError {
    match e {
        hound::Error::IoError(io) => SynthError::Io(io),
        other => SynthError::Io(std::io::Error::other(other)),
    }
}

/// Convert PCM i16 samples to f32 (-1.0 to 1.0)
pub fn from_pcm_i16(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / i16::MAX as f32).collect()
}

/// Write `signal` to `path`, clamping samples to -1.0..=1.0
pub fn write_wav(signal: &Signal, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_error)?;
    for sample in signal.to_pcm_i16() {
        writer.write_sample(sample).map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(())
}

/// Read a mono 16-bit WAV back into a signal
pub fn read_wav(path: &Path) -> Result<Signal> {
    let mut reader = WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(SynthError::parameter(
            "path",
            format!(
                "{} is not mono 16-bit PCM ({} channels, {} bits)",
                path.display(),
                spec.channels,
                spec.bits_per_sample
            ),
        ));
    }
    let pcm = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(wav_error)?;
    Ok(Signal::from_samples(spec.sample_rate, from_pcm_i16(&pcm)))
}
