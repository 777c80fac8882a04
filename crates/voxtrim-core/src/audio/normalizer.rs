//! Amplitude normalization and silence trimming for engine chunks
//!
//! Chunks are generated independently, so each one carries its own leading
//! and trailing silence. Trimming keeps a short fixed lead-in before speech
//! and a longer, punctuation- and speed-aware tail after it so that pauses
//! between chunks still sound natural once they are concatenated.

use std::collections::HashMap;
use std::ops::Range;

use tracing::debug;

use super::chunk::PcmChunk;
use crate::config::NormalizerConfig;
use crate::error::{Error, Result};

const INT16_MAX: f32 = i16::MAX as f32;
const INT16_MIN: f32 = i16::MIN as f32;

/// Per-stream trimming state derived from [`NormalizerConfig`]
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    sample_rate: u32,
    samples_to_trim: usize,
    samples_to_pad_start: usize,
    dynamic_pad_ms: u32,
    char_multiplier: HashMap<char, f32>,
    silence_threshold_db: f32,
}

impl AudioNormalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            samples_to_trim: ms_to_samples(config.gap_trim_ms, config.sample_rate),
            samples_to_pad_start: ms_to_samples(config.leading_pad_ms, config.sample_rate),
            dynamic_pad_ms: config.dynamic_gap_trim_padding_ms,
            char_multiplier: config.dynamic_gap_trim_padding_char_multiplier.clone(),
            silence_threshold_db: config.silence_threshold_db,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples removed from each end of a chunk before silence detection
    pub fn samples_to_trim(&self) -> usize {
        self.samples_to_trim
    }

    /// Samples kept ahead of the first loud sample
    pub fn samples_to_pad_start(&self) -> usize {
        self.samples_to_pad_start
    }

    /// Convert audio data to the int16 range.
    ///
    /// Samples are scaled by `i16::MAX`, clipped and truncated toward zero.
    pub fn normalize(&self, samples: &[f32]) -> Result<Vec<i16>> {
        if samples.is_empty() {
            return Err(Error::InvalidInput("Empty audio data".into()));
        }

        Ok(samples
            .iter()
            .map(|&sample| (sample * INT16_MAX).clamp(INT16_MIN, INT16_MAX) as i16)
            .collect())
    }

    /// Pad multiplier for a chunk ending in `trailing_char`
    pub fn pad_multiplier(&self, trailing_char: Option<char>) -> f32 {
        trailing_char
            .and_then(|c| self.char_multiplier.get(&c))
            .copied()
            .unwrap_or(1.0)
    }

    /// Dynamic trailing context for a non-final chunk, before the leading pad
    /// is subtracted and before speed scaling
    pub fn dynamic_pad_samples(&self, trailing_char: Option<char>) -> usize {
        let multiplier = f64::from(self.pad_multiplier(trailing_char));
        (f64::from(self.dynamic_pad_ms) * f64::from(self.sample_rate) * multiplier / 1000.0)
            as usize
    }

    /// Samples kept after the last loud sample
    pub fn trailing_pad_samples(
        &self,
        trailing_char: Option<char>,
        speed: f32,
        is_last_chunk: bool,
    ) -> usize {
        let base = if is_last_chunk {
            self.samples_to_pad_start
        } else {
            self.dynamic_pad_samples(trailing_char)
                .saturating_sub(self.samples_to_pad_start)
        };
        (base as f64 / f64::from(speed)).ceil() as usize
    }

    /// Find the range of `samples` to keep using the configured threshold.
    pub fn find_first_last_non_silent(
        &self,
        samples: &[i16],
        trailing_char: Option<char>,
        speed: f32,
        is_last_chunk: bool,
    ) -> (usize, usize) {
        self.find_with_threshold(
            samples,
            trailing_char,
            speed,
            is_last_chunk,
            self.silence_threshold_db,
        )
    }

    /// Find the range of `samples` to keep.
    ///
    /// Returns `(start, end)` with `0 <= start <= end <= samples.len()`. A
    /// buffer with nothing above the threshold is kept whole.
    pub fn find_with_threshold(
        &self,
        samples: &[i16],
        trailing_char: Option<char>,
        speed: f32,
        is_last_chunk: bool,
        threshold_db: f32,
    ) -> (usize, usize) {
        let threshold = amplitude_threshold(threshold_db);
        let is_loud = |sample: &i16| f64::from(sample.unsigned_abs()) > threshold;

        let first_loud = samples.iter().position(is_loud);
        let last_loud = samples.iter().rposition(is_loud);

        let (Some(first_loud), Some(last_loud)) = (first_loud, last_loud) else {
            return (0, samples.len());
        };

        let pad_end = self.trailing_pad_samples(trailing_char, speed, is_last_chunk);
        (
            first_loud.saturating_sub(self.samples_to_pad_start),
            last_loud.saturating_add(pad_end).min(samples.len()),
        )
    }

    /// Range of `samples` kept by [`trim_chunk`](Self::trim_chunk), relative
    /// to the untrimmed buffer.
    pub fn trim_range(
        &self,
        samples: &[i16],
        chunk_text: &str,
        speed: f32,
        is_last_chunk: bool,
    ) -> Result<Range<usize>> {
        validate_speed(speed)?;

        let len = samples.len();
        let window = if len > 2 * self.samples_to_trim {
            self.samples_to_trim..len - self.samples_to_trim
        } else {
            0..len
        };

        let (start, end) = self.find_first_last_non_silent(
            &samples[window.clone()],
            trailing_char(chunk_text),
            speed,
            is_last_chunk,
        );

        // Out-of-range indices would corrupt playback, so clamp instead of failing.
        let end = end.min(window.len());
        let start = start.min(end);
        Ok(window.start + start..window.start + end)
    }

    /// Trim a normalized chunk and re-base its word timestamps.
    pub fn trim_chunk(
        &self,
        mut chunk: PcmChunk,
        chunk_text: &str,
        speed: f32,
        is_last_chunk: bool,
    ) -> Result<PcmChunk> {
        let original_len = chunk.samples.len();
        let keep = self.trim_range(&chunk.samples, chunk_text, speed, is_last_chunk)?;

        chunk.samples.truncate(keep.end);
        chunk.samples.drain(..keep.start);
        chunk.shift_timestamps(-(keep.start as f64 / f64::from(self.sample_rate)));

        debug!(
            "Trimmed chunk from {} to {} samples (offset {})",
            original_len,
            chunk.samples.len(),
            keep.start
        );
        Ok(chunk)
    }
}

impl Default for AudioNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

/// Last non-whitespace character of the text that produced a chunk
pub fn trailing_char(chunk_text: &str) -> Option<char> {
    chunk_text.trim_end().chars().last()
}

/// Convert a dBFS level to an absolute int16 amplitude
pub fn amplitude_threshold(threshold_db: f32) -> f64 {
    f64::from(i16::MAX) * 10f64.powf(f64::from(threshold_db) / 20.0)
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (u64::from(ms) * u64::from(sample_rate) / 1000) as usize
}

fn validate_speed(speed: f32) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "speed must be a positive finite number, got {}",
            speed
        )))
    }
}
