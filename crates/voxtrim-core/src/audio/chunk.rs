//! Audio chunks as produced by the inference engine

use serde::{Deserialize, Serialize};

/// Timing of a single spoken word, in seconds from the start of its chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl WordTimestamp {
    pub fn new(word: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            word: word.into(),
            start_time,
            end_time,
        }
    }

    /// Move both bounds by `seconds` (negative moves earlier)
    pub fn shift(&mut self, seconds: f64) {
        self.start_time += seconds;
        self.end_time += seconds;
    }
}

/// One unit of synthesized audio plus optional per-word timing.
///
/// Engine output carries `f32` samples; after normalization the same chunk
/// carries `i16` samples (see [`PcmChunk`]).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk<S = f32> {
    pub samples: Vec<S>,
    pub word_timestamps: Option<Vec<WordTimestamp>>,
}

/// A chunk after amplitude normalization
pub type PcmChunk = AudioChunk<i16>;

impl<S> AudioChunk<S> {
    pub fn new(samples: Vec<S>) -> Self {
        Self {
            samples,
            word_timestamps: None,
        }
    }

    pub fn with_timestamps(samples: Vec<S>, word_timestamps: Vec<WordTimestamp>) -> Self {
        Self {
            samples,
            word_timestamps: Some(word_timestamps),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Replace the samples, keeping the timestamps
    pub fn with_samples<T>(self, samples: Vec<T>) -> AudioChunk<T> {
        AudioChunk {
            samples,
            word_timestamps: self.word_timestamps,
        }
    }

    /// Duration in seconds at `sample_rate`
    pub fn duration_secs(&self, sample_rate: u32) -> f64 {
        self.samples.len() as f64 / sample_rate as f64
    }

    /// Shift every attached timestamp by `seconds`
    pub fn shift_timestamps(&mut self, seconds: f64) {
        if let Some(timestamps) = self.word_timestamps.as_mut() {
            for timestamp in timestamps.iter_mut() {
                timestamp.shift(seconds);
            }
        }
    }
}
