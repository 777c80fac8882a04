//! Synthetic speech engine.
//!
//! Renders each word as a short sine tone surrounded by the kind of leading
//! and trailing silence a real TTS model produces, so the post-processing
//! pipeline can be exercised without model weights.

use async_stream::stream;
use futures::Stream;
use voxtrim_core::{AudioChunk, GeneratedChunk, Result, WordTimestamp};

/// Characters that end one engine chunk
const CHUNK_BREAKS: &[char] = &[',', '.', '!', '?', ';', ':'];

const LEAD_SILENCE_MS: f32 = 120.0;
const TAIL_SILENCE_MS: f32 = 250.0;
const WORD_GAP_MS: f32 = 40.0;
const FADE_MS: f32 = 8.0;
const AMPLITUDE: f32 = 0.4;

#[derive(Debug, Clone)]
pub struct SyntheticVoice {
    sample_rate: u32,
}

impl SyntheticVoice {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Generate one chunk per clause of `text`
    pub fn generate(
        &self,
        text: String,
        voice: String,
        speed: f32,
    ) -> impl Stream<Item = Result<GeneratedChunk>> + Send + 'static {
        let engine = self.clone();
        stream! {
            for piece in split_text(&text) {
                let audio = engine.render(&piece, &voice, speed);
                let chunk: Result<GeneratedChunk> = Ok(GeneratedChunk::new(audio, piece));
                yield chunk;
                tokio::task::yield_now().await;
            }
        }
    }

    /// Render one clause with chunk-relative word timestamps
    pub fn render(&self, text: &str, voice: &str, speed: f32) -> AudioChunk {
        let base_freq = 140.0 + (voice.bytes().map(u32::from).sum::<u32>() % 120) as f32;
        let mut samples = self.silence(LEAD_SILENCE_MS);
        let mut timestamps = Vec::new();

        for (i, word) in text.split_whitespace().enumerate() {
            if i > 0 {
                samples.extend(self.silence(WORD_GAP_MS / speed));
            }

            let duration_ms = (80.0 + 45.0 * word.chars().count() as f32) / speed;
            let freq = base_freq + (word.len() % 7) as f32 * 15.0;
            let start = samples.len();
            samples.extend(self.tone(freq, duration_ms));

            timestamps.push(WordTimestamp::new(
                word.trim_matches(|c: char| CHUNK_BREAKS.contains(&c)),
                start as f64 / f64::from(self.sample_rate),
                samples.len() as f64 / f64::from(self.sample_rate),
            ));
        }

        samples.extend(self.silence(TAIL_SILENCE_MS));
        AudioChunk::with_timestamps(samples, timestamps)
    }

    fn samples_for(&self, ms: f32) -> usize {
        (self.sample_rate as f32 * ms / 1000.0) as usize
    }

    fn silence(&self, ms: f32) -> Vec<f32> {
        vec![0.0; self.samples_for(ms)]
    }

    fn tone(&self, freq: f32, ms: f32) -> Vec<f32> {
        let len = self.samples_for(ms);
        let fade = self.samples_for(FADE_MS).min(len / 2).max(1);
        (0..len)
            .map(|i| {
                let time = i as f32 / self.sample_rate as f32;
                let envelope = (i.min(len - 1 - i) as f32 / fade as f32).min(1.0);
                (2.0 * std::f32::consts::PI * freq * time).sin() * AMPLITUDE * envelope
            })
            .collect()
    }
}

/// Split text after each chunk-breaking punctuation mark
pub fn split_text(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        current.push(c);
        if CHUNK_BREAKS.contains(&c) {
            push_piece(&mut pieces, &current);
            current.clear();
        }
    }
    push_piece(&mut pieces, &current);
    pieces
}

fn push_piece(pieces: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if piece.chars().any(char::is_alphanumeric) {
        pieces.push(piece.to_string());
    }
}
