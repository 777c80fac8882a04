//! Incremental encoder-writers, one per output stream

use hound::{SampleFormat, WavSpec};
use std::io::Cursor;
use tracing::debug;

use super::format::AudioFormat;
use crate::error::{Error, Result};

/// A stateful encoder fed with consecutive chunks of one stream.
///
/// `write_chunk` may return nothing while the encoder buffers frames;
/// `finalize` flushes whatever is left and is called exactly once.
pub trait StreamingWriter: Send {
    fn write_chunk(&mut self, samples: &[i16]) -> Result<Vec<u8>>;

    fn finalize(&mut self) -> Result<Vec<u8>>;
}

/// Builds a fresh writer for each new session
pub trait WriterFactory: Send + Sync {
    fn create(&self, format: AudioFormat, sample_rate: u32) -> Result<Box<dyn StreamingWriter>>;

    /// Whether `create` can build a writer for `format` at all
    fn supports(&self, _format: AudioFormat) -> bool {
        true
    }
}

/// Factory for the encoders bundled with this crate (`pcm` and `wav`)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWriterFactory;

impl WriterFactory for DefaultWriterFactory {
    fn create(&self, format: AudioFormat, sample_rate: u32) -> Result<Box<dyn StreamingWriter>> {
        match format {
            AudioFormat::Pcm => Ok(Box::new(PcmWriter::new())),
            AudioFormat::Wav => Ok(Box::new(WavStreamWriter::new(sample_rate, 1))),
            other => Err(Error::EncoderUnavailable(other.to_string())),
        }
    }

    fn supports(&self, format: AudioFormat) -> bool {
        matches!(format, AudioFormat::Pcm | AudioFormat::Wav)
    }
}

/// Raw little-endian i16 samples, passed straight through
#[derive(Debug, Default)]
pub struct PcmWriter {
    finalized: bool,
}

impl PcmWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamingWriter for PcmWriter {
    fn write_chunk(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::AudioError("write after finalize".into()));
        }
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(bytes)
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::AudioError("writer already finalized".into()));
        }
        self.finalized = true;
        Ok(Vec::new())
    }
}

/// 16-bit WAV.
///
/// The RIFF header needs the final data length, so samples are buffered and
/// the whole file is produced on finalize.
pub struct WavStreamWriter {
    spec: WavSpec,
    samples: Vec<i16>,
    finalized: bool,
}

impl WavStreamWriter {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            spec: WavSpec {
                channels,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
            samples: Vec::new(),
            finalized: false,
        }
    }
}

impl StreamingWriter for WavStreamWriter {
    fn write_chunk(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::AudioError("write after finalize".into()));
        }
        self.samples.extend_from_slice(samples);
        Ok(Vec::new())
    }

    fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::AudioError("writer already finalized".into()));
        }
        self.finalized = true;

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, self.spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        debug!(
            "Encoded {} samples to WAV ({} bytes)",
            self.samples.len(),
            buffer.get_ref().len()
        );
        self.samples = Vec::new();
        Ok(buffer.into_inner())
    }
}
