//! Streaming conversion: normalize, trim and encode each engine chunk

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::chunk::{AudioChunk, PcmChunk};
use super::format::{AudioFormat, WriterKey};
use super::normalizer::AudioNormalizer;
use super::session::{SessionHandle, SessionRegistry, SharedWriter};
use super::writer::{DefaultWriterFactory, WriterFactory};
use crate::config::NormalizerConfig;
use crate::error::{Error, Result};

/// Per-chunk conversion parameters
#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions<'a> {
    /// Speaking speed the chunk was generated at
    pub speed: f32,
    /// Text the engine turned into this chunk
    pub chunk_text: &'a str,
    /// Finalize the session after this chunk
    pub is_last_chunk: bool,
}

impl Default for ConvertOptions<'_> {
    fn default() -> Self {
        Self {
            speed: 1.0,
            chunk_text: "",
            is_last_chunk: false,
        }
    }
}

/// Service for audio format conversions with streaming support
pub struct AudioService {
    normalizer: AudioNormalizer,
    factory: Arc<dyn WriterFactory>,
}

impl AudioService {
    /// Create a service using the bundled encoders
    pub fn new(config: NormalizerConfig) -> Self {
        Self::with_factory(config, Arc::new(DefaultWriterFactory))
    }

    /// Create a service with a custom encoder factory
    pub fn with_factory(config: NormalizerConfig, factory: Arc<dyn WriterFactory>) -> Self {
        Self {
            normalizer: AudioNormalizer::new(&config),
            factory,
        }
    }

    /// Normalizer used when a call does not supply its own
    pub fn normalizer(&self) -> &AudioNormalizer {
        &self.normalizer
    }

    /// Fail with [`Error::EncoderUnavailable`] if no writer can be built for
    /// `format`, before any audio is produced for it
    pub fn ensure_encoder(&self, format: AudioFormat) -> Result<()> {
        if self.factory.supports(format) {
            Ok(())
        } else {
            Err(Error::EncoderUnavailable(format.to_string()))
        }
    }

    /// Start a new encoding session for `format` at `sample_rate`.
    pub fn open_session(
        &self,
        registry: &SessionRegistry,
        format: &str,
        sample_rate: u32,
    ) -> Result<SessionHandle> {
        let format: AudioFormat = format.parse()?;
        self.open_key(registry, WriterKey::new(format, sample_rate))
    }

    fn open_key(&self, registry: &SessionRegistry, key: WriterKey) -> Result<SessionHandle> {
        if registry.contains(&key) {
            warn!("Writer key {} already has a live session", key);
            return Err(Error::SessionConflict(key.to_string()));
        }
        self.ensure_encoder(key.format)?;

        let writer = self.factory.create(key.format, key.sample_rate).map_err(|e| {
            error!("Error creating {} writer: {}", key.format, e);
            Error::conversion_failed(key.format.as_str(), e)
        })?;
        registry.insert(key, writer)
    }

    /// Convert one chunk of an open session.
    ///
    /// Returns the encoded bytes (possibly empty while the encoder buffers)
    /// and the trimmed chunk with re-based timestamps. On the last chunk the
    /// writer is finalized and the session is closed. Any failure closes the
    /// session and is reported as [`Error::ConversionFailed`].
    pub fn convert_session(
        &self,
        registry: &SessionRegistry,
        session: &SessionHandle,
        chunk: AudioChunk,
        options: &ConvertOptions<'_>,
        normalizer: Option<&AudioNormalizer>,
    ) -> Result<(Vec<u8>, PcmChunk)> {
        let key = session.key();
        let writer = registry.writer(session)?;

        match self.process(&writer, chunk, options, normalizer) {
            Ok(output) => {
                if options.is_last_chunk {
                    registry.remove(session);
                    info!("Finalized session {} for {}", session.id(), key);
                }
                Ok(output)
            }
            Err(e) => {
                error!("Error converting audio stream to {}: {}", key.format, e);
                registry.remove(session);
                Err(Error::conversion_failed(key.format.as_str(), e))
            }
        }
    }

    /// Convert one chunk, locating the session by writer key.
    ///
    /// A first chunk opens a new session and fails with
    /// [`Error::SessionConflict`] if one is already live for the key. A
    /// continuation chunk reuses the live session, opening one if none exists.
    #[allow(clippy::too_many_arguments)]
    pub fn convert(
        &self,
        registry: &SessionRegistry,
        chunk: AudioChunk,
        sample_rate: u32,
        format: &str,
        options: &ConvertOptions<'_>,
        is_first_chunk: bool,
        normalizer: Option<&AudioNormalizer>,
    ) -> Result<(Vec<u8>, PcmChunk)> {
        let format: AudioFormat = format.parse()?;
        let key = WriterKey::new(format, sample_rate);

        let session = match registry.handle_for(&key) {
            Some(session) if !is_first_chunk => session,
            _ => self.open_key(registry, key)?,
        };
        self.convert_session(registry, &session, chunk, options, normalizer)
    }

    fn process(
        &self,
        writer: &SharedWriter,
        chunk: AudioChunk,
        options: &ConvertOptions<'_>,
        normalizer: Option<&AudioNormalizer>,
    ) -> Result<(Vec<u8>, PcmChunk)> {
        let normalizer = normalizer.unwrap_or(&self.normalizer);

        // An empty final chunk only flushes the encoder
        let chunk = if chunk.is_empty() && options.is_last_chunk {
            chunk.with_samples(Vec::new())
        } else {
            let samples = normalizer.normalize(&chunk.samples)?;
            normalizer.trim_chunk(
                chunk.with_samples(samples),
                options.chunk_text,
                options.speed,
                options.is_last_chunk,
            )?
        };

        let mut writer = writer
            .lock()
            .map_err(|_| Error::AudioError("encoder writer poisoned by an earlier panic".into()))?;

        let mut bytes = if chunk.is_empty() {
            Vec::new()
        } else {
            writer.write_chunk(&chunk.samples)?
        };

        if options.is_last_chunk {
            bytes.extend(writer.finalize()?);
        }

        debug!(
            "Converted chunk: {} samples -> {} bytes (last: {})",
            chunk.len(),
            bytes.len(),
            options.is_last_chunk
        );
        Ok((bytes, chunk))
    }
}
