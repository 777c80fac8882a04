//! Voxtrim Core - streaming post-processing for TTS audio
//!
//! Sits between a text-to-speech engine that emits many small audio chunks
//! and a client consuming one continuous encoded response. Each chunk is:
//! - normalized to 16-bit integer samples
//! - trimmed of leading/trailing silence, with padding that depends on the
//!   chunk's final punctuation and the speaking speed
//! - re-timed, so word timestamps match the trimmed audio
//! - fed to a per-stream incremental encoder that is finalized exactly once
//!
//! # Example
//!
//! ```ignore
//! use voxtrim_core::{AudioService, ConvertOptions, NormalizerConfig, SessionRegistry};
//!
//! let service = AudioService::new(NormalizerConfig::default());
//! let registry = SessionRegistry::new();
//! let session = service.open_session(&registry, "pcm", 24000)?;
//!
//! let options = ConvertOptions { chunk_text: "Hello.", is_last_chunk: true, ..Default::default() };
//! let (bytes, chunk) = service.convert_session(&registry, &session, engine_chunk, &options, None)?;
//! ```

pub mod audio;
pub mod config;
pub mod error;

pub use audio::{
    encode_stream, AudioChunk, AudioFormat, AudioNormalizer, AudioService, ConvertOptions,
    EncodedSegment, GeneratedChunk, PcmChunk, SessionHandle, SessionRegistry, StreamRequest,
    StreamingWriter, WordTimestamp, WriterFactory, WriterKey,
};
pub use config::{NormalizerConfig, ServerConfig};
pub use error::{Error, Result};
