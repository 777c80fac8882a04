//! Post-processing and incremental encoding of TTS audio chunks

mod chunk;
mod format;
mod normalizer;
mod service;
mod session;
mod stream;
mod writer;

pub use chunk::{AudioChunk, PcmChunk, WordTimestamp};
pub use format::{AudioFormat, WriterKey};
pub use normalizer::{amplitude_threshold, trailing_char, AudioNormalizer};
pub use service::{AudioService, ConvertOptions};
pub use session::{SessionHandle, SessionRegistry};
pub use stream::{encode_stream, EncodedSegment, GeneratedChunk, StreamRequest};
pub use writer::{DefaultWriterFactory, PcmWriter, StreamingWriter, WavStreamWriter, WriterFactory};
