//! Drives a whole engine stream through one encoding session

use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use super::chunk::{AudioChunk, WordTimestamp};
use super::format::AudioFormat;
use super::service::{AudioService, ConvertOptions};
use super::session::{SessionHandle, SessionRegistry};
use crate::error::{Error, Result};

/// One model output step: audio plus the text it was generated from
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    pub audio: AudioChunk,
    pub text: String,
}

impl GeneratedChunk {
    pub fn new(audio: AudioChunk, text: impl Into<String>) -> Self {
        Self {
            audio,
            text: text.into(),
        }
    }
}

/// Output parameters for a stream
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub format: String,
    pub sample_rate: u32,
    pub speed: f32,
    pub return_timestamps: bool,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            format: "wav".to_string(),
            sample_rate: 24000,
            speed: 1.0,
            return_timestamps: false,
        }
    }
}

/// Encoded output for one input chunk
#[derive(Debug, Clone)]
pub struct EncodedSegment {
    pub data: Bytes,
    pub format: AudioFormat,
    pub sample_count: usize,
    pub duration_ms: f32,
    /// Word timings relative to the start of the whole stream
    pub word_timestamps: Vec<WordTimestamp>,
}

impl EncodedSegment {
    pub fn new(
        data: Vec<u8>,
        format: AudioFormat,
        sample_count: usize,
        sample_rate: u32,
        word_timestamps: Vec<WordTimestamp>,
    ) -> Self {
        let duration_ms = (sample_count as f32 / sample_rate as f32) * 1000.0;
        Self {
            data: Bytes::from(data),
            format,
            sample_count,
            duration_ms,
            word_timestamps,
        }
    }
}

/// Aborts the session unless the final chunk went through.
struct SessionGuard {
    registry: SessionRegistry,
    handle: SessionHandle,
    completed: bool,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.registry.abort(&self.handle);
        }
    }
}

/// Encode an engine stream chunk by chunk.
///
/// The session opens with the first chunk. Each chunk is converted and
/// yielded as soon as the engine produces it; once the engine is done an
/// empty final chunk finalizes the writer, and its bytes (the WAV file, for
/// example) come out as one last segment with no samples. If the engine
/// fails, a conversion fails, or the returned stream is dropped early, the
/// session is aborted.
///
/// `request.sample_rate` must match the service's normalizer, since it keys
/// the writer while the normalizer times the segments.
pub fn encode_stream<S>(
    service: Arc<AudioService>,
    registry: SessionRegistry,
    request: StreamRequest,
    chunks: S,
) -> impl Stream<Item = Result<EncodedSegment>>
where
    S: Stream<Item = Result<GeneratedChunk>>,
{
    try_stream! {
        let format: AudioFormat = request.format.parse()?;
        let sample_rate = service.normalizer().sample_rate();
        if request.sample_rate != sample_rate {
            Err(Error::InvalidInput(format!(
                "stream sample rate {} does not match the normalizer rate {}",
                request.sample_rate, sample_rate
            )))?;
        }

        let mut chunks = Box::pin(chunks);
        let mut guard: Option<SessionGuard> = None;
        let mut offset_secs = 0.0f64;
        let mut index = 0usize;

        while let Some(item) = chunks.next().await {
            let generated = item?;
            let handle = match guard.as_ref().map(|guard| guard.handle.clone()) {
                Some(handle) => handle,
                None => {
                    let handle = service.open_session(&registry, format.as_str(), sample_rate)?;
                    guard = Some(SessionGuard {
                        registry: registry.clone(),
                        handle: handle.clone(),
                        completed: false,
                    });
                    handle
                }
            };

            let options = ConvertOptions {
                speed: request.speed,
                chunk_text: &generated.text,
                is_last_chunk: false,
            };
            let (data, chunk) =
                service.convert_session(&registry, &handle, generated.audio, &options, None)?;

            let word_timestamps = if request.return_timestamps {
                let mut chunk = chunk.clone();
                chunk.shift_timestamps(offset_secs);
                chunk.word_timestamps.unwrap_or_default()
            } else {
                Vec::new()
            };
            offset_secs += chunk.duration_secs(sample_rate);

            debug!("Segment {}: {} bytes", index, data.len());
            index += 1;

            yield EncodedSegment::new(data, format, chunk.len(), sample_rate, word_timestamps);
        }

        if let Some(mut guard) = guard {
            let options = ConvertOptions {
                speed: request.speed,
                chunk_text: "",
                is_last_chunk: true,
            };
            let (data, _) = service.convert_session(
                &registry,
                &guard.handle,
                AudioChunk::new(Vec::new()),
                &options,
                None,
            )?;
            guard.completed = true;

            debug!("Finalized stream after {} segments: {} bytes", index, data.len());
            yield EncodedSegment::new(data, format, 0, sample_rate, Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;
    use futures::channel::mpsc;
    use futures::{stream, TryStreamExt};
    use std::time::Duration;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i >= len / 4 && i < 3 * len / 4 { 0.5 } else { 0.0 })
            .collect()
    }

    fn chunk(len: usize, text: &str, words: &[(&str, f64, f64)]) -> GeneratedChunk {
        let timestamps = words
            .iter()
            .map(|&(word, start, end)| WordTimestamp::new(word, start, end))
            .collect();
        GeneratedChunk::new(AudioChunk::with_timestamps(tone(len), timestamps), text)
    }

    fn pcm_request() -> StreamRequest {
        StreamRequest {
            format: "pcm".to_string(),
            return_timestamps: true,
            ..Default::default()
        }
    }

    fn service() -> Arc<AudioService> {
        Arc::new(AudioService::new(NormalizerConfig::default()))
    }

    #[tokio::test]
    async fn test_segments_follow_input_order() {
        let registry = SessionRegistry::new();
        let source = stream::iter(vec![
            Ok(chunk(9600, "Hello,", &[("Hello", 0.1, 0.3)])),
            Ok(chunk(4800, "world", &[("world", 0.05, 0.15)])),
            Ok(chunk(9600, "today.", &[("today", 0.1, 0.3)])),
        ]);

        let segments: Vec<EncodedSegment> =
            encode_stream(service(), registry.clone(), pcm_request(), source)
                .try_collect()
                .await
                .unwrap();

        // One segment per chunk, then the finalize segment
        assert_eq!(segments.len(), 4);
        assert!(registry.is_empty());
        for segment in &segments {
            assert_eq!(segment.data.len(), segment.sample_count * 2);
            assert_eq!(segment.format, AudioFormat::Pcm);
        }
        assert_eq!(segments[3].sample_count, 0);
        assert!(segments[3].word_timestamps.is_empty());

        // Timestamps are moved onto the stream timeline
        let first_secs = segments[0].sample_count as f64 / 24000.0;
        let second = &segments[1].word_timestamps[0];
        assert_eq!(second.word, "world");
        assert!(second.start_time > first_secs - 0.1);
        assert!(segments[2].word_timestamps[0].start_time > second.end_time);
    }

    #[tokio::test]
    async fn test_timestamps_omitted_unless_requested() {
        let request = StreamRequest {
            return_timestamps: false,
            ..pcm_request()
        };
        let source = stream::iter(vec![Ok(chunk(4800, "Hi.", &[("Hi", 0.1, 0.2)]))]);
        let segments: Vec<EncodedSegment> = encode_stream(service(), SessionRegistry::new(), request, source)
            .try_collect()
            .await
            .unwrap();
        assert!(segments[0].word_timestamps.is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_opens_nothing() {
        let registry = SessionRegistry::new();
        let source = stream::iter(Vec::<Result<GeneratedChunk>>::new());
        let segments: Vec<EncodedSegment> = encode_stream(service(), registry.clone(), pcm_request(), source)
            .try_collect()
            .await
            .unwrap();
        assert!(segments.is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dropped_stream_aborts_session() {
        let registry = SessionRegistry::new();
        let source = stream::iter(vec![
            Ok(chunk(4800, "one,", &[])),
            Ok(chunk(4800, "two,", &[])),
            Ok(chunk(4800, "three.", &[])),
        ]);

        let mut segments = Box::pin(encode_stream(service(), registry.clone(), pcm_request(), source));
        let first = segments.next().await.unwrap().unwrap();
        assert!(!first.data.is_empty());
        assert_eq!(registry.len(), 1);

        drop(segments);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_aborts_session() {
        let registry = SessionRegistry::new();
        let source = stream::iter(vec![
            Ok(chunk(4800, "one,", &[])),
            Err(Error::InvalidInput("engine crashed".into())),
        ]);

        let results: Vec<Result<EncodedSegment>> =
            encode_stream(service(), registry.clone(), pcm_request(), source)
                .collect()
                .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::InvalidInput(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsupported_format_fails_first() {
        let request = StreamRequest {
            format: "midi".to_string(),
            ..Default::default()
        };
        let source = stream::iter(vec![Ok(chunk(4800, "Hi.", &[]))]);
        let registry = SessionRegistry::new();

        let results: Vec<Result<EncodedSegment>> = tokio_test::block_on(
            encode_stream(service(), registry.clone(), request, source).collect(),
        );
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::UnsupportedFormat(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_wav_stream_emits_file_at_end() {
        let request = StreamRequest {
            format: "wav".to_string(),
            ..Default::default()
        };
        let source = stream::iter(vec![
            Ok(chunk(4800, "Hello,", &[])),
            Ok(chunk(4800, "there.", &[])),
        ]);

        let segments: Vec<EncodedSegment> = tokio_test::block_on(
            encode_stream(service(), SessionRegistry::new(), request, source).try_collect(),
        )
        .unwrap();

        assert_eq!(segments.len(), 3);
        assert!(segments[0].data.is_empty());
        assert!(segments[1].data.is_empty());
        let total_samples: usize = segments.iter().map(|s| s.sample_count).sum();
        assert_eq!(&segments[2].data[0..4], b"RIFF");
        assert_eq!(segments[2].data.len(), 44 + total_samples * 2);
    }

    #[tokio::test]
    async fn test_segment_ready_before_next_chunk() {
        let registry = SessionRegistry::new();
        let (tx, rx) = mpsc::unbounded::<Result<GeneratedChunk>>();
        let mut segments = Box::pin(encode_stream(service(), registry.clone(), pcm_request(), rx));

        tx.unbounded_send(Ok(chunk(4800, "Hello,", &[("Hello", 0.1, 0.2)])))
            .unwrap();
        let first = tokio::time::timeout(Duration::from_millis(200), segments.next())
            .await
            .expect("first segment waited for the next chunk")
            .unwrap()
            .unwrap();
        assert!(first.sample_count > 0);
        assert_eq!(first.data.len(), first.sample_count * 2);
        assert_eq!(registry.len(), 1);

        tx.unbounded_send(Ok(chunk(4800, "world.", &[]))).unwrap();
        drop(tx);

        let rest: Vec<EncodedSegment> = segments.try_collect().await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(rest[0].sample_count > 0);
        assert_eq!(rest[1].sample_count, 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_sample_rate_is_rejected() {
        let registry = SessionRegistry::new();
        let request = StreamRequest {
            sample_rate: 16000,
            ..pcm_request()
        };
        let source = stream::iter(vec![Ok(chunk(4800, "Hi.", &[]))]);

        let results: Vec<Result<EncodedSegment>> =
            encode_stream(service(), registry.clone(), request, source)
                .collect()
                .await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::InvalidInput(_))));
        assert!(registry.is_empty());
    }
}
