//! src/services/thumbnail_pipeline.rs
//!
//! The thumbnail pipeline: consumes object-created events from the blob
//! store and writes a resized JPEG under `thumbnails/...` for each original
//! under `photos/...`.
//!
//! The pipeline is stateless and a pure function of `(bucket, key)`: the
//! derived key is computed deterministically from the original key, the
//! output is reproducible from the same input, and writes overwrite in
//! place, so redelivering an event is always safe. There is no internal
//! retry; a failed event is logged and left for redelivery. Events in one
//! batch are processed independently and a failure never aborts siblings.

use crate::models::key::{MediaCategory, MediaKey, decode_event_key};
use crate::services::storage_service::{ObjectCreatedEvent, ObjectStore, StorageError};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

/// Deployment parameters for thumbnail generation.
#[derive(Clone, Debug)]
pub struct ThumbnailConfig {
    /// Output width cap in pixels. Sources narrower than this are never
    /// upscaled; height always follows the aspect ratio.
    pub max_width: u32,
    /// JPEG encode quality (1–100).
    pub jpeg_quality: u8,
    /// Wall-clock budget per event; exceeding it fails that event only.
    pub event_budget: Duration,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_width: 400,
            jpeg_quality: 80,
            event_budget: Duration::from_secs(60),
        }
    }
}

/// How far one event got before failing. None of these are retried here;
/// the redelivery mechanism owns the retry policy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetching `{key}`: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("decoding `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: image::ImageError,
    },
    #[error("writing `{key}`: {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("processing `{key}` exceeded the {budget:?} budget")]
    Timeout { key: String, budget: Duration },
}

impl PipelineError {
    /// Stable failure-kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Decode { .. } => "decode",
            PipelineError::Write { .. } => "write",
            PipelineError::Timeout { .. } => "timeout",
        }
    }

    /// The key the failure is attributed to.
    pub fn key(&self) -> &str {
        match self {
            PipelineError::Fetch { key, .. }
            | PipelineError::Decode { key, .. }
            | PipelineError::Write { key, .. }
            | PipelineError::Timeout { key, .. } => key,
        }
    }
}

/// Terminal state of one successfully handled event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A thumbnail was written at the given key.
    Generated { thumbnail_key: String },
    /// The event was outside the pipeline's scope: a key under
    /// `thumbnails/` (the feedback-loop guard), a video (no frame
    /// extraction stage exists), or an unrecognized prefix. No store
    /// calls are made for these.
    FilteredOut,
}

/// Max events drained from the channel per batch.
const MAX_BATCH: usize = 16;

/// The event-driven thumbnail generator.
///
/// Generic over [`ObjectStore`] so it runs against the real disk store in
/// production and an in-memory double in tests.
pub struct ThumbnailPipeline<S> {
    store: S,
    config: ThumbnailConfig,
}

impl<S: ObjectStore> ThumbnailPipeline<S> {
    pub fn new(store: S, config: ThumbnailConfig) -> Self {
        Self { store, config }
    }

    /// Consume event batches until the notification channel closes.
    pub async fn run(self, mut events: UnboundedReceiver<ObjectCreatedEvent>) {
        let mut batch = Vec::new();
        while events.recv_many(&mut batch, MAX_BATCH).await > 0 {
            self.process_batch(batch.drain(..)).await;
        }
        debug!("notification channel closed, thumbnail pipeline stopping");
    }

    /// Process each event in the batch independently.
    ///
    /// Failures are caught per event, logged with the offending key and the
    /// failure kind, and never prevent the remaining events from running.
    pub async fn process_batch(
        &self,
        events: impl IntoIterator<Item = ObjectCreatedEvent>,
    ) -> Vec<Result<Outcome, PipelineError>> {
        let mut results = Vec::new();
        for event in events {
            let key = decode_event_key(&event.key);
            let result = match tokio::time::timeout(
                self.config.event_budget,
                self.process_event(&key),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Timeout {
                    key: key.clone(),
                    budget: self.config.event_budget,
                }),
            };

            match &result {
                Ok(Outcome::Generated { thumbnail_key }) => {
                    info!(bucket = %event.bucket, key = %key, %thumbnail_key, "generated thumbnail");
                }
                Ok(Outcome::FilteredOut) => {
                    debug!(bucket = %event.bucket, key = %key, "event filtered out");
                }
                Err(err) => {
                    warn!(bucket = %event.bucket, key = %err.key(), kind = err.kind(), error = %err, "thumbnail generation failed");
                }
            }
            results.push(result);
        }
        results
    }

    /// Handle a single decoded key: `FilteredOut` for anything that is not
    /// an original photo, otherwise fetch, transform, and write back.
    async fn process_event(&self, key: &str) -> Result<Outcome, PipelineError> {
        let Some(media) = MediaKey::parse(key) else {
            return Ok(Outcome::FilteredOut);
        };
        match media.category {
            // Never act on derived objects. This holds even if the trigger
            // configuration is widened, otherwise every write under
            // `thumbnails/` would re-trigger the pipeline.
            MediaCategory::Thumbnail => Ok(Outcome::FilteredOut),
            // Videos are subscribed but skipped: there is no frame
            // extraction stage, and video bytes must not reach the image
            // decoder.
            MediaCategory::Video => {
                debug!(key, "video thumbnailing not implemented, skipping");
                Ok(Outcome::FilteredOut)
            }
            MediaCategory::Photo => self.generate(&media, key).await,
        }
    }

    async fn generate(&self, media: &MediaKey, key: &str) -> Result<Outcome, PipelineError> {
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(|source| PipelineError::Fetch {
                key: key.to_string(),
                source,
            })?;

        // Decode and resize are CPU-bound and can run for a long time on a
        // hostile input; keep them off the async workers so the event budget
        // stays enforceable and the HTTP server stays responsive.
        let (max_width, quality) = (self.config.max_width, self.config.jpeg_quality);
        let thumbnail = tokio::task::spawn_blocking(move || {
            render_thumbnail(&bytes, max_width, quality)
        })
        .await
        .unwrap_or_else(|join_err| {
            Err(image::ImageError::IoError(std::io::Error::other(join_err)))
        })
        .map_err(|source| PipelineError::Decode {
            key: key.to_string(),
            source,
        })?;

        let Some(thumbnail_key) = media.thumbnail_key() else {
            // Unreachable for Photo keys; kept as a filter rather than a panic.
            return Ok(Outcome::FilteredOut);
        };
        self.store
            .put(&thumbnail_key, thumbnail, "image/jpeg")
            .await
            .map_err(|source| PipelineError::Write {
                key: thumbnail_key.clone(),
                source,
            })?;

        Ok(Outcome::Generated { thumbnail_key })
    }
}

/// Decode `bytes` as an image, cap the width at `max_width` preserving the
/// aspect ratio (never upscaling), and re-encode as JPEG at `quality`.
fn render_thumbnail(bytes: &[u8], max_width: u32, quality: u8) -> image::ImageResult<Bytes> {
    let img = image::load_from_memory(bytes)?;

    let img = if img.width() > max_width {
        let height = ((img.height() as u64 * max_width as u64 + img.width() as u64 / 2)
            / img.width() as u64)
            .max(1) as u32;
        img.resize_exact(max_width, height, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(Bytes::from(out))
}
