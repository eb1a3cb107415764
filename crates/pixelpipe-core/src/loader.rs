//! Source loading: fetch or read, validate, decode, orient and cache.
//!
//! A source is either a local path or an `http(s)://` URL. Decoded images are
//! shared through the [`DecodeCache`], keyed by the source string exactly as
//! given.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use exif::{In, Reader, Tag, Value};
use image::{imageops, GenericImageView, ImageReader};
use tokio::time::timeout;

use crate::cache::DecodeCache;
use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{from_dynamic, Image};

/// Loads images through the decode cache.
#[derive(Clone)]
pub struct ImageLoader {
    cache: DecodeCache,
    client: reqwest::Client,
    limits: LimitsConfig,
}

impl ImageLoader {
    pub fn new(cache: DecodeCache, limits: LimitsConfig) -> Self {
        Self {
            cache,
            client: reqwest::Client::new(),
            limits,
        }
    }

    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    /// Load `source`, serving and refreshing a cached copy when present.
    pub async fn load(&self, source: &str) -> PipelineResult<Arc<Image>> {
        if let Some(image) = self.cache.get(source) {
            self.cache.update_timestamp(source);
            tracing::trace!("Decode cache hit for {source}");
            return Ok(image);
        }

        let bytes = if is_remote(source) {
            self.fetch(source).await?
        } else {
            self.read_file(Path::new(source)).await?
        };
        self.check_size(source, bytes.len() as u64)?;

        let image = Arc::new(self.decode(source, bytes).await?);
        self.cache.put(source, Arc::clone(&image));
        Ok(image)
    }

    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let timeout_ms = self.limits.fetch_timeout_ms;
        let request = async {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| PipelineError::Fetch {
                    url: url.to_string(),
                    message: e.to_string(),
                    status_code: None,
                })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(PipelineError::Fetch {
                    url: url.to_string(),
                    message: format!("HTTP {status}"),
                    status_code: Some(status.as_u16()),
                });
            }

            resp.bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| PipelineError::Fetch {
                    url: url.to_string(),
                    message: format!("Failed to read body: {e}"),
                    status_code: Some(status.as_u16()),
                })
        };

        timeout(Duration::from_millis(timeout_ms), request)
            .await
            .map_err(|_| PipelineError::Timeout {
                source_id: url.to_string(),
                stage: "fetch".to_string(),
                timeout_ms,
            })?
    }

    async fn read_file(&self, path: &Path) -> PipelineResult<Vec<u8>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(PipelineError::Decode {
                source_id: path.display().to_string(),
                message: format!("Cannot read file: {e}"),
            }),
        }
    }

    fn check_size(&self, source: &str, len: u64) -> PipelineResult<()> {
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if len > max_bytes {
            return Err(PipelineError::FileTooLarge {
                source_id: source.to_string(),
                size_mb: len / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }
        Ok(())
    }

    /// Decode on the blocking pool under the configured timeout.
    async fn decode(&self, source: &str, bytes: Vec<u8>) -> PipelineResult<Image> {
        let source_id = source.to_string();
        let timeout_ms = self.limits.decode_timeout_ms;
        let max_dim = self.limits.max_image_dimension;

        let decode_result = timeout(Duration::from_millis(timeout_ms), async {
            let source_id = source_id.clone();
            tokio::task::spawn_blocking(move || decode_bytes_sync(bytes, &source_id, max_dim))
                .await
        })
        .await;

        match decode_result {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Decode {
                source_id,
                message: format!("Task join error: {e}"),
            }),
            Err(_) => Err(PipelineError::Timeout {
                source_id,
                stage: "decode".to_string(),
                timeout_ms,
            }),
        }
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("cache", &self.cache)
            .field("limits", &self.limits)
            .finish()
    }
}

/// Whether a source string names a remote resource.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Synchronous decode from bytes (runs in spawn_blocking).
fn decode_bytes_sync(bytes: Vec<u8>, source_id: &str, max_dim: u32) -> PipelineResult<Image> {
    let orientation = read_orientation(&bytes);

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            source_id: source_id.to_string(),
            message: format!("Cannot detect image format: {e}"),
        })?;
    if reader.format().is_none() {
        return Err(PipelineError::UnsupportedFormat {
            source_id: source_id.to_string(),
        });
    }

    let decoded = reader.decode().map_err(|e| PipelineError::Decode {
        source_id: source_id.to_string(),
        message: e.to_string(),
    })?;

    let (width, height) = decoded.dimensions();
    if width > max_dim || height > max_dim {
        return Err(PipelineError::ImageTooLarge {
            source_id: source_id.to_string(),
            width,
            height,
            max_dim,
        });
    }

    Ok(apply_orientation(from_dynamic(decoded), orientation))
}

/// EXIF orientation tag (1-8), if the container carries one.
fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| u32::from(x)),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
}

/// Rotate or mirror a decoded image so it displays upright.
pub fn apply_orientation(image: Image, orientation: Option<u32>) -> Image {
    match orientation {
        Some(2) => imageops::flip_horizontal(&image),
        Some(3) => imageops::rotate180(&image),
        Some(4) => imageops::flip_vertical(&image),
        Some(5) => imageops::rotate270(&imageops::flip_horizontal(&image)),
        Some(6) => imageops::rotate90(&image),
        Some(7) => imageops::rotate90(&imageops::flip_horizontal(&image)),
        Some(8) => imageops::rotate270(&image),
        _ => image,
    }
}

/// Resolve a local source against a base directory, leaving URLs alone.
pub fn resolve_source(source: &str, base: Option<&Path>) -> String {
    if is_remote(source) {
        return source.to_string();
    }
    let expanded = PathBuf::from(shellexpand::tilde(source).into_owned());
    match base {
        Some(base) if expanded.is_relative() => base.join(expanded).display().to_string(),
        _ => expanded.display().to_string(),
    }
}
