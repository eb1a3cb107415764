//! Script execution under admission control.
//!
//! Scripts are opaque to this crate: an external interpreter implements
//! [`ScriptRunner`] and the [`Renderer`] wraps every run in an admission
//! permit, optionally publishing the result as a PNG artifact.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::admission::AdmissionController;
use crate::error::RenderError;
use crate::types::{encode, Image, OutputFormat};

/// Executes a pipeline script and returns the image bound to `img`.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str) -> Result<Image, RenderError>;
}

/// Runs scripts with at most `admission.max()` executing at once.
#[derive(Clone)]
pub struct Renderer {
    runner: Arc<dyn ScriptRunner>,
    admission: AdmissionController,
}

impl Renderer {
    pub fn new(runner: Arc<dyn ScriptRunner>, admission: AdmissionController) -> Self {
        Self { runner, admission }
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Run one script. The admission permit is held for the whole run.
    pub async fn render(&self, script: &str) -> Result<Image, RenderError> {
        let _permit = self
            .admission
            .acquire()
            .await
            .map_err(|e| RenderError::Task(format!("admission closed: {e}")))?;
        let start = Instant::now();
        let image = self.runner.run(script).await?;
        tracing::debug!(
            "Rendered {}x{} image in {}ms",
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );
        Ok(image)
    }

    /// Render and publish the result at `path`, encoded as PNG or JPEG by
    /// extension. Unknown extensions fail before the script runs.
    ///
    /// The file is written next to its destination and renamed over it, so
    /// readers see either the previous artifact or the new one.
    pub async fn render_to_file(&self, script: &str, path: &Path) -> Result<Image, RenderError> {
        let format = OutputFormat::from_path(path)
            .ok_or_else(|| RenderError::UnsupportedOutput(path.to_path_buf()))?;
        let image = self.render(script).await?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let bytes = encode(&image, format)?;
            write_atomic(&path, &bytes)?;
            Ok::<_, RenderError>(image)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

/// Replace `path` with `bytes` via a temp file and rename, creating missing
/// parent directories first.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Trim a script and make sure its last line binds `img`.
///
/// Returns `None` when nothing but whitespace remains.
pub fn normalize_script(script: &str) -> Option<String> {
    let trimmed = script.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut lines: Vec<String> = trimmed.lines().map(str::to_string).collect();
    let last = lines.iter().rposition(|line| !line.trim().is_empty())?;
    let tail = lines[last].trim();
    if tail.starts_with("img:") {
        return Some(trimmed.to_string());
    }
    let prefixed = format!("img:{tail}");
    lines[last] = prefixed;
    Some(lines.join("\n"))
}
