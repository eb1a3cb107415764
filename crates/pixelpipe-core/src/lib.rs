//! Pixelpipe Core - concurrent image processing runtime.
//!
//! Pixelpipe executes image pipeline scripts and keeps their results
//! published. The runtime is split into small components that an
//! interpreter composes:
//!
//! ```text
//! load ─▶ DecodeCache ─▶ PixelProcessor / BlendRegistry ─▶ Renderer ─▶ Stream ─▶ SnapshotServer
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use pixelpipe_core::{Config, Engine};
//!
//! #[tokio::main]
//! async fn main() -> pixelpipe_core::Result<()> {
//!     let engine = Engine::new(Config::load()?).await?;
//!     let bottom = engine.load("./bottom.png").await?;
//!     let top = engine.load("./top.png").await?;
//!     let out = engine.blend().blend_images("screen", &bottom, &top)?;
//!     println!("{}x{}", out.width(), out.height());
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod blend;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod pixel;
pub mod render;
pub mod stream;
pub mod types;

use std::sync::Arc;

use tokio::task::JoinHandle;

pub use admission::{AdmissionController, AdmissionPermit};
pub use blend::{BlendMode, BlendRegistry};
pub use cache::DecodeCache;
pub use config::Config;
pub use error::{
    BlendError, ConfigError, PipelineError, PipelineResult, PixelpipeError, RenderError, Result,
    StreamError,
};
pub use loader::ImageLoader;
pub use pixel::PixelProcessor;
pub use render::{normalize_script, Renderer, ScriptRunner};
pub use stream::{SnapshotRoute, SnapshotServer, Stream, StreamConfig};
pub use types::{Image, Pixel};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The shared runtime: one worker pool, one blend registry, one decode cache
/// and one admission limit per process.
pub struct Engine {
    config: Config,
    processor: Arc<PixelProcessor>,
    blend: Arc<BlendRegistry>,
    cache: DecodeCache,
    admission: AdmissionController,
    loader: ImageLoader,
    sweeper: JoinHandle<()>,
}

impl Engine {
    /// Build every component from configuration.
    ///
    /// Must be called inside a tokio runtime; the cache sweeper is spawned
    /// onto it.
    pub async fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing Pixelpipe v{}", VERSION);

        let processor = Arc::new(PixelProcessor::from_config(&config.processing)?);
        let blend = Arc::new(BlendRegistry::with_builtin(Arc::clone(&processor)));
        let cache = DecodeCache::new(&config.cache);
        let sweeper = cache.spawn_sweeper();
        let admission = AdmissionController::from_config(&config.admission);
        let loader = ImageLoader::new(cache.clone(), config.limits.clone());

        tracing::info!(
            "Engine ready: {} pixel workers, {} concurrent renders, cache {}",
            processor.workers(),
            admission.max(),
            if cache.is_enabled() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            processor,
            blend,
            cache,
            admission,
            loader,
            sweeper,
        })
    }

    /// Create an engine with configuration from the default location.
    pub async fn with_defaults() -> Result<Self> {
        let config = Config::load()?;
        Self::new(config).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processor(&self) -> &Arc<PixelProcessor> {
        &self.processor
    }

    pub fn blend(&self) -> &Arc<BlendRegistry> {
        &self.blend
    }

    pub fn cache(&self) -> &DecodeCache {
        &self.cache
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Load an image through the decode cache.
    pub async fn load(&self, source: &str) -> PipelineResult<Arc<Image>> {
        self.loader.load(source).await
    }

    /// A renderer for `runner` sharing this engine's admission limit.
    pub fn renderer(&self, runner: Arc<dyn ScriptRunner>) -> Renderer {
        Renderer::new(runner, self.admission.clone())
    }

    /// A stream publishing under the configured artifact directory.
    pub fn stream(&self, config: StreamConfig, renderer: Renderer) -> Stream {
        Stream::new(config, renderer, &self.config.artifact_dir())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_engine_new() {
        let mut config = Config::default();
        config.processing.workers = 3;
        config.admission.max_concurrent = 2;
        let engine = Engine::new(config).await.unwrap();
        assert_eq!(engine.processor().workers(), 3);
        assert_eq!(engine.admission().max(), 2);
        assert_eq!(engine.blend().names().len(), 30);
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_engine_load_and_blend() {
        let dir = tempfile::tempdir().unwrap();
        let bottom_path = dir.path().join("bottom.png");
        let top_path = dir.path().join("top.png");
        let bottom = types::solid(4, 4, Rgba([65535, 0, 0, 65535]));
        let top = types::solid(4, 4, Rgba([0, 0, 65535, 65535]));
        std::fs::write(&bottom_path, types::encode_png(&bottom).unwrap()).unwrap();
        std::fs::write(&top_path, types::encode_png(&top).unwrap()).unwrap();

        let engine = Engine::new(Config::default()).await.unwrap();
        let b = engine.load(&bottom_path.display().to_string()).await.unwrap();
        let t = engine.load(&top_path.display().to_string()).await.unwrap();
        assert_eq!(engine.cache().len(), 2);

        let out = engine.blend().blend_images("lighten", &b, &t).unwrap();
        assert_eq!(out.get_pixel(2, 2), &Rgba([65535, 0, 65535, 65535]));
    }
}
