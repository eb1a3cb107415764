//! Periodic re-rendering of one stream into its artifact file.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use super::config::StreamConfig;
use crate::error::StreamError;
use crate::render::{normalize_script, Renderer};

const ARTIFACT_FILE: &str = "latest.png";

/// A stream that renders its script at a fixed interval and publishes the
/// latest result as a PNG. Clones control the same stream.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    config: StreamConfig,
    renderer: Renderer,
    artifact_path: PathBuf,
    busy: Arc<tokio::sync::Mutex<()>>,
    render_count: AtomicUsize,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl Stream {
    /// Create a stream publishing to `<artifact_root>/<blake3(name)>/latest.png`.
    pub fn new(config: StreamConfig, renderer: Renderer, artifact_root: &Path) -> Self {
        let artifact_path = artifact_root
            .join(artifact_dir_name(&config.name))
            .join(ARTIFACT_FILE);
        Self {
            inner: Arc::new(StreamInner {
                config,
                renderer,
                artifact_path,
                busy: Arc::new(tokio::sync::Mutex::new(())),
                render_count: AtomicUsize::new(0),
                stop_tx: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn artifact_path(&self) -> &Path {
        &self.inner.artifact_path
    }

    /// Whether a non-empty artifact has been published.
    pub fn has_artifact(&self) -> bool {
        std::fs::metadata(&self.inner.artifact_path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    pub fn is_running(&self) -> bool {
        self.stop_slot().is_some()
    }

    /// Successful renders since creation.
    pub fn render_count(&self) -> usize {
        self.inner.render_count.load(Ordering::SeqCst)
    }

    /// Start rendering: once immediately, then every interval.
    ///
    /// Must be called inside a tokio runtime. Starting a running stream is a
    /// no-op.
    pub fn start(&self) -> Result<(), StreamError> {
        let config = &self.inner.config;
        if config.script_fn.is_none() {
            return Err(StreamError::MissingScript(config.name.clone()));
        }
        if config.interval.is_zero() {
            return Err(StreamError::InvalidInterval(config.name.clone()));
        }

        let mut slot = self.stop_slot();
        if slot.is_some() {
            return Ok(());
        }
        if let Some(dir) = self.inner.artifact_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        *slot = Some(stop_tx);
        tokio::spawn(run_loop(Arc::clone(&self.inner), stop_rx));
        tracing::info!(
            "Stream {} started (every {:?}, artifact {})",
            config.name,
            config.interval,
            self.inner.artifact_path.display()
        );
        Ok(())
    }

    /// Ask the loop to exit. A render already in flight still completes.
    pub fn stop(&self) {
        if let Some(stop_tx) = self.stop_slot().take() {
            let _ = stop_tx.send(());
            tracing::info!("Stream {} stopped", self.inner.config.name);
        }
    }

    fn stop_slot(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.inner.stop_tx.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("config", &self.inner.config)
            .field("artifact_path", &self.inner.artifact_path)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Directory name for a stream's artifacts: the hex blake3 hash of its name.
pub fn artifact_dir_name(name: &str) -> String {
    blake3::hash(name.as_bytes()).to_hex().to_string()
}

async fn run_loop(inner: Arc<StreamInner>, mut stop_rx: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(inner.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            _ = ticker.tick() => spawn_render(&inner),
        }
    }
    tracing::debug!("Stream {} loop exited", inner.config.name);
}

/// Start a render unless one is still in flight; a busy tick is dropped.
fn spawn_render(inner: &Arc<StreamInner>) {
    let Ok(guard) = Arc::clone(&inner.busy).try_lock_owned() else {
        tracing::debug!("Stream {}: previous render still running, skipping tick", inner.config.name);
        return;
    };
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        inner.render_once().await;
        drop(guard);
    });
}

impl StreamInner {
    async fn render_once(&self) {
        let name = &self.config.name;
        let Some(script_fn) = &self.config.script_fn else {
            return;
        };
        // Script functions may read files or block otherwise.
        let script_fn = Arc::clone(script_fn);
        let generated = match tokio::task::spawn_blocking(move || script_fn(Utc::now())).await {
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!("Stream {name}: script function failed: {e}");
                return;
            }
        };
        let Some(script) = normalize_script(&generated) else {
            tracing::warn!("Stream {name}: script is empty, skipping render");
            return;
        };

        match self.renderer.render_to_file(&script, &self.artifact_path).await {
            Ok(image) => {
                let count = self.render_count.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(
                    "Stream {name}: published {}x{} render #{count}",
                    image.width(),
                    image.height()
                );
                if let Some(hook) = &self.config.on_image {
                    let path = self.artifact_path.as_path();
                    if catch_unwind(AssertUnwindSafe(|| hook(path))).is_err() {
                        tracing::warn!("Stream {name}: image hook panicked");
                    }
                }
            }
            Err(e) => tracing::warn!("Stream {name}: render failed, keeping previous image: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionController;
    use crate::error::RenderError;
    use crate::render::ScriptRunner;
    use crate::types::{solid, Image};
    use async_trait::async_trait;
    use image::Rgba;
    use std::time::Duration;
    use tokio::time::sleep;

    struct CountingRunner {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ScriptRunner for CountingRunner {
        async fn run(&self, script: &str) -> Result<Image, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sleep(self.delay).await;
            if script.contains("fail") {
                return Err(RenderError::Script("boom".to_string()));
            }
            Ok(solid(2, 2, Rgba([100, 200, 300, 65535])))
        }
    }

    fn setup(delay: Duration) -> (Arc<CountingRunner>, Renderer, tempfile::TempDir) {
        let runner = Arc::new(CountingRunner {
            calls: AtomicUsize::new(0),
            delay,
        });
        let renderer = Renderer::new(runner.clone(), AdmissionController::new(4));
        (runner, renderer, tempfile::tempdir().unwrap())
    }

    /// Wait until `cond` holds, polling in small real-time steps.
    async fn eventually(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_start_requires_script_and_interval() {
        let (_, renderer, dir) = setup(Duration::ZERO);

        let no_script = Stream::new(
            StreamConfig::new("cam", Duration::from_secs(1)),
            renderer.clone(),
            dir.path(),
        );
        assert!(matches!(no_script.start(), Err(StreamError::MissingScript(_))));
        assert!(!no_script.is_running());

        let zero = Stream::new(
            StreamConfig::new("cam", Duration::ZERO).with_script("img: x"),
            renderer,
            dir.path(),
        );
        assert!(matches!(zero.start(), Err(StreamError::InvalidInterval(_))));
    }

    #[test]
    fn test_artifact_path_is_hashed_name() {
        let (_, renderer, dir) = setup(Duration::ZERO);
        let stream = Stream::new(StreamConfig::new("cam 1", Duration::from_secs(1)), renderer, dir.path());
        let expected = dir
            .path()
            .join(blake3::hash(b"cam 1").to_hex().as_str())
            .join("latest.png");
        assert_eq!(stream.artifact_path(), expected);
        assert!(!stream.has_artifact());
    }

    #[tokio::test]
    async fn test_renders_immediately_and_calls_hook() {
        let (_, renderer, dir) = setup(Duration::ZERO);
        let seen = Arc::new(Mutex::new(Vec::<PathBuf>::new()));
        let hook_seen = Arc::clone(&seen);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_secs(3600))
                .with_script("img: x")
                .with_on_image(move |p| hook_seen.lock().unwrap().push(p.to_path_buf())),
            renderer,
            dir.path(),
        );

        stream.start().unwrap();
        assert!(stream.is_running());
        eventually(|| stream.render_count() == 1).await;
        assert!(stream.has_artifact());
        eventually(|| !seen.lock().unwrap().is_empty()).await;
        assert_eq!(seen.lock().unwrap()[0], stream.artifact_path());

        let decoded = image::open(stream.artifact_path()).unwrap().into_rgba16();
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([100, 200, 300, 65535]));
        stream.stop();
        assert!(!stream.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let (runner, renderer, dir) = setup(Duration::ZERO);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_secs(3600)).with_script("img: x"),
            renderer,
            dir.path(),
        );
        stream.start().unwrap();
        stream.start().unwrap();
        eventually(|| stream.render_count() == 1).await;
        sleep(Duration::from_millis(50)).await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        stream.stop();
        stream.stop();
    }

    #[tokio::test]
    async fn test_failed_render_keeps_artifact_and_loop_alive() {
        let (runner, renderer, dir) = setup(Duration::ZERO);
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let script_fail = Arc::clone(&fail);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_millis(50)).with_script_fn(move |_| {
                if script_fail.load(Ordering::SeqCst) {
                    "fail".to_string()
                } else {
                    "img: x".to_string()
                }
            }),
            renderer,
            dir.path(),
        );

        stream.start().unwrap();
        eventually(|| stream.render_count() >= 1).await;
        let published = std::fs::read(stream.artifact_path()).unwrap();

        fail.store(true, Ordering::SeqCst);
        let count = stream.render_count();
        let calls = runner.calls.load(Ordering::SeqCst);
        eventually(|| runner.calls.load(Ordering::SeqCst) >= calls + 2).await;
        assert_eq!(stream.render_count(), count);
        assert_eq!(std::fs::read(stream.artifact_path()).unwrap(), published);
        stream.stop();
    }

    #[tokio::test]
    async fn test_panicking_hook_does_not_stop_stream() {
        let (_, renderer, dir) = setup(Duration::ZERO);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_millis(20))
                .with_script("img: x")
                .with_on_image(|_| panic!("hook failure")),
            renderer,
            dir.path(),
        );
        stream.start().unwrap();
        eventually(|| stream.render_count() >= 3).await;
        stream.stop();
    }

    #[tokio::test]
    async fn test_blocking_script_fn_runs_off_the_runtime() {
        let (_, renderer, dir) = setup(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));
        let script_calls = Arc::clone(&calls);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_millis(20)).with_script_fn(move |_| {
                if script_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("script source unavailable");
                }
                std::thread::sleep(Duration::from_millis(30));
                "img: x".to_string()
            }),
            renderer,
            dir.path(),
        );

        stream.start().unwrap();
        // The current-thread runtime keeps ticking while the script blocks.
        let ticker = tokio::spawn(async {
            for _ in 0..5 {
                sleep(Duration::from_millis(5)).await;
            }
        });
        eventually(|| stream.render_count() >= 2).await;
        ticker.await.unwrap();
        assert!(stream.is_running());
        assert!(calls.load(Ordering::SeqCst) >= 3);
        stream.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_render_never_overlaps() {
        let (runner, renderer, dir) = setup(Duration::from_millis(2500));
        let stream = Stream::new(
            StreamConfig::new("slow", Duration::from_secs(1)).with_script("img: x"),
            renderer,
            dir.path(),
        );

        stream.start().unwrap();
        sleep(Duration::from_millis(3100)).await;
        let calls = runner.calls.load(Ordering::SeqCst);
        assert!((1..=3).contains(&calls), "{calls} renders in 3 intervals");
        assert!(stream.inner.renderer.admission().peak() <= 1);
        stream.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let (runner, renderer, dir) = setup(Duration::ZERO);
        let stream = Stream::new(
            StreamConfig::new("cam", Duration::from_secs(1)).with_script("img: x"),
            renderer,
            dir.path(),
        );
        stream.start().unwrap();
        sleep(Duration::from_millis(1500)).await;
        stream.stop();
        let calls = runner.calls.load(Ordering::SeqCst);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(runner.calls.load(Ordering::SeqCst), calls);
    }
}
