//! Stream settings: name, tick interval, script generator and image hook.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Produces the script to render for a given wall-clock time.
///
/// Called on the blocking thread pool, so it may read files.
pub type ScriptFn = Arc<dyn Fn(DateTime<Utc>) -> String + Send + Sync>;

/// Called with the artifact path after every successful render.
pub type ImageHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Settings for one continuously re-rendered stream.
#[derive(Clone)]
pub struct StreamConfig {
    /// Stream name; also determines the artifact directory
    pub name: String,
    /// Time between renders
    pub interval: Duration,
    /// Script generator (required to start)
    pub script_fn: Option<ScriptFn>,
    /// Optional post-render hook
    pub on_image: Option<ImageHook>,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            interval,
            script_fn: None,
            on_image: None,
        }
    }

    /// Generate the script from the current time on every tick.
    pub fn with_script_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        self.script_fn = Some(Arc::new(f));
        self
    }

    /// Render the same script on every tick.
    pub fn with_script(self, script: impl Into<String>) -> Self {
        let script = script.into();
        self.with_script_fn(move |_| script.clone())
    }

    pub fn with_on_image<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path) + Send + Sync + 'static,
    {
        self.on_image = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("script_fn", &self.script_fn.is_some())
            .field("on_image", &self.on_image.is_some())
            .finish()
    }
}
