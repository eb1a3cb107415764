//! A small line-oriented script runner so the CLI can render something.
//!
//! Every non-empty line binds a variable:
//!
//! ```text
//! # comments start with '#'
//! base: load ./photo.jpg
//! sky: load https://example.com/sky.png
//! dark: brightness base 0.6
//! fill: solid 640 480 0 0 0 65535
//! img: blend screen dark sky
//! ```
//!
//! Expressions are `load <source>`, `solid <w> <h> <r> <g> <b> <a>`,
//! `blend <mode> <bottom> <top>`, `invert|grayscale <var>`,
//! `brightness|opacity <var> <factor>`, or a bare variable name. The result is
//! whatever `img` holds after the last line.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::Rgba;
use pixelpipe_core::loader::resolve_source;
use pixelpipe_core::pixel::filters;
use pixelpipe_core::types::solid;
use pixelpipe_core::{Engine, Image, RenderError, ScriptRunner};

/// Variable holding the script result.
const OUTPUT_VAR: &str = "img";

/// Executes line scripts against a shared engine.
pub struct LineRunner {
    engine: Arc<Engine>,
    base_dir: Option<PathBuf>,
}

impl LineRunner {
    /// Relative `load` sources resolve against `base_dir` when given.
    pub fn new(engine: Arc<Engine>, base_dir: Option<PathBuf>) -> Self {
        Self { engine, base_dir }
    }

    async fn eval(
        &self,
        expr: &str,
        vars: &HashMap<String, Arc<Image>>,
    ) -> Result<Arc<Image>, String> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        let var = |name: &str| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| format!("undefined variable '{name}'"))
        };
        let factor = |raw: &str| {
            raw.parse::<f64>()
                .map_err(|_| format!("invalid factor '{raw}'"))
        };

        match tokens[..] {
            ["load", source] => {
                let source = resolve_source(source, self.base_dir.as_deref());
                self.engine.load(&source).await.map_err(|e| e.to_string())
            }
            ["solid", w, h, r, g, b, a] => {
                let dims = [w, h].map(|v| v.parse::<u32>());
                let rgba = [r, g, b, a].map(|v| v.parse::<u16>());
                let max_dim = self.engine.config().limits.max_image_dimension;
                match (dims, rgba) {
                    ([Ok(w), Ok(h)], _) if w > max_dim || h > max_dim => Err(format!(
                        "solid {w}x{h} exceeds the {max_dim}px dimension limit"
                    )),
                    ([Ok(w), Ok(h)], [Ok(r), Ok(g), Ok(b), Ok(a)]) => {
                        Ok(Arc::new(solid(w, h, Rgba([r, g, b, a]))))
                    }
                    _ => Err(format!("invalid solid arguments in '{expr}'")),
                }
            }
            ["blend", mode, bottom, top] => {
                let (bottom, top) = (var(bottom)?, var(top)?);
                let registry = Arc::clone(self.engine.blend());
                let mode = mode.to_string();
                self.pixel_task(move || {
                    registry
                        .blend_images(&mode, &bottom, &top)
                        .map_err(|e| e.to_string())
                })
                .await
            }
            ["invert", source] => {
                let source = var(source)?;
                let processor = Arc::clone(self.engine.processor());
                self.pixel_task(move || Ok(filters::invert(&processor, &source)))
                    .await
            }
            ["grayscale", source] => {
                let source = var(source)?;
                let processor = Arc::clone(self.engine.processor());
                self.pixel_task(move || Ok(filters::grayscale(&processor, &source)))
                    .await
            }
            ["brightness", source, f] => {
                let (source, f) = (var(source)?, factor(f)?);
                let processor = Arc::clone(self.engine.processor());
                self.pixel_task(move || Ok(filters::brightness(&processor, &source, f)))
                    .await
            }
            ["opacity", source, f] => {
                let (source, f) = (var(source)?, factor(f)?);
                let processor = Arc::clone(self.engine.processor());
                self.pixel_task(move || Ok(filters::opacity(&processor, &source, f)))
                    .await
            }
            [name] => var(name),
            _ => Err(format!("cannot evaluate '{expr}'")),
        }
    }

    /// Run pixel work off the async runtime.
    async fn pixel_task<F>(&self, work: F) -> Result<Arc<Image>, String>
    where
        F: FnOnce() -> Result<Image, String> + Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| format!("pixel task failed: {e}"))?
            .map(Arc::new)
    }
}

#[async_trait]
impl ScriptRunner for LineRunner {
    async fn run(&self, script: &str) -> Result<Image, RenderError> {
        let mut vars: HashMap<String, Arc<Image>> = HashMap::new();

        for (n, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (targets, expr) = parse_bindings(line).ok_or_else(|| {
                RenderError::Script(format!("line {}: expected 'name: expression'", n + 1))
            })?;
            let value = self
                .eval(expr, &vars)
                .await
                .map_err(|e| RenderError::Script(format!("line {}: {e}", n + 1)))?;
            for target in targets {
                vars.insert(target.to_string(), Arc::clone(&value));
            }
        }

        let image = vars
            .remove(OUTPUT_VAR)
            .ok_or_else(|| RenderError::Script(format!("script never binds '{OUTPUT_VAR}'")))?;
        Ok(Arc::try_unwrap(image).unwrap_or_else(|shared| (*shared).clone()))
    }
}

/// Split `a: b: expr` into the bound names and the expression.
///
/// A line rewritten to `img:name: expr` binds both `img` and `name`.
fn parse_bindings(line: &str) -> Option<(Vec<&str>, &str)> {
    let mut targets = Vec::new();
    let mut rest = line;
    while let Some((name, tail)) = rest.split_once(':') {
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            break;
        }
        targets.push(name);
        rest = tail;
    }
    let expr = rest.trim();
    if targets.is_empty() || expr.is_empty() {
        return None;
    }
    Some((targets, expr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelpipe_core::types::encode_png;
    use pixelpipe_core::Config;

    async fn runner(base_dir: Option<PathBuf>) -> LineRunner {
        let engine = Engine::new(Config::default()).await.unwrap();
        LineRunner::new(Arc::new(engine), base_dir)
    }

    #[test]
    fn test_parse_bindings() {
        assert_eq!(parse_bindings("a: load x.png"), Some((vec!["a"], "load x.png")));
        assert_eq!(
            parse_bindings("img:a: load https://e.com/x.png"),
            Some((vec!["img", "a"], "load https://e.com/x.png"))
        );
        assert_eq!(parse_bindings("img:a"), Some((vec!["img"], "a")));
        assert_eq!(parse_bindings("no binding here"), None);
        assert_eq!(parse_bindings("a:"), None);
    }

    #[tokio::test]
    async fn test_solid_and_filters() {
        let runner = runner(None).await;
        let out = runner
            .run("base: solid 4 2 1000 2000 3000 65535\nimg: invert base")
            .await
            .unwrap();
        assert_eq!(out.dimensions(), (4, 2));
        assert_eq!(out.get_pixel(3, 1), &Rgba([64535, 63535, 62535, 65535]));
    }

    #[tokio::test]
    async fn test_blend_relative_load() {
        let dir = tempfile::tempdir().unwrap();
        let top = solid(2, 2, Rgba([0, 0, 65535, 65535]));
        std::fs::write(dir.path().join("top.png"), encode_png(&top).unwrap()).unwrap();

        let runner = runner(Some(dir.path().to_path_buf())).await;
        let out = runner
            .run("# demo\nbottom: solid 2 2 65535 0 0 65535\ntop: load top.png\nimg: blend lighten bottom top")
            .await
            .unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([65535, 0, 65535, 65535]));
    }

    #[tokio::test]
    async fn test_normalized_last_line_binds_img() {
        let runner = runner(None).await;
        let script = pixelpipe_core::normalize_script("a: solid 1 1 1 2 3 4").unwrap();
        let out = runner.run(&script).await.unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_solid_respects_dimension_limit() {
        let mut config = Config::default();
        config.limits.max_image_dimension = 16;
        let engine = Engine::new(config).await.unwrap();
        let runner = LineRunner::new(Arc::new(engine), None);

        let out = runner.run("img: solid 16 8 0 0 0 65535").await.unwrap();
        assert_eq!(out.dimensions(), (16, 8));

        let err = runner.run("img: solid 64 64 0 0 0 65535").await.unwrap_err();
        assert!(err.to_string().contains("dimension limit"), "{err}");

        let err = runner
            .run("img: solid 4294967295 4294967295 0 0 0 0")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Script(_)), "{err}");
    }

    #[tokio::test]
    async fn test_errors_name_the_line() {
        let runner = runner(None).await;
        let err = runner.run("a: solid 1 1 0 0 0 0\nimg: blend nope a a").await.unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(err.to_string().contains("nope"), "{err}");

        let err = runner.run("a: solid 1 1 0 0 0 0").await.unwrap_err();
        assert!(err.to_string().contains("never binds"), "{err}");

        let err = runner.run("img: ghost").await.unwrap_err();
        assert!(err.to_string().contains("undefined variable"), "{err}");
    }
}
