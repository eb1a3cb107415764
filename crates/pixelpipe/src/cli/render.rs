//! The `pixelpipe render` command: run scripts once and write PNGs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use pixelpipe_core::types::OutputFormat;
use pixelpipe_core::{normalize_script, Config, Engine, RenderError};
use tokio::task::JoinSet;

use super::runner::LineRunner;

/// Arguments for the `render` command.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Script files to render
    #[arg(required = true)]
    pub scripts: Vec<PathBuf>,

    /// Output image, .png, .jpg or .jpeg (single script only; defaults to the script path with a .png extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the render command.
///
/// Scripts render concurrently, bounded by the admission limit.
pub async fn execute(args: RenderArgs, config: Config) -> anyhow::Result<()> {
    if args.output.is_some() && args.scripts.len() > 1 {
        anyhow::bail!("--output can only be used with a single script");
    }
    if let Some(output) = &args.output {
        if OutputFormat::from_path(output).is_none() {
            return Err(RenderError::UnsupportedOutput(output.clone()).into());
        }
    }

    let engine = Arc::new(Engine::new(config).await?);
    let total = args.scripts.len();
    let pb = create_progress_bar(total as u64);

    let mut tasks = JoinSet::new();
    for script_path in args.scripts {
        let output = match &args.output {
            Some(output) => output.clone(),
            None => script_path.with_extension("png"),
        };
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            let result = render_one(&engine, &script_path, &output).await;
            (script_path, output, result)
        });
    }

    let mut failed = 0usize;
    let mut written = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((script, output, Ok(()))) => {
                pb.set_message(script.display().to_string());
                tracing::debug!("{} -> {}", script.display(), output.display());
                written.push(output);
            }
            Ok((script, _, Err(e))) => {
                failed += 1;
                pb.suspend(|| tracing::error!("{}: {e:#}", script.display()));
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Render task panicked: {e}");
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if failed > 0 {
        anyhow::bail!("{failed} of {total} scripts failed");
    }
    match written.as_slice() {
        [single] => println!("Wrote {}", single.display()),
        many => println!("Wrote {} images", many.len()),
    }
    Ok(())
}

async fn render_one(engine: &Arc<Engine>, script_path: &Path, output: &Path) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(script_path)
        .await
        .with_context(|| format!("Failed to read script {}", script_path.display()))?;
    let script = normalize_script(&source).ok_or(RenderError::EmptyScript)?;

    let runner = LineRunner::new(Arc::clone(engine), script_path.parent().map(Path::to_path_buf));
    let renderer = engine.renderer(Arc::new(runner));
    renderer.render_to_file(&script, output).await?;
    Ok(())
}

/// Create a progress bar for batch rendering.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    if total <= 1 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}
