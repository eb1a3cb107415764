//! The `pixelpipe blend` command: composite one image over another.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pixelpipe_core::loader::resolve_source;
use pixelpipe_core::render::write_atomic;
use pixelpipe_core::types::{encode_for_path, OutputFormat};
use pixelpipe_core::{Config, Engine};

/// Arguments for the `blend` command.
#[derive(Args, Debug)]
pub struct BlendArgs {
    /// Bottom image (path or http(s) URL)
    pub bottom: String,

    /// Top image (path or http(s) URL)
    pub top: String,

    /// Blend mode name (see `pixelpipe modes`)
    #[arg(short, long, default_value = "normal")]
    pub mode: String,

    /// Output image (.png, .jpg or .jpeg)
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Execute the blend command.
pub async fn execute(args: BlendArgs, config: Config) -> anyhow::Result<()> {
    if OutputFormat::from_path(&args.output).is_none() {
        anyhow::bail!(
            "Unsupported output format: {} (supported: .png, .jpg, .jpeg)",
            args.output.display()
        );
    }

    let engine = Engine::new(config).await?;
    if !engine.blend().contains(&args.mode) {
        anyhow::bail!(
            "Unknown blend mode '{}'. Run `pixelpipe modes` to list available modes.",
            args.mode
        );
    }

    let bottom_src = resolve_source(&args.bottom, None);
    let top_src = resolve_source(&args.top, None);
    let (bottom, top) = tokio::try_join!(engine.load(&bottom_src), engine.load(&top_src))?;

    let registry = Arc::clone(engine.blend());
    let output = args.output.clone();
    let mode = args.mode.clone();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let image = registry.blend_images(&mode, &bottom, &top)?;
        write_atomic(&output, &encode_for_path(&image, &output)?)?;
        Ok(())
    })
    .await??;

    tracing::info!("Blended {} over {} with {}", args.top, args.bottom, args.mode);
    println!("Wrote {}", args.output.display());
    Ok(())
}
