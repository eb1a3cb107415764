//! The `pixelpipe serve` command: run configured streams behind the
//! snapshot server until Ctrl-C.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use pixelpipe_core::config::StreamEntry;
use pixelpipe_core::{Config, Engine, SnapshotRoute, SnapshotServer, StreamConfig};

use super::runner::LineRunner;

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides `[server] bind`)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    if config.streams.is_empty() {
        anyhow::bail!(
            "No streams configured. Add [[streams]] entries to {}",
            Config::default_path().display()
        );
    }

    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let engine = Arc::new(Engine::new(config.clone()).await?);
    let routes: Vec<SnapshotRoute> = config
        .streams
        .iter()
        .map(|entry| build_route(&engine, entry))
        .collect();

    let server = SnapshotServer::start(&bind, routes).await?;
    let addr = server.local_addr();
    for stream in server.streams() {
        tracing::debug!("Stream {} publishes {}", stream.name(), stream.artifact_path().display());
    }
    for entry in &config.streams {
        println!(
            "{} {} {}",
            style("▸").cyan(),
            style(&entry.name).bold(),
            style(format!("http://{addr}{}", entry.route)).underlined()
        );
    }
    println!("{}", style("Press Ctrl-C to stop.").dim());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    server.shutdown().await;
    Ok(())
}

/// Wire one configured stream: its script file is re-read on every tick.
fn build_route(engine: &Arc<Engine>, entry: &StreamEntry) -> SnapshotRoute {
    let script_path = Config::script_path(entry);
    let base_dir = script_path.parent().map(Path::to_path_buf);
    let renderer = engine.renderer(Arc::new(LineRunner::new(Arc::clone(engine), base_dir)));

    let name = entry.name.clone();
    let stream_config = StreamConfig::new(&entry.name, Duration::from_secs(entry.interval_secs))
        .with_script_fn(move |_| read_script(&script_path))
        .with_on_image(move |path| tracing::debug!("Stream {name}: updated {}", path.display()));

    SnapshotRoute::new(&entry.route, engine.stream(stream_config, renderer))
}

/// Runs on the blocking pool via the stream's script function.
fn read_script(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| {
        tracing::warn!("Cannot read script {}: {e}", path.display());
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_route_renders_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("cam.pxp");
        std::fs::write(&script, "img: solid 2 2 1 2 3 65535").unwrap();

        let mut config = Config::default();
        config.server.artifact_dir = dir.path().join("artifacts").display().to_string();
        let engine = Arc::new(Engine::new(config).await.unwrap());
        let entry = StreamEntry {
            name: "cam".to_string(),
            route: "/cam.png".to_string(),
            interval_secs: 3600,
            script: script.display().to_string(),
        };

        let route = build_route(&engine, &entry);
        assert_eq!(route.route, "/cam.png");
        assert!(route.stream.artifact_path().starts_with(dir.path().join("artifacts")));

        route.stream.start().unwrap();
        for _ in 0..200 {
            if route.stream.render_count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(route.stream.has_artifact());
        route.stream.stop();
    }

    #[tokio::test]
    async fn test_no_streams_is_an_error() {
        let err = execute(ServeArgs { bind: None }, Config::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No streams configured"));
    }
}
