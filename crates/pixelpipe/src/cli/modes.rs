//! The `pixelpipe modes` command: list registered blend modes.

use std::sync::Arc;

use clap::Args;
use pixelpipe_core::{BlendRegistry, PixelProcessor};

/// Arguments for the `modes` command.
#[derive(Args, Debug)]
pub struct ModesArgs {
    /// Print the names as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ModesArgs) -> anyhow::Result<()> {
    let registry = BlendRegistry::with_builtin(Arc::new(PixelProcessor::new(1)?));
    let names = registry.names();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}
