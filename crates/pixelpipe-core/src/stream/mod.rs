//! Periodically re-rendered streams and the HTTP server publishing them.
//!
//! - **config**: per-stream settings and callbacks
//! - **scheduler**: the tick loop writing `latest.png`
//! - **server**: one `GET` route per stream

pub mod config;
pub mod scheduler;
pub mod server;

pub use config::{ImageHook, ScriptFn, StreamConfig};
pub use scheduler::{artifact_dir_name, Stream};
pub use server::{router, SnapshotRoute, SnapshotServer};
