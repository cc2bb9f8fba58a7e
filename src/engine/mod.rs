//! Download engine boundary
//!
//! The orchestrator depends only on the [`MediaEngine`] trait: resolve a
//! target's metadata, download it while emitting [`ProgressEvent`]s, and
//! report either the written file or a free-text failure.
//!
//! - [`CliEngine`]: drives the external `yt-dlp` binary
//! - [`UnavailableEngine`]: fails every call when no binary is available
//!
//! ## Usage
//!
//! ```no_run
//! use rushia_dl::config::EngineConfig;
//! use rushia_dl::engine::{CliEngine, EngineRequest, MediaEngine};
//! use rushia_dl::types::OutputFormat;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CliEngine::from_path(EngineConfig::default())
//!         .expect("yt-dlp binary not found");
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let output = engine
//!         .download(
//!             &EngineRequest {
//!                 url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".into(),
//!                 format: OutputFormat::M4a,
//!                 output_dir: PathBuf::from("./download"),
//!                 credential: None,
//!             },
//!             tx,
//!         )
//!         .await?;
//!     println!("wrote {:?}", output.filepath);
//!     Ok(())
//! }
//! ```
//!
//! [`ProgressEvent`]: crate::progress::ProgressEvent

mod parser;
mod traits;
mod unavailable;
mod ytdlp;

pub use parser::{EngineLine, parse_line};
pub use traits::{
    EngineOutput, EngineRequest, LiveState, MediaEngine, ProbeInfo, ProbeRequest,
};
pub use unavailable::UnavailableEngine;
pub use ytdlp::{CliEngine, OUTPUT_TEMPLATE};

use std::sync::Arc;

use crate::config::EngineConfig;

/// Pick the engine implementation for this configuration
///
/// An explicit binary path wins; otherwise PATH is searched if allowed. With
/// neither, every download fails with an install hint.
pub fn select(config: &EngineConfig) -> Arc<dyn MediaEngine> {
    if let Some(ref binary_path) = config.binary_path {
        Arc::new(CliEngine::new(binary_path.clone(), config.clone()))
    } else if config.search_path {
        CliEngine::from_path(config.clone())
            .map(|engine| Arc::new(engine) as Arc<dyn MediaEngine>)
            .unwrap_or_else(|| {
                tracing::warn!("yt-dlp not found in PATH; downloads will fail until engine.binary_path is set");
                Arc::new(UnavailableEngine)
            })
    } else {
        tracing::warn!("no yt-dlp binary configured and PATH search disabled; downloads will fail");
        Arc::new(UnavailableEngine)
    }
}
