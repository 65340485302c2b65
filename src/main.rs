//! `daq_video`: run an acquisition from the command line.
//!
//! Frames are consumed by a counting task; control messages are read from
//! stdin as JSON lines, e.g. `{"name": "paused", "value": true}`.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use daq_video::acquisition::{AcquisitionLoop, ControlSurface, FrameQueue, LoopIo};
use daq_video::config::{AcquisitionConfig, SourceKind};
use daq_video::messages::{ControlMessage, ControlUpdate};
use daq_video::source::CameraRegistry;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceArg {
    Camera,
    File,
}

#[derive(Debug, Parser)]
#[command(name = "daq_video", version, about = "Paced camera/file frame acquisition")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame source kind
    #[arg(long, value_enum)]
    source: Option<SourceArg>,

    /// Camera driver name
    #[arg(long)]
    driver: Option<String>,

    /// Video file to play (implies --source file)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Live pacing target in Hz
    #[arg(long)]
    framerate: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Stop at the end of the file instead of looping
    #[arg(long)]
    no_loop: bool,
}

impl Cli {
    fn apply(&self, config: &mut AcquisitionConfig) {
        if let Some(kind) = self.source {
            config.source.kind = match kind {
                SourceArg::Camera => SourceKind::Camera,
                SourceArg::File => SourceKind::File,
            };
        }
        if let Some(driver) = &self.driver {
            config.source.driver = driver.clone();
        }
        if let Some(file) = &self.file {
            config.source.path = Some(file.clone());
            if self.source.is_none() {
                config.source.kind = SourceKind::File;
            }
        }
        if let Some(rate) = self.framerate {
            config.acquisition.framerate = Some(rate);
        }
        if self.no_loop {
            config.source.loop_playback = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AcquisitionConfig::load_unvalidated(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Initialize tracing with RUST_LOG env var, falling back to the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let registry = CameraRegistry::with_defaults();
    let source = config
        .build_source(&registry)
        .context("Failed to create frame source")?;

    let (frames_tx, mut frames_rx) = FrameQueue::bounded(config.acquisition.queue_capacity);
    let (io, surface) = LoopIo::new(Box::new(frames_tx));
    let ControlSurface {
        control,
        kill,
        mut diagnostics,
        mut framerate,
    } = surface;
    let handle = AcquisitionLoop::spawn(source, config.loop_settings(), io)
        .context("Failed to start acquisition")?;

    let consumer = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(frame) = frames_rx.recv().await {
            received += 1;
            if received % 100 == 0 {
                info!("Received frame {}", frame.sequence_index);
            }
        }
        received
    });

    let diagnostics_task = tokio::spawn(async move {
        while let Some(message) = diagnostics.recv().await {
            info!("{}", message);
        }
    });

    // A plain thread: a pending stdin read must not hold up runtime shutdown.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<ControlMessage>(line) {
                Ok(message) => {
                    if control.send(ControlUpdate::from(message)).is_err() {
                        break;
                    }
                }
                Err(err) => warn!("Ignoring control line '{}': {}", line, err),
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if framerate.has_changed().is_err() {
                break;
            }
            info!("Framerate: {:.1} Hz", *framerate.borrow_and_update());
        }
    });

    let deadline = async {
        match cli.duration_secs {
            Some(secs) if secs > 0.0 => tokio::time::sleep(Duration::from_secs_f64(secs)).await,
            _ => std::future::pending().await,
        }
    };
    let mut join = tokio::task::spawn_blocking(move || handle.join());

    let summary = tokio::select! {
        result = &mut join => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; stopping acquisition");
            kill.set();
            join.await
        }
        _ = deadline => {
            kill.set();
            join.await
        }
    }
    .context("Acquisition join task failed")?
    .context("Acquisition worker failed")?;

    let received = consumer.await.context("Consumer task failed")?;
    diagnostics_task.abort();

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("Frames received by consumer: {}", received);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_flag_completes_file_config() {
        let mut config = AcquisitionConfig::default();
        config.source.kind = SourceKind::File;
        assert!(config.validate().is_err());

        let cli = Cli::parse_from(["daq_video", "--file", "clip.rawstack", "--no-loop"]);
        cli.apply(&mut config);
        config.validate().unwrap();
        assert_eq!(config.source.path, Some(PathBuf::from("clip.rawstack")));
        assert!(!config.source.loop_playback);
    }

    #[test]
    fn test_source_flag_wins_over_file_implication() {
        let mut config = AcquisitionConfig::default();
        let cli = Cli::parse_from(["daq_video", "--source", "camera", "--file", "clip.rawstack"]);
        cli.apply(&mut config);
        assert_eq!(config.source.kind, SourceKind::Camera);
    }
}
