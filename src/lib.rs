//! Paced frame acquisition with rolling history, pause and replay.
//!
//! This library pulls frames from a camera or a video file on a dedicated
//! thread, keeps the most recent ones in a ring buffer, and forwards them to
//! consumers through a bounded queue that never blocks the producer.
//! Operators steer the loop at runtime (rate, pause, replay, offset, camera
//! parameters) through a control channel.
//!
//! ```rust,ignore
//! use daq_video::acquisition::{AcquisitionLoop, FrameQueue, LoopIo, LoopSettings};
//! use daq_video::source::{CameraOptions, CameraRegistry, CameraSource};
//!
//! let registry = CameraRegistry::with_defaults();
//! let driver = registry.create("simulated", CameraOptions::default())?;
//! let (frames_tx, mut frames_rx) = FrameQueue::bounded(16);
//! let (io, surface) = LoopIo::new(Box::new(frames_tx));
//! let handle = AcquisitionLoop::spawn(
//!     Box::new(CameraSource::new(driver)),
//!     LoopSettings::default(),
//!     io,
//! )?;
//! surface.control.set("paused", true)?;
//! let summary = handle.stop()?;
//! ```

pub mod acquisition;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod messages;
pub mod source;
