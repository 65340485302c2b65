//! Inbound control path.
//!
//! Operators send [`ControlUpdate`] batches through a [`ControlSender`]. Once
//! per iteration the loop drains everything pending with
//! [`ControlReceiver::drain`], merges it into one batch and hands it to
//! [`ControlState::apply`], which validates each value against the parameter
//! limits and reports what changed.
//!
//! ## Parameters
//!
//! | name                 | type   | default | limits     | handled by |
//! |----------------------|--------|---------|------------|------------|
//! | `exposure`           | float  | 1.0 ms  | 0.1 – 50   | source     |
//! | `framerate`          | float  | 150 Hz  | 10 – 700   | loop + source |
//! | `gain`               | float  | 1.0     | 0.1 – 12   | source     |
//! | `ring_buffer_length` | int    | 600     | 1 – 2000   | loop + source |
//! | `replay`             | bool   | false   |            | loop       |
//! | `replay_fps`         | float  | 15      | 0 – 500    | loop       |
//! | `paused`             | bool   | false   |            | loop       |
//! | `offset`             | int    | 0       | ≥ 0        | loop (+ file seek) |
//! | `roi`                | int[4] |         |            | source     |
//!
//! Names not listed are forwarded to the source untouched; the source decides
//! whether it supports them.

use crate::core::ParameterValue;
use crate::error::ControlError;
use crate::messages::ControlUpdate;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Default near-zero wait when polling for control updates.
pub const DEFAULT_CONTROL_POLL_TIMEOUT: Duration = Duration::from_micros(100);

/// Inclusive `(min, max)` limits for control updates.
pub const EXPOSURE_LIMITS: (f64, f64) = (0.1, 50.0);
/// Framerate limits (Hz).
pub const FRAMERATE_LIMITS: (f64, f64) = (10.0, 700.0);
/// Gain limits.
pub const GAIN_LIMITS: (f64, f64) = (0.1, 12.0);
/// Ring buffer length limits (frames).
pub const RING_BUFFER_LENGTH_LIMITS: (f64, f64) = (1.0, 2000.0);
/// Replay rate limits (Hz); zero disables replay.
pub const REPLAY_FPS_LIMITS: (f64, f64) = (0.0, 500.0);

/// Default camera framerate (Hz).
pub const DEFAULT_FRAMERATE: f64 = 150.0;
/// Default ring buffer length (frames).
pub const DEFAULT_RING_BUFFER_LENGTH: usize = 600;
/// Default replay rate (Hz).
pub const DEFAULT_REPLAY_FPS: f64 = 15.0;

/// Create a connected control sender/receiver pair.
pub fn control_channel() -> (ControlSender, ControlReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ControlSender { tx },
        ControlReceiver {
            rx,
            disconnected: false,
        },
    )
}

/// Operator side of the control channel. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlUpdate>,
}

impl ControlSender {
    /// Queue a batch of changes for the next loop iteration.
    pub fn send(&self, update: ControlUpdate) -> Result<(), ControlError> {
        self.tx.send(update).map_err(|_| ControlError::Disconnected)
    }

    /// Queue a single parameter change.
    pub fn set(&self, name: &str, value: impl Into<ParameterValue>) -> Result<(), ControlError> {
        self.send(ControlUpdate::new().with(name, value))
    }
}

/// Loop side of the control channel.
#[derive(Debug)]
pub struct ControlReceiver {
    rx: mpsc::UnboundedReceiver<ControlUpdate>,
    disconnected: bool,
}

impl ControlReceiver {
    /// Collect every pending update into one batch.
    ///
    /// When the channel looks empty the receiver waits once for `timeout`
    /// before concluding there is nothing more; an update arriving in that
    /// window restarts the drain. Returns `None` if nothing was received.
    pub fn drain(&mut self, timeout: Duration) -> Option<ControlUpdate> {
        if self.disconnected {
            return None;
        }
        let mut batch: Option<ControlUpdate> = None;
        let mut waited = false;
        loop {
            match self.rx.try_recv() {
                Ok(update) => {
                    batch.get_or_insert_with(ControlUpdate::new).merge(update);
                    waited = false;
                }
                Err(TryRecvError::Empty) => {
                    if waited || timeout.is_zero() {
                        break;
                    }
                    std::thread::sleep(timeout);
                    waited = true;
                }
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Control channel disconnected; no further updates");
                    self.disconnected = true;
                    break;
                }
            }
        }
        batch
    }

    /// True once every sender has been dropped and the backlog consumed.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

fn expect_f64(name: &str, value: &ParameterValue, limits: (f64, f64)) -> Result<f64, ControlError> {
    let v = value.as_f64().ok_or_else(|| ControlError::WrongType {
        name: name.to_string(),
        expected: "number",
        value: value.to_string(),
    })?;
    if !v.is_finite() || v < limits.0 || v > limits.1 {
        return Err(ControlError::OutOfRange {
            name: name.to_string(),
            value: v,
            min: limits.0,
            max: limits.1,
        });
    }
    Ok(v)
}

fn expect_bool(name: &str, value: &ParameterValue) -> Result<bool, ControlError> {
    value.as_bool().ok_or_else(|| ControlError::WrongType {
        name: name.to_string(),
        expected: "bool",
        value: value.to_string(),
    })
}

fn expect_count(name: &str, value: &ParameterValue, limits: (f64, f64)) -> Result<usize, ControlError> {
    let v = value
        .as_i64()
        .ok_or_else(|| ControlError::WrongType {
            name: name.to_string(),
            expected: "integer",
            value: value.to_string(),
        })?;
    if (v as f64) < limits.0 || (v as f64) > limits.1 {
        return Err(ControlError::OutOfRange {
            name: name.to_string(),
            value: v as f64,
            min: limits.0,
            max: limits.1,
        });
    }
    usize::try_from(v).map_err(|_| ControlError::OutOfRange {
        name: name.to_string(),
        value: v as f64,
        min: limits.0,
        max: limits.1,
    })
}

/// Check a control value against its limits.
///
/// Returns the normalized value. Names without limits pass through unchanged.
pub fn validate(name: &str, value: &ParameterValue) -> Result<ParameterValue, ControlError> {
    Ok(match name {
        "exposure" => expect_f64(name, value, EXPOSURE_LIMITS)?.into(),
        "framerate" => expect_f64(name, value, FRAMERATE_LIMITS)?.into(),
        "gain" => expect_f64(name, value, GAIN_LIMITS)?.into(),
        "replay_fps" => expect_f64(name, value, REPLAY_FPS_LIMITS)?.into(),
        "ring_buffer_length" => expect_count(name, value, RING_BUFFER_LENGTH_LIMITS)?.into(),
        "offset" => expect_count(name, value, (0.0, f64::MAX))?.into(),
        "paused" | "replay" => expect_bool(name, value)?.into(),
        "roi" => {
            let values = value.as_int_array().filter(|v| v.len() == 4).ok_or_else(|| {
                ControlError::WrongType {
                    name: name.to_string(),
                    expected: "four integers",
                    value: value.to_string(),
                }
            })?;
            ParameterValue::IntArray(values)
        }
        _ => value.clone(),
    })
}

/// Loop-level interpretation of the control parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ControlState {
    /// Live/paused pacing target (Hz)
    pub framerate: f64,
    /// Replay requested
    pub replay: bool,
    /// Replay pacing target (Hz); zero disables replay
    pub replay_fps: f64,
    /// Pause requested (wins over replay)
    pub paused: bool,
    /// Replay/file start offset (frames)
    pub offset: usize,
    /// Ring buffer capacity (frames)
    pub ring_buffer_length: usize,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            replay: false,
            replay_fps: DEFAULT_REPLAY_FPS,
            paused: false,
            offset: 0,
            ring_buffer_length: DEFAULT_RING_BUFFER_LENGTH,
        }
    }
}

/// What one [`ControlState::apply`] call changed.
#[derive(Debug, Default)]
pub struct AppliedControl {
    /// `framerate` was accepted with a new value
    pub framerate_changed: bool,
    /// `replay_fps` was accepted with a new value
    pub replay_fps_changed: bool,
    /// New offset, only when it differs from the previous one
    pub offset_changed: Option<usize>,
    /// New ring buffer length, only when it differs from the previous one
    pub ring_buffer_length_changed: Option<usize>,
    /// Validated values for the frame source, in name order
    pub forwarded: Vec<(String, ParameterValue)>,
    /// Values refused by validation
    pub rejected: Vec<ControlError>,
}

impl ControlState {
    /// Apply a batch atomically: every accepted value is applied, rejected
    /// values leave the previous state untouched.
    pub fn apply(&mut self, update: &ControlUpdate) -> AppliedControl {
        let mut applied = AppliedControl::default();
        for (name, raw) in update.iter() {
            let value = match validate(name, raw) {
                Ok(v) => v,
                Err(err) => {
                    applied.rejected.push(err);
                    continue;
                }
            };
            match name {
                "paused" => self.paused = value.as_bool().unwrap_or(self.paused),
                "replay" => self.replay = value.as_bool().unwrap_or(self.replay),
                "replay_fps" => {
                    let fps = value.as_f64().unwrap_or(self.replay_fps);
                    applied.replay_fps_changed |= fps != self.replay_fps;
                    self.replay_fps = fps;
                }
                "offset" => {
                    let offset = value.as_i64().map_or(self.offset, |v| v as usize);
                    if offset != self.offset {
                        self.offset = offset;
                        applied.offset_changed = Some(offset);
                    }
                }
                "framerate" => {
                    let rate = value.as_f64().unwrap_or(self.framerate);
                    applied.framerate_changed |= rate != self.framerate;
                    self.framerate = rate;
                    applied.forwarded.push((name.to_string(), value));
                }
                "ring_buffer_length" => {
                    let len = value.as_i64().map_or(self.ring_buffer_length, |v| v as usize);
                    if len != self.ring_buffer_length {
                        self.ring_buffer_length = len;
                        applied.ring_buffer_length_changed = Some(len);
                    }
                    applied.forwarded.push((name.to_string(), value));
                }
                _ => applied.forwarded.push((name.to_string(), value)),
            }
        }
        applied
    }

    /// True when replay is both requested and has a positive rate.
    pub fn replay_active(&self) -> bool {
        self.replay && self.replay_fps > 0.0
    }
}
