//! Camera frame source.
//!
//! [`CameraSource`] adds the lifecycle state machine on top of a
//! [`CameraDriver`], which is the only thing a new camera model has to
//! implement.

use super::{FrameSource, ReadOutcome, SourceState};
use crate::core::{ImageData, ParameterValue, Roi};
use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Options fixed when a camera is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraOptions {
    /// Integer binning factor applied by the driver (1 = none)
    pub downsampling: u32,
    /// Sensor region to read; `None` for the full sensor
    pub roi: Option<Roi>,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            downsampling: 1,
            roi: None,
        }
    }
}

/// Hardware collaborator contract.
///
/// Implementations talk to one physical (or simulated) camera. They are
/// driven from the acquisition thread only.
pub trait CameraDriver: Send {
    /// Connect to the device and start acquisition.
    ///
    /// Returns a status line such as `"Camera opened: 640x480"`.
    fn open(&mut self) -> Result<String, SourceError>;

    /// Grab one image; `None` on a transient failure.
    fn read(&mut self) -> Option<ImageData>;

    /// Change a parameter. Unsupported names return
    /// [`SourceError::UnsupportedParameter`].
    fn set(&mut self, name: &str, value: &ParameterValue) -> Result<(), SourceError>;

    /// Stop acquisition and disconnect.
    fn release(&mut self);

    /// Configured framerate, if the driver knows it.
    fn nominal_framerate(&self) -> Option<f64> {
        None
    }

    /// Driver name for logs.
    fn name(&self) -> &str;
}

/// [`FrameSource`] backed by a camera driver.
pub struct CameraSource {
    driver: Box<dyn CameraDriver>,
    state: SourceState,
}

impl CameraSource {
    /// Wrap `driver`; nothing is opened yet.
    pub fn new(driver: Box<dyn CameraDriver>) -> Self {
        Self {
            driver,
            state: SourceState::Uninitialized,
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<String, SourceError> {
        if self.state != SourceState::Uninitialized {
            return Err(SourceError::AlreadyOpened(self.state.as_str()));
        }
        match self.driver.open() {
            Ok(status) => {
                info!("Camera '{}' opened: {}", self.driver.name(), status);
                self.state = SourceState::Open;
                Ok(status)
            }
            Err(err) => {
                self.state = SourceState::Failed;
                Err(err)
            }
        }
    }

    fn read(&mut self) -> Result<ReadOutcome, SourceError> {
        if !self.state.is_readable() {
            return Err(SourceError::NotOpen(self.state.as_str()));
        }
        self.state = SourceState::Reading;
        Ok(match self.driver.read() {
            Some(image) => ReadOutcome::Frame(image),
            None => ReadOutcome::Missed,
        })
    }

    fn set(&mut self, name: &str, value: &ParameterValue) -> Result<(), SourceError> {
        if !self.state.is_readable() {
            return Err(SourceError::NotOpen(self.state.as_str()));
        }
        debug!("Camera '{}': {} = {}", self.driver.name(), name, value);
        self.driver.set(name, value)
    }

    fn release(&mut self) {
        match self.state {
            SourceState::Closed => {}
            SourceState::Uninitialized => self.state = SourceState::Closed,
            _ => {
                self.driver.release();
                info!("Camera '{}' released", self.driver.name());
                self.state = SourceState::Closed;
            }
        }
    }

    fn nominal_framerate(&self) -> Option<f64> {
        self.driver.nominal_framerate()
    }

    fn state(&self) -> SourceState {
        self.state
    }

    fn describe(&self) -> String {
        format!("camera '{}'", self.driver.name())
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if self.state != SourceState::Closed {
            warn!("Camera '{}' dropped without release", self.driver.name());
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SimulatedCamera;

    #[test]
    fn test_state_machine() {
        let mut source = CameraSource::new(Box::new(SimulatedCamera::new(CameraOptions::default())));
        assert_eq!(source.state(), SourceState::Uninitialized);
        assert!(matches!(source.read(), Err(SourceError::NotOpen("uninitialized"))));

        source.open().unwrap();
        assert_eq!(source.state(), SourceState::Open);
        assert!(matches!(source.open(), Err(SourceError::AlreadyOpened("open"))));

        assert!(matches!(source.read().unwrap(), ReadOutcome::Frame(_)));
        assert_eq!(source.state(), SourceState::Reading);

        source.release();
        source.release();
        assert_eq!(source.state(), SourceState::Closed);
        assert!(source.read().is_err());
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let mut source = CameraSource::new(Box::new(SimulatedCamera::unavailable()));
        assert!(matches!(source.open(), Err(SourceError::Hardware(_))));
        assert_eq!(source.state(), SourceState::Failed);
        assert!(source.read().is_err());
        source.release();
        assert_eq!(source.state(), SourceState::Closed);
    }

    #[test]
    fn test_transient_read_failure() {
        let camera = SimulatedCamera::new(CameraOptions::default()).fail_every(2);
        let mut source = CameraSource::new(Box::new(camera));
        source.open().unwrap();
        assert!(matches!(source.read().unwrap(), ReadOutcome::Frame(_)));
        assert!(matches!(source.read().unwrap(), ReadOutcome::Missed));
        assert!(matches!(source.read().unwrap(), ReadOutcome::Frame(_)));
    }
}
