//! Simulated camera driver.
//!
//! Generates a moving diagonal gradient whose intensity follows exposure and
//! gain. Used by tests and as the default driver of the `daq_video` binary
//! when no hardware is attached.

use super::camera::{CameraDriver, CameraOptions};
use crate::acquisition::control::{EXPOSURE_LIMITS, GAIN_LIMITS};
use crate::core::{ImageData, ParameterValue, PixelBuffer, Roi};
use crate::error::SourceError;

const DEFAULT_SENSOR: (u32, u32) = (640, 480);

/// Synthetic 8-bit camera.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    sensor: (u32, u32),
    options: CameraOptions,
    exposure_ms: f64,
    gain: f64,
    framerate: f64,
    reads: u64,
    fail_every: u64,
    available: bool,
    opened: bool,
}

impl SimulatedCamera {
    /// 640x480 camera with the given options.
    pub fn new(options: CameraOptions) -> Self {
        Self {
            sensor: DEFAULT_SENSOR,
            options,
            exposure_ms: 1.0,
            gain: 1.0,
            framerate: 150.0,
            reads: 0,
            fail_every: 0,
            available: true,
            opened: false,
        }
    }

    /// Camera whose `open` fails, as if the device were unplugged.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(CameraOptions::default())
        }
    }

    /// Use a `width x height` sensor.
    pub fn with_sensor(mut self, width: u32, height: u32) -> Self {
        self.sensor = (width.max(1), height.max(1));
        self
    }

    /// Return no image on every `n`-th read (0 disables).
    pub fn fail_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Current exposure in milliseconds.
    pub fn exposure_ms(&self) -> f64 {
        self.exposure_ms
    }

    fn region(&self) -> Roi {
        self.options.roi.unwrap_or(Roi {
            x: 0,
            y: 0,
            width: self.sensor.0,
            height: self.sensor.1,
        })
    }

    fn render(&self, t: u64) -> Option<ImageData> {
        let roi = self.region();
        let step = self.options.downsampling.max(1) as usize;
        let width = (roi.width as usize).div_ceil(step);
        let height = (roi.height as usize).div_ceil(step);
        let scale = self.exposure_ms * self.gain;

        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            let y = roi.y as usize + row * step;
            for col in 0..width {
                let x = roi.x as usize + col * step;
                let base = ((x + y) as u64 + t) % 256;
                data.push((base as f64 * scale).min(255.0) as u8);
            }
        }
        ImageData::new(width, height, PixelBuffer::U8(data)).ok()
    }

    fn number(name: &str, value: &ParameterValue, limits: (f64, f64)) -> Result<f64, SourceError> {
        let v = value.as_f64().ok_or_else(|| SourceError::Rejected {
            name: name.to_string(),
            reason: format!("expected a number, got {}", value),
        })?;
        if v < limits.0 || v > limits.1 {
            return Err(SourceError::Rejected {
                name: name.to_string(),
                reason: format!("{} outside [{}, {}]", v, limits.0, limits.1),
            });
        }
        Ok(v)
    }
}

impl CameraDriver for SimulatedCamera {
    fn open(&mut self) -> Result<String, SourceError> {
        if !self.available {
            return Err(SourceError::Hardware("simulated camera unavailable".to_string()));
        }
        if let Some(roi) = self.options.roi {
            if !roi.fits(self.sensor.0, self.sensor.1) {
                return Err(SourceError::Hardware(format!(
                    "ROI {:?} exceeds sensor {}x{}",
                    roi, self.sensor.0, self.sensor.1
                )));
            }
        }
        self.opened = true;
        let roi = self.region();
        Ok(format!(
            "Simulated camera opened: {}x{} sensor, {}x{} region, downsampling {}",
            self.sensor.0, self.sensor.1, roi.width, roi.height, self.options.downsampling
        ))
    }

    fn read(&mut self) -> Option<ImageData> {
        if !self.opened {
            return None;
        }
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return None;
        }
        self.render(self.reads)
    }

    fn set(&mut self, name: &str, value: &ParameterValue) -> Result<(), SourceError> {
        match name {
            "exposure" => self.exposure_ms = Self::number(name, value, EXPOSURE_LIMITS)?,
            "gain" => self.gain = Self::number(name, value, GAIN_LIMITS)?,
            "framerate" => self.framerate = Self::number(name, value, (f64::MIN_POSITIVE, f64::MAX))?,
            "roi" => {
                let parsed = value
                    .as_int_array()
                    .and_then(|v| Roi::from_values(&v))
                    .ok_or_else(|| SourceError::Rejected {
                        name: name.to_string(),
                        reason: format!("expected [x, y, width, height], got {}", value),
                    })?;
                if let Some(roi) = parsed {
                    if !roi.fits(self.sensor.0, self.sensor.1) {
                        return Err(SourceError::Rejected {
                            name: name.to_string(),
                            reason: format!("{:?} exceeds sensor", roi),
                        });
                    }
                }
                self.options.roi = parsed;
            }
            // Buffering is handled by the acquisition loop.
            "ring_buffer_length" => {}
            _ => return Err(SourceError::UnsupportedParameter(name.to_string())),
        }
        Ok(())
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn nominal_framerate(&self) -> Option<f64> {
        Some(self.framerate)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(camera: SimulatedCamera) -> SimulatedCamera {
        let mut camera = camera;
        camera.open().unwrap();
        camera
    }

    #[test]
    fn test_full_sensor_frame() {
        let mut cam = open(SimulatedCamera::new(CameraOptions::default()));
        let img = cam.read().unwrap();
        assert_eq!((img.width(), img.height()), (640, 480));
    }

    #[test]
    fn test_roi_and_downsampling() {
        let options = CameraOptions {
            downsampling: 2,
            roi: Some(Roi {
                x: 10,
                y: 20,
                width: 100,
                height: 50,
            }),
        };
        let mut cam = open(SimulatedCamera::new(options));
        let img = cam.read().unwrap();
        assert_eq!((img.width(), img.height()), (50, 25));
    }

    #[test]
    fn test_gain_scales_intensity() {
        let mut dim = open(SimulatedCamera::new(CameraOptions::default()).with_sensor(8, 8));
        let mut bright = open(SimulatedCamera::new(CameraOptions::default()).with_sensor(8, 8));
        bright.set("gain", &ParameterValue::Float(2.0)).unwrap();
        let a = dim.read().unwrap().sample(1, 1, 0).unwrap();
        let b = bright.read().unwrap().sample(1, 1, 0).unwrap();
        assert_eq!(b, 2.0 * a);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut cam = open(SimulatedCamera::new(CameraOptions::default()));
        assert!(matches!(
            cam.set("exposure", &ParameterValue::Float(500.0)),
            Err(SourceError::Rejected { .. })
        ));
        assert!(matches!(
            cam.set("roi", &ParameterValue::IntArray(vec![600, 0, 100, 100])),
            Err(SourceError::Rejected { .. })
        ));
        assert!(matches!(
            cam.set("shutter", &ParameterValue::Bool(true)),
            Err(SourceError::UnsupportedParameter(_))
        ));
        cam.set("roi", &ParameterValue::IntArray(vec![-1, -1, -1, -1])).unwrap();
        assert_eq!(cam.exposure_ms(), 1.0);
    }

    #[test]
    fn test_roi_outside_sensor_fails_open() {
        let options = CameraOptions {
            downsampling: 1,
            roi: Some(Roi {
                x: 0,
                y: 0,
                width: 1000,
                height: 10,
            }),
        };
        let mut cam = SimulatedCamera::new(options);
        assert!(matches!(cam.open(), Err(SourceError::Hardware(_))));
    }
}
