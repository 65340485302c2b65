//! Named camera driver factories.

use super::camera::{CameraDriver, CameraOptions};
use super::simulated::SimulatedCamera;
use crate::error::AcquisitionError;
use std::collections::HashMap;

type DriverFactory = Box<dyn Fn(CameraOptions) -> Box<dyn CameraDriver> + Send + Sync>;

/// Camera drivers by name.
///
/// New hardware is supported by registering a factory; the acquisition loop
/// never needs to know about concrete driver types.
pub struct CameraRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl Default for CameraRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CameraRegistry {
    /// Registry with no drivers.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `simulated` driver.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("simulated", |options| Box::new(SimulatedCamera::new(options)));
        registry
    }

    /// Add or replace the factory for `name`.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(CameraOptions) -> Box<dyn CameraDriver> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Instantiate the driver registered as `name`.
    pub fn create(
        &self,
        name: &str,
        options: CameraOptions,
    ) -> Result<Box<dyn CameraDriver>, AcquisitionError> {
        self.factories
            .get(name)
            .map(|factory| factory(options))
            .ok_or_else(|| AcquisitionError::UnknownSource(name.to_string()))
    }

    /// Registered driver names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver() {
        let registry = CameraRegistry::with_defaults();
        let err = registry.create("ximea", CameraOptions::default()).err().unwrap();
        assert_eq!(err.to_string(), "ximea is not a valid camera type");
    }

    #[test]
    fn test_register_custom_driver() {
        let mut registry = CameraRegistry::empty();
        assert!(registry.names().is_empty());
        registry.register("tiny", |options| {
            Box::new(SimulatedCamera::new(options).with_sensor(4, 4))
        });
        let driver = registry.create("tiny", CameraOptions::default()).unwrap();
        assert_eq!(driver.name(), "simulated");
        assert_eq!(registry.names(), vec!["tiny"]);
    }
}
