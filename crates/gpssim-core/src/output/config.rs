//! Output channel enables

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected output configuration
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("At least one output channel must stay enabled")]
    AllOutputsDisabled,
}

/// Which channels receive sentences
///
/// Both flags false is not representable through [`OutputConfig::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub gpio_enabled: bool,
    pub usb_enabled: bool,
}

impl OutputConfig {
    pub fn new(gpio_enabled: bool, usb_enabled: bool) -> Result<Self, ValidationError> {
        if !gpio_enabled && !usb_enabled {
            return Err(ValidationError::AllOutputsDisabled);
        }
        Ok(Self {
            gpio_enabled,
            usb_enabled,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        Self::new(self.gpio_enabled, self.usb_enabled).map(|_| ())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            gpio_enabled: true,
            usb_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_both() {
        let config = OutputConfig::default();
        assert!(config.gpio_enabled && config.usb_enabled);
    }

    #[test]
    fn test_rejects_all_disabled() {
        assert_eq!(
            OutputConfig::new(false, false),
            Err(ValidationError::AllOutputsDisabled)
        );
        assert!(OutputConfig::new(true, false).is_ok());
        assert!(OutputConfig::new(false, true).is_ok());
    }

    #[test]
    fn test_deserialized_config_validated() {
        let config: OutputConfig =
            serde_json::from_str(r#"{"gpio_enabled": false, "usb_enabled": false}"#).unwrap();
        assert_eq!(config.validate(), Err(ValidationError::AllOutputsDisabled));
    }
}
