//! Controller parameters and their boot-time validation

use core::fmt;

use crate::duty::ADC_MAX;

/// Rotor pole count (not pole pairs)
pub const DEFAULT_POLES: u8 = 8;

/// Speed-capture counter frequency [Hz] (1 µs per tick)
pub const DEFAULT_TICK_HZ: u32 = 1_000_000;

/// Filtered throttle level above which the controller starts
pub const DEFAULT_ON_THRESHOLD: u16 = 200;

/// Filtered throttle level below which the controller stops
pub const DEFAULT_OFF_THRESHOLD: u16 = 100;

/// Throttle low-pass coefficient (0.0-1.0, larger responds faster)
pub const DEFAULT_FILTER_ALPHA: f32 = 0.1;

/// Boot-time parameters of the commutation controller
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub poles: u8,
    pub tick_hz: u32,
    pub adc_max: u16,
    pub on_threshold: u16,
    pub off_threshold: u16,
    pub filter_alpha: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poles: DEFAULT_POLES,
            tick_hz: DEFAULT_TICK_HZ,
            adc_max: ADC_MAX,
            on_threshold: DEFAULT_ON_THRESHOLD,
            off_threshold: DEFAULT_OFF_THRESHOLD,
            filter_alpha: DEFAULT_FILTER_ALPHA,
        }
    }
}

/// Rejected configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    ZeroPoles,
    ZeroAdcMax,
    ZeroTickRate,
    /// The turn-on threshold must be above the turn-off threshold
    ThresholdsInverted { on: u16, off: u16 },
    /// The filter coefficient must lie in (0, 1]
    FilterAlphaOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPoles => write!(f, "pole count must be non-zero"),
            ConfigError::ZeroAdcMax => write!(f, "ADC full scale must be non-zero"),
            ConfigError::ZeroTickRate => write!(f, "capture tick rate must be non-zero"),
            ConfigError::ThresholdsInverted { on, off } => {
                write!(f, "turn-on threshold {} not above turn-off threshold {}", on, off)
            }
            ConfigError::FilterAlphaOutOfRange => {
                write!(f, "throttle filter coefficient outside (0, 1]")
            }
        }
    }
}

impl ControllerConfig {
    /// Check the parameters once at boot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poles == 0 {
            return Err(ConfigError::ZeroPoles);
        }
        if self.adc_max == 0 {
            return Err(ConfigError::ZeroAdcMax);
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.on_threshold <= self.off_threshold {
            return Err(ConfigError::ThresholdsInverted {
                on: self.on_threshold,
                off: self.off_threshold,
            });
        }
        if !(self.filter_alpha > 0.0 && self.filter_alpha <= 1.0) {
            return Err(ConfigError::FilterAlphaOutOfRange);
        }
        Ok(())
    }
}
